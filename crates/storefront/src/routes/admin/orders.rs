//! Order list, detail and fulfilment transitions.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::catalog::Pagination;
use crate::models::order::{Order, OrderDetail, OrderListQuery};
use crate::routes::products::FacetOption;
use crate::routes::see_other;
use crate::state::AppState;

use super::{page_window, paginate};

/// Order list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/index.html")]
pub struct OrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<Order>,
    pub pagination: Pagination,
    pub status_options: Vec<FacetOption>,
    pub q: String,
    /// Query string (without `page`) for pagination links.
    pub filter_query: String,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/show.html")]
pub struct OrderTemplate {
    pub page: PageContext,
    pub detail: OrderDetail,
    pub next_statuses: Vec<OrderStatus>,
}

/// Status transition form. `from` is the status the admin saw.
#[derive(Debug, Deserialize)]
pub struct TransitionForm {
    pub from: String,
    pub to: String,
}

fn status_options(selected: Option<OrderStatus>) -> Vec<FacetOption> {
    OrderStatus::ALL
        .iter()
        .map(|s| FacetOption {
            value: s.as_str().to_string(),
            label: s.label().to_string(),
            selected: Some(*s) == selected,
        })
        .collect()
}

fn filter_query(status: Option<OrderStatus>, search: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(status) = status {
        parts.push(format!("status={status}"));
    }
    if let Some(q) = search {
        parts.push(format!("q={}", urlencoding::encode(q)));
    }
    parts.join("&")
}

/// List orders.
#[instrument(skip(state, page, _admin))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse> {
    let status = query.status();
    let (current, limit, offset) = page_window(query.page);
    let (orders, total) = OrderRepository::new(state.pool())
        .admin_list(status, query.search(), limit, offset)
        .await?;

    Ok(OrdersTemplate {
        page,
        orders,
        pagination: paginate(current, total),
        status_options: status_options(status),
        q: query.search().unwrap_or_default().to_owned(),
        filter_query: filter_query(status, query.search()),
    })
}

/// Order detail with the transitions allowed from its current status.
#[instrument(skip(state, page, _admin))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let detail = OrderRepository::new(state.pool())
        .get(OrderId::new(id))
        .await?;
    let next_statuses = detail.order.status.next_statuses();
    Ok(OrderTemplate {
        page,
        detail,
        next_statuses,
    })
}

/// Apply a manual status transition.
///
/// # Errors
///
/// Returns 400 for unknown statuses or transitions the workflow forbids.
#[instrument(skip(state, session, headers, form), fields(admin_id = %admin.id))]
pub async fn transition(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<TransitionForm>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let from: OrderStatus = form.from.parse().map_err(AppError::BadRequest)?;
    let to: OrderStatus = form.to.parse().map_err(AppError::BadRequest)?;
    if !from.can_transition_to(to) {
        return Err(AppError::BadRequest(format!(
            "transition {from} -> {to} is not allowed"
        )));
    }

    match OrderRepository::new(state.pool())
        .transition(order_id, from, to)
        .await
    {
        Ok(()) => {
            tracing::info!(order_id = %order_id, %from, %to, "Order status changed");
            Flash::success(format!("وضعیت سفارش به «{}» تغییر کرد.", to.label()))
                .set(&session)
                .await;
        }
        Err(RepositoryError::Conflict(_)) => {
            Flash::error("وضعیت سفارش در این فاصله تغییر کرده است. دوباره بررسی کنید.")
                .set(&session)
                .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(see_other(&headers, &format!("/admin/orders/{order_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_options_mark_selected() {
        let options = status_options(Some(OrderStatus::Shipped));
        assert_eq!(options.len(), OrderStatus::ALL.len());
        let selected: Vec<_> = options.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, "shipped");
    }

    #[test]
    fn test_filter_query_encodes_search() {
        assert_eq!(filter_query(None, None), "");
        assert_eq!(
            filter_query(Some(OrderStatus::Paid), Some("0912 345")),
            "status=paid&q=0912%20345"
        );
    }
}
