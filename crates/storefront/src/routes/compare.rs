//! Product comparison board.
//!
//! The board lives in the session (at most [`COMPARE_LIMIT`] products) so it
//! works without signing in. Add and remove are HTMX fragments that swap the
//! toggle button and fire `compare-updated` for the header badge.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{EngagementKind, ProductId};

use crate::db::{EngagementRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext, compare_ids};
use crate::models::catalog::{COMPARE_LIMIT, Product};
use crate::models::session_keys;
use crate::state::AppState;

use super::see_other;

/// Comparison board template.
#[derive(Template, WebTemplate)]
#[template(path = "compare/show.html")]
pub struct CompareTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
}

/// Toggle button fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/compare_toggle.html")]
pub struct CompareToggleTemplate {
    pub product_id: ProductId,
    pub in_compare: bool,
    pub full: bool,
}

/// Form data for adding or removing a product.
#[derive(Debug, Deserialize)]
pub struct CompareForm {
    pub product_id: i64,
    /// Set when posted from the board itself, which then reloads.
    #[serde(default)]
    pub from_board: Option<String>,
}

/// Result of adding to a bounded board.
#[derive(Debug, PartialEq, Eq)]
enum AddOutcome {
    Added,
    AlreadyThere,
    Full,
}

/// Drop board entries that are no longer live products.
fn prune_board(ids: &mut Vec<ProductId>, live: &[ProductId]) -> bool {
    let before = ids.len();
    ids.retain(|id| live.contains(id));
    ids.len() != before
}

fn add_to_board(ids: &mut Vec<ProductId>, id: ProductId) -> AddOutcome {
    if ids.contains(&id) {
        AddOutcome::AlreadyThere
    } else if ids.len() >= COMPARE_LIMIT {
        AddOutcome::Full
    } else {
        ids.push(id);
        AddOutcome::Added
    }
}

/// Display the comparison board.
#[instrument(skip(state, page, session))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
) -> Result<impl IntoResponse> {
    let ids = compare_ids(&session).await;
    let products = ProductRepository::new(state.pool()).get_many(&ids).await?;

    // Drop products that were deactivated since they were added
    if products.len() != ids.len() {
        let kept: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        session.insert(session_keys::COMPARE, kept).await?;
    }

    Ok(CompareTemplate { page, products })
}

/// Add a product to the board.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<CompareForm>,
) -> Result<Response> {
    let id = ProductId::new(form.product_id);
    let mut ids = compare_ids(&session).await;

    let mut candidates = ids.clone();
    candidates.push(id);
    let live: Vec<ProductId> = ProductRepository::new(state.pool())
        .get_many(&candidates)
        .await?
        .iter()
        .map(|p| p.id)
        .collect();
    if !live.contains(&id) {
        return Err(AppError::NotFound(format!("product {id}")));
    }

    let pruned = prune_board(&mut ids, &live);
    let outcome = add_to_board(&mut ids, id);

    if outcome == AddOutcome::Added || pruned {
        session.insert(session_keys::COMPARE, &ids).await?;
    }
    if outcome == AddOutcome::Added {
        let session_key = session.id().map(|id| id.to_string());
        if let Err(e) = EngagementRepository::new(state.pool())
            .record(
                EngagementKind::CompareAdd,
                Some(id),
                user.as_ref().map(|u| u.id),
                session_key.as_deref(),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to record compare event");
        }
    }

    Ok((
        AppendHeaders([("HX-Trigger", "compare-updated")]),
        CompareToggleTemplate {
            product_id: id,
            in_compare: outcome != AddOutcome::Full,
            full: outcome == AddOutcome::Full,
        },
    )
        .into_response())
}

/// Remove a product from the board.
#[instrument(skip(session, headers))]
pub async fn remove(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CompareForm>,
) -> Result<Response> {
    let id = ProductId::new(form.product_id);
    let mut ids = compare_ids(&session).await;
    ids.retain(|existing| *existing != id);
    session.insert(session_keys::COMPARE, &ids).await?;

    if form.from_board.is_some() {
        return Ok(see_other(&headers, "/compare"));
    }

    Ok((
        AppendHeaders([("HX-Trigger", "compare-updated")]),
        CompareToggleTemplate {
            product_id: id,
            in_compare: false,
            full: false,
        },
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_is_bounded_and_deduplicated() {
        let mut ids = Vec::new();
        for n in 1..=4 {
            assert_eq!(add_to_board(&mut ids, ProductId::new(n)), AddOutcome::Added);
        }
        assert_eq!(add_to_board(&mut ids, ProductId::new(2)), AddOutcome::AlreadyThere);
        assert_eq!(add_to_board(&mut ids, ProductId::new(5)), AddOutcome::Full);
        assert_eq!(ids.len(), COMPARE_LIMIT);
    }

    #[test]
    fn test_unknown_products_free_their_slots() {
        let mut ids: Vec<ProductId> = (1..=4).map(ProductId::new).collect();
        let live = [ProductId::new(2), ProductId::new(4), ProductId::new(9)];

        assert!(prune_board(&mut ids, &live));
        assert_eq!(ids, vec![ProductId::new(2), ProductId::new(4)]);
        assert!(!prune_board(&mut ids, &live));
        assert_eq!(add_to_board(&mut ids, ProductId::new(9)), AddOutcome::Added);
    }
}
