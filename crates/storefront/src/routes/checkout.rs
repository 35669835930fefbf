//! Checkout route handlers: shipping form, order placement and the
//! payment gateway callback.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{AddressId, EngagementKind, PhoneNumber};

use crate::db::carts::CartOwner;
use crate::db::{AddressRepository, CartRepository, EngagementRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::CurrentUser;
use crate::models::cart::CartView;
use crate::models::order::{CheckoutForm, Order};
use crate::models::user::{Address, AddressForm, AddressInput};
use crate::services::{CallbackOutcome, CheckoutError, CheckoutService};
use crate::state::AppState;
use crate::validation::FieldErrors;

use super::cart::load_cart;
use super::see_other;

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub addresses: Vec<Address>,
    /// Selected saved address, as posted.
    pub address_id: String,
    pub form: AddressForm,
    pub save_address: bool,
    pub note: String,
    pub errors: FieldErrors,
}

/// Payment result page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/result.html")]
pub struct PaymentResultTemplate {
    pub page: PageContext,
    pub order: Order,
    pub paid: bool,
}

/// Display the checkout form.
#[instrument(skip(state, page, session), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Response> {
    let cart = load_cart(&state, Some(CartOwner::User(user.id))).await?;
    if cart.is_empty() {
        Flash::error(CheckoutError::EmptyCart.user_message())
            .set(&session)
            .await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let addresses = AddressRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    let address_id = addresses
        .iter()
        .find(|a| a.is_default)
        .map(|a| a.id.to_string())
        .unwrap_or_default();
    let form = AddressForm {
        phone: user.phone.as_str().to_owned(),
        recipient: user.full_name.clone(),
        ..AddressForm::default()
    };

    Ok(CheckoutTemplate {
        page,
        cart,
        addresses,
        address_id,
        form,
        save_address: true,
        note: String::new(),
        errors: FieldErrors::new(),
    }
    .into_response())
}

/// Resolve the shipping address: a saved one, or the inline form.
async fn resolve_address(
    state: &AppState,
    user: &CurrentUser,
    form: &CheckoutForm,
) -> Result<std::result::Result<AddressInput, FieldErrors>> {
    let chosen = form.address_id.trim();
    if chosen.is_empty() {
        return Ok(form.address.validate());
    }

    let Ok(id) = chosen.parse::<i64>() else {
        let mut errors = FieldErrors::new();
        errors.add("address_id", "نشانی انتخاب‌شده معتبر نیست.");
        return Ok(Err(errors));
    };
    let address = AddressRepository::new(state.pool())
        .get_for_user(user.id, AddressId::new(id))
        .await?;
    let phone = PhoneNumber::parse(&address.phone).map_err(|e| {
        AppError::Database(RepositoryError::DataCorruption(format!(
            "address {id} phone: {e}"
        )))
    })?;

    Ok(Ok(AddressInput {
        recipient: address.recipient,
        phone,
        province: address.province,
        city: address.city,
        line: address.line,
        postal_code: address.postal_code,
        make_default: false,
    }))
}

/// Whether the inline address should go to the address book.
fn should_save_address(form: &CheckoutForm) -> bool {
    form.address_id.trim().is_empty() && form.save_address.is_some()
}

/// Place the order and send the customer to the payment gateway.
#[instrument(skip(state, page, session, headers, form), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let pool = state.pool();
    let note: String = form.note.trim().chars().take(500).collect();

    let address = match resolve_address(&state, &user, &form).await? {
        Ok(address) => address,
        Err(errors) => {
            let cart = load_cart(&state, Some(CartOwner::User(user.id))).await?;
            let addresses = AddressRepository::new(pool).list_for_user(user.id).await?;
            return Ok(CheckoutTemplate {
                page,
                cart,
                addresses,
                address_id: form.address_id.clone(),
                save_address: form.save_address.is_some(),
                note,
                form: form.address,
                errors,
            }
            .into_response());
        }
    };

    let Some(cart_id) = CartRepository::new(pool)
        .find(CartOwner::User(user.id))
        .await?
    else {
        Flash::error(CheckoutError::EmptyCart.user_message())
            .set(&session)
            .await;
        return Ok(see_other(&headers, "/cart"));
    };

    let checkout = CheckoutService::new(pool, state.payment(), state.config());
    let order = match checkout.place_order(cart_id, user.id, &address, &note).await {
        Ok(order) => order,
        Err(e @ (CheckoutError::EmptyCart | CheckoutError::Unavailable(_))) => {
            Flash::error(e.user_message()).set(&session).await;
            return Ok(see_other(&headers, "/cart"));
        }
        Err(e) => return Err(e.into()),
    };

    // Only a placed order keeps its inline address, so failed attempts do
    // not pile up copies in the address book
    if should_save_address(&form)
        && let Err(e) = AddressRepository::new(pool).create(user.id, &address).await
    {
        tracing::warn!(error = %e, number = %order.number, "Failed to save checkout address");
    }

    add_breadcrumb("checkout", "Order placed", Some(&[("number", order.number.as_str())]));
    let session_key = session.id().map(|id| id.to_string());
    if let Err(e) = EngagementRepository::new(pool)
        .record(
            EngagementKind::CheckoutStart,
            None,
            Some(user.id),
            session_key.as_deref(),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to record checkout event");
    }

    match checkout.start_payment(&order, Some(&user.phone)).await {
        Ok(gateway_url) => Ok(see_other(&headers, &gateway_url)),
        Err(e) => {
            tracing::error!(error = %e, number = %order.number, "Payment request failed");
            Flash::error(e.user_message()).set(&session).await;
            Ok(see_other(&headers, &format!("/account/orders/{}", order.number)))
        }
    }
}

/// Gateway callback query (`?Authority=...&Status=OK|NOK`).
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "Authority")]
    pub authority: String,
    #[serde(rename = "Status", default)]
    pub status: String,
}

/// Settle the gateway's return and show the result.
///
/// Works without a session: the authority identifies the order, and a
/// replayed callback changes nothing.
#[instrument(skip(state, page))]
pub async fn callback(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse> {
    let outcome = CheckoutService::new(state.pool(), state.payment(), state.config())
        .handle_callback(query.authority.trim(), query.status == "OK")
        .await?;

    let (order, paid) = match outcome {
        CallbackOutcome::Paid(order) | CallbackOutcome::AlreadyPaid(order) => (order, true),
        CallbackOutcome::Failed(order) => (order, false),
    };

    Ok(PaymentResultTemplate { page, order, paid })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(address_id: &str, save: bool) -> CheckoutForm {
        CheckoutForm {
            address_id: address_id.to_string(),
            save_address: save.then(|| "on".to_string()),
            ..CheckoutForm::default()
        }
    }

    #[test]
    fn test_only_new_inline_addresses_are_saved() {
        assert!(should_save_address(&form("", true)));
        assert!(should_save_address(&form("  ", true)));
        assert!(!should_save_address(&form("", false)));
        assert!(!should_save_address(&form("12", true)));
    }
}
