//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{AddressId, OtpPurpose, PhoneNumber};

use crate::db::{AddressRepository, OrderRepository, RepositoryError, UserRepository};
use crate::error::{AppError, Result, set_sentry_user};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::order::{Order, OrderDetail};
use crate::models::user::{Address, AddressForm, User};
use crate::models::{CurrentUser, session_keys};
use crate::services::rate_limit::{OTP_SEND_PER_PHONE, OTP_VERIFY_PER_PHONE};
use crate::services::{CheckoutService, OtpService, RateLimiter};
use crate::state::AppState;
use crate::validation::{FieldErrors, phone_message};

use super::see_other;

/// Orders shown on the profile page.
const RECENT_ORDERS: usize = 3;

// =============================================================================
// Forms
// =============================================================================

/// Profile form data.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: String,
}

impl ProfileForm {
    /// Validate the display name.
    ///
    /// # Errors
    ///
    /// Returns the field message when the name is blank or too long.
    pub fn validate(&self) -> std::result::Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = errors.required("full_name", &self.full_name);
        errors.max_chars("full_name", &name, 100);
        errors.finish(name)
    }
}

/// New phone number form.
#[derive(Debug, Deserialize)]
pub struct PhoneForm {
    #[serde(default)]
    pub phone: String,
}

/// Code form for the phone change.
#[derive(Debug, Deserialize)]
pub struct PhoneCodeForm {
    #[serde(default)]
    pub code: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub user: User,
    pub full_name: String,
    /// The latest few orders.
    pub orders: Vec<Order>,
    pub errors: FieldErrors,
}

/// Phone change page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/phone.html")]
pub struct PhoneTemplate {
    pub page: PageContext,
    pub current: String,
    /// Masked number awaiting its code, if a code was sent.
    pub pending: Option<String>,
    pub phone: String,
    pub error: Option<String>,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<Order>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderTemplate {
    pub page: PageContext,
    pub detail: OrderDetail,
    pub payable: bool,
}

/// Address book template.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub page: PageContext,
    pub addresses: Vec<Address>,
    pub form: AddressForm,
    pub errors: FieldErrors,
}

// =============================================================================
// Profile
// =============================================================================

async fn load_user(state: &AppState, current: &CurrentUser) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("user {} no longer exists", current.id)))
}

async fn profile_template(
    state: &AppState,
    page: PageContext,
    user: User,
    full_name: String,
    errors: FieldErrors,
) -> Result<ProfileTemplate> {
    let mut orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    orders.truncate(RECENT_ORDERS);
    Ok(ProfileTemplate {
        page,
        user,
        full_name,
        orders,
        errors,
    })
}

/// Display the profile page.
#[instrument(skip(state, page), fields(user_id = %current.id))]
pub async fn profile(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse> {
    let user = load_user(&state, &current).await?;
    let full_name = user.full_name.clone();
    profile_template(&state, page, user, full_name, FieldErrors::new()).await
}

/// Update the display name.
#[instrument(skip(state, page, session, headers, form), fields(user_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let full_name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            let user = load_user(&state, &current).await?;
            return Ok(profile_template(&state, page, user, form.full_name, errors)
                .await?
                .into_response());
        }
    };

    let user = UserRepository::new(state.pool())
        .update_name(current.id, &full_name)
        .await?;
    session
        .insert(session_keys::CURRENT_USER, CurrentUser::from(&user))
        .await?;

    Flash::success("پروفایل ذخیره شد.").set(&session).await;
    Ok(see_other(&headers, "/account"))
}

// =============================================================================
// Phone change
// =============================================================================

async fn pending_phone(session: &Session) -> Result<Option<PhoneNumber>> {
    Ok(session
        .get::<PhoneNumber>(session_keys::PENDING_PHONE_CHANGE)
        .await?)
}

/// Display the phone change page.
#[instrument(skip(page, session), fields(user_id = %current.id))]
pub async fn phone_page(
    page: PageContext,
    RequireAuth(current): RequireAuth,
    session: Session,
) -> Result<impl IntoResponse> {
    let pending = pending_phone(&session).await?;
    Ok(PhoneTemplate {
        page,
        current: current.phone.masked(),
        pending: pending.map(|p| p.masked()),
        phone: String::new(),
        error: None,
    })
}

/// Send a confirmation code to the new number.
#[instrument(skip(state, page, session, headers, form), fields(user_id = %current.id))]
pub async fn send_phone_code(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<PhoneForm>,
) -> Result<Response> {
    let pool = state.pool();
    let rejected = |page: PageContext, phone: String, error: String| PhoneTemplate {
        page,
        current: current.phone.masked(),
        pending: None,
        phone,
        error: Some(error),
    };

    let phone = match PhoneNumber::parse(&form.phone) {
        Ok(phone) => phone,
        Err(e) => {
            return Ok(rejected(page, form.phone, phone_message(&e).to_owned()).into_response());
        }
    };
    if phone == current.phone {
        let error = "این شماره هم‌اکنون شماره حساب شماست.".to_owned();
        return Ok(rejected(page, form.phone, error).into_response());
    }
    if UserRepository::new(pool).get_by_phone(&phone).await?.is_some() {
        let error = "این شماره به حساب دیگری متصل است.".to_owned();
        return Ok(rejected(page, form.phone, error).into_response());
    }

    let decision = RateLimiter::new(pool)
        .hit(OTP_SEND_PER_PHONE, phone.as_str())
        .await?;
    if !decision.allowed {
        return Ok(rejected(page, form.phone, decision.user_message()).into_response());
    }

    let otp = OtpService::new(pool, state.sms(), &state.config().session_secret);
    if let Err(e) = otp.issue(&phone, OtpPurpose::ChangePhone).await {
        if e.is_internal() {
            tracing::error!(error = %e, "Failed to issue phone change code");
        }
        return Ok(rejected(page, form.phone, e.user_message()).into_response());
    }

    session
        .insert(session_keys::PENDING_PHONE_CHANGE, &phone)
        .await?;
    Ok(see_other(&headers, "/account/phone"))
}

/// Confirm the code and move the account to the new number.
#[instrument(skip(state, page, session, headers, form), fields(user_id = %current.id))]
pub async fn verify_phone(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<PhoneCodeForm>,
) -> Result<Response> {
    let pool = state.pool();
    let Some(phone) = pending_phone(&session).await? else {
        return Ok(see_other(&headers, "/account/phone"));
    };
    let retry = |page: PageContext, error: String| PhoneTemplate {
        page,
        current: current.phone.masked(),
        pending: Some(phone.masked()),
        phone: String::new(),
        error: Some(error),
    };

    let decision = RateLimiter::new(pool)
        .hit(OTP_VERIFY_PER_PHONE, phone.as_str())
        .await?;
    if !decision.allowed {
        return Ok(retry(page, decision.user_message()).into_response());
    }

    let otp = OtpService::new(pool, state.sms(), &state.config().session_secret);
    if let Err(e) = otp.verify(&phone, OtpPurpose::ChangePhone, &form.code).await {
        return Ok(retry(page, e.user_message()).into_response());
    }

    session
        .remove::<PhoneNumber>(session_keys::PENDING_PHONE_CHANGE)
        .await?;

    let user = match UserRepository::new(pool).change_phone(current.id, &phone).await {
        Ok(user) => user,
        Err(RepositoryError::Conflict(_)) => {
            Flash::error("این شماره در این فاصله به حساب دیگری متصل شد.")
                .set(&session)
                .await;
            return Ok(see_other(&headers, "/account/phone"));
        }
        Err(e) => return Err(e.into()),
    };

    session
        .insert(session_keys::CURRENT_USER, CurrentUser::from(&user))
        .await?;
    set_sentry_user(&user.id, &user.phone.masked());
    tracing::info!("Phone number changed");

    Flash::success("شماره موبایل حساب شما تغییر کرد.")
        .set(&session)
        .await;
    Ok(see_other(&headers, "/account"))
}

// =============================================================================
// Orders
// =============================================================================

/// Display the order history.
#[instrument(skip(state, page), fields(user_id = %current.id))]
pub async fn orders(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.id)
        .await?;
    Ok(OrdersTemplate { page, orders })
}

/// Display one order.
#[instrument(skip(state, page), fields(user_id = %current.id))]
pub async fn order(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
    Path(number): Path<String>,
) -> Result<impl IntoResponse> {
    let detail = OrderRepository::new(state.pool())
        .get_for_user(current.id, &number)
        .await?;
    let payable = detail.order.status.is_payable();
    Ok(OrderTemplate {
        page,
        detail,
        payable,
    })
}

/// Retry payment for an unpaid order.
#[instrument(skip(state, session, headers), fields(user_id = %current.id))]
pub async fn pay_order(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path(number): Path<String>,
) -> Result<Response> {
    let detail = OrderRepository::new(state.pool())
        .get_for_user(current.id, &number)
        .await?;

    let checkout = CheckoutService::new(state.pool(), state.payment(), state.config());
    match checkout.start_payment(&detail.order, Some(&current.phone)).await {
        Ok(gateway_url) => Ok(see_other(&headers, &gateway_url)),
        Err(e) => {
            tracing::warn!(error = %e, number = %number, "Payment retry failed");
            Flash::error(e.user_message()).set(&session).await;
            Ok(see_other(&headers, &format!("/account/orders/{number}")))
        }
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Display the address book.
#[instrument(skip(state, page), fields(user_id = %current.id))]
pub async fn addresses(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse> {
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(current.id)
        .await?;
    let form = AddressForm {
        phone: current.phone.as_str().to_owned(),
        recipient: current.full_name.clone(),
        ..AddressForm::default()
    };
    Ok(AddressesTemplate {
        page,
        addresses,
        form,
        errors: FieldErrors::new(),
    })
}

/// Save a new address.
#[instrument(skip(state, page, session, headers, form), fields(user_id = %current.id))]
pub async fn create_address(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddressForm>,
) -> Result<Response> {
    let repo = AddressRepository::new(state.pool());
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => {
            let addresses = repo.list_for_user(current.id).await?;
            return Ok(AddressesTemplate {
                page,
                addresses,
                form,
                errors,
            }
            .into_response());
        }
    };

    repo.create(current.id, &input).await?;
    Flash::success("نشانی ذخیره شد.").set(&session).await;
    Ok(see_other(&headers, "/account/addresses"))
}

/// Make an address the default.
#[instrument(skip(state, session, headers), fields(user_id = %current.id))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    AddressRepository::new(state.pool())
        .set_default(current.id, AddressId::new(id))
        .await?;
    Flash::success("نشانی پیش‌فرض تغییر کرد.").set(&session).await;
    Ok(see_other(&headers, "/account/addresses"))
}

/// Delete an address.
#[instrument(skip(state, session, headers), fields(user_id = %current.id))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    AddressRepository::new(state.pool())
        .delete(current.id, AddressId::new(id))
        .await?;
    Flash::success("نشانی حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/account/addresses"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_name_is_trimmed_and_required() {
        let ok = ProfileForm {
            full_name: "  مریم احمدی ".to_string(),
        };
        assert_eq!(ok.validate().unwrap(), "مریم احمدی");

        let blank = ProfileForm {
            full_name: "   ".to_string(),
        };
        assert!(blank.validate().unwrap_err().has("full_name"));

        let long = ProfileForm {
            full_name: "ا".repeat(101),
        };
        assert!(long.validate().unwrap_err().has("full_name"));
    }
}
