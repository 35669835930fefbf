//! Authentication route handlers.
//!
//! Sign-in is passwordless: the customer enters a mobile number, receives a
//! six-digit code by SMS and is signed in (or registered) once the code
//! checks out. A guest cart is merged into the account at that moment.

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
use uuid::Uuid;

use roghan_core::{OtpPurpose, PhoneNumber};

use crate::db::{CartRepository, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{ClientIp, OptionalAuth, PageContext, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::captcha::RESPONSE_FIELD;
use crate::services::rate_limit::{OTP_SEND_PER_IP, OTP_SEND_PER_PHONE, OTP_VERIFY_PER_PHONE};
use crate::services::{OtpError, OtpService, RateLimiter};
use crate::state::AppState;
use crate::validation::phone_message;

use super::{safe_next, see_other};

/// Query for the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Phone number form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub phone: String,
    #[serde(rename = "cf-turnstile-response", default)]
    pub captcha: Option<String>,
}

/// Code form.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub code: String,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub phone: String,
    pub error: Option<String>,
    pub captcha_site_key: Option<String>,
    pub captcha_field: &'static str,
}

/// Code entry page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/verify.html")]
pub struct VerifyTemplate {
    pub page: PageContext,
    pub masked_phone: String,
    pub error: Option<String>,
}

fn login_template(
    state: &AppState,
    page: PageContext,
    phone: String,
    error: Option<String>,
) -> LoginTemplate {
    LoginTemplate {
        page,
        phone,
        error,
        captcha_site_key: state.captcha().site_key().map(str::to_owned),
        captcha_field: RESPONSE_FIELD,
    }
}

/// Display the login page.
///
/// A signed-in visitor is sent straight on. `?next=` is remembered so the
/// customer lands back where sign-in was asked for.
#[instrument(skip(state, page, session, user))]
pub async fn login_page(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    let next = safe_next(query.next.as_deref());

    if user.is_some() {
        return Ok(Redirect::to(next.as_deref().unwrap_or("/account")).into_response());
    }
    if let Some(next) = next {
        session.insert(session_keys::RETURN_TO, next).await?;
    }

    Ok(login_template(&state, page, String::new(), None).into_response())
}

/// Send a sign-in code to the submitted number.
#[instrument(skip(state, page, session, headers, form))]
pub async fn send_code(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let pool = state.pool();
    let ip = ip.map(|ip| ip.to_string());

    if let Err(e) = state
        .captcha()
        .verify(form.captcha.as_deref(), ip.as_deref())
        .await
    {
        tracing::info!(error = %e, "Captcha check failed on login");
        let error = AppError::from(e).user_message();
        return Ok(login_template(&state, page, form.phone, Some(error)).into_response());
    }

    let phone = match PhoneNumber::parse(&form.phone) {
        Ok(phone) => phone,
        Err(e) => {
            let error = phone_message(&e).to_owned();
            return Ok(login_template(&state, page, form.phone, Some(error)).into_response());
        }
    };

    let limiter = RateLimiter::new(pool);
    let by_ip = limiter
        .hit(OTP_SEND_PER_IP, ip.as_deref().unwrap_or("unknown"))
        .await?;
    let by_phone = limiter.hit(OTP_SEND_PER_PHONE, phone.as_str()).await?;
    if let Some(blocked) = [by_ip, by_phone].into_iter().find(|d| !d.allowed) {
        let error = blocked.user_message();
        return Ok(login_template(&state, page, form.phone, Some(error)).into_response());
    }

    let otp = OtpService::new(pool, state.sms(), &state.config().session_secret);
    match otp.issue(&phone, OtpPurpose::Login).await {
        Ok(()) => {}
        // A live code is already on its way; let the customer type it in
        Err(e @ OtpError::ResendTooSoon { .. }) => {
            Flash::error(e.user_message()).set(&session).await;
        }
        Err(e) => {
            if e.is_internal() {
                tracing::error!(error = %e, "Failed to issue login code");
            }
            return Ok(login_template(&state, page, form.phone, Some(e.user_message())).into_response());
        }
    }

    let masked = phone.masked();
    add_breadcrumb("auth", "Login code sent", Some(&[("phone", masked.as_str())]));
    session.insert(session_keys::PENDING_LOGIN_PHONE, &phone).await?;
    Ok(see_other(&headers, "/auth/verify"))
}

/// Display the code entry page.
#[instrument(skip(page, session))]
pub async fn verify_page(page: PageContext, session: Session) -> Result<Response> {
    let Some(phone) = session
        .get::<PhoneNumber>(session_keys::PENDING_LOGIN_PHONE)
        .await?
    else {
        return Ok(Redirect::to("/auth/login").into_response());
    };

    Ok(VerifyTemplate {
        page,
        masked_phone: phone.masked(),
        error: None,
    }
    .into_response())
}

/// Check the code and sign the customer in.
#[instrument(skip(state, page, session, headers, form))]
pub async fn verify(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<VerifyForm>,
) -> Result<Response> {
    let pool = state.pool();
    let Some(phone) = session
        .get::<PhoneNumber>(session_keys::PENDING_LOGIN_PHONE)
        .await?
    else {
        return Ok(see_other(&headers, "/auth/login"));
    };

    let decision = RateLimiter::new(pool)
        .hit(OTP_VERIFY_PER_PHONE, phone.as_str())
        .await?;
    if !decision.allowed {
        return Ok(VerifyTemplate {
            page,
            masked_phone: phone.masked(),
            error: Some(decision.user_message()),
        }
        .into_response());
    }

    let otp = OtpService::new(pool, state.sms(), &state.config().session_secret);
    if let Err(e) = otp.verify(&phone, OtpPurpose::Login, &form.code).await {
        if e.is_internal() {
            tracing::error!(error = %e, "Failed to verify login code");
        }
        return Ok(VerifyTemplate {
            page,
            masked_phone: phone.masked(),
            error: Some(e.user_message()),
        }
        .into_response());
    }

    let (user, created) = UserRepository::new(pool)
        .find_or_create_verified(&phone)
        .await?;

    if let Some(token) = session.remove::<Uuid>(session_keys::CART_TOKEN).await? {
        match CartRepository::new(pool).merge_guest(token, user.id).await {
            Ok(merged) if merged > 0 => tracing::info!(user_id = %user.id, merged, "Merged guest cart"),
            Ok(_) => {}
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Guest cart merge failed"),
        }
    }
    session
        .remove::<PhoneNumber>(session_keys::PENDING_LOGIN_PHONE)
        .await?;
    let next = session
        .remove::<String>(session_keys::RETURN_TO)
        .await?
        .and_then(|next| safe_next(Some(&next)));

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current).await?;
    set_sentry_user(&user.id, &phone.masked());
    tracing::info!(user_id = %user.id, created, "User signed in");

    if created {
        Flash::success("خوش آمدید! حساب شما ساخته شد. نام خود را در پروفایل وارد کنید.")
            .set(&session)
            .await;
        return Ok(see_other(&headers, next.as_deref().unwrap_or("/account")));
    }

    Flash::success(format!("{} عزیز، خوش آمدید.", current.display_name()))
        .set(&session)
        .await;
    Ok(see_other(&headers, next.as_deref().unwrap_or("/")))
}

/// Sign out and discard the session.
#[instrument(skip(session, headers))]
pub async fn logout(session: Session, headers: HeaderMap) -> Result<Response> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(see_other(&headers, "/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_reads_turnstile_field() {
        let form: LoginForm = serde_json::from_value(serde_json::json!({
            "phone": "09121234567",
            "cf-turnstile-response": "tok",
        }))
        .unwrap();
        assert_eq!(form.phone, "09121234567");
        assert_eq!(form.captcha.as_deref(), Some("tok"));
    }
}
