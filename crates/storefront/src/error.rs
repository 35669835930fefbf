//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry and logged; the customer only ever sees a short
//! Persian message, never the internal detail.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{CaptchaError, CheckoutError, OtpError, PaymentError, StorageError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// OTP issuance or verification failed.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment gateway failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Captcha rejected or unreachable.
    #[error("Captcha error: {0}")]
    Captcha(#[from] CaptchaError),

    /// Upload storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Otp(err) => match err {
                OtpError::ResendTooSoon { .. } | OtpError::TooManyAttempts => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                OtpError::Sms(_) => StatusCode::BAD_GATEWAY,
                OtpError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart | CheckoutError::Unavailable(_) | CheckoutError::NotPayable => {
                    StatusCode::CONFLICT
                }
                CheckoutError::UnknownAuthority => StatusCode::NOT_FOUND,
                CheckoutError::Payment(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Captcha(CaptchaError::Rejected(_)) => StatusCode::BAD_REQUEST,
            Self::Captcha(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(StorageError::UnsupportedType | StorageError::BadSize(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => {
                "صفحه یا موردی که دنبال آن هستید پیدا نشد.".to_string()
            }
            Self::Database(RepositoryError::Conflict(_)) => {
                "این مورد با اطلاعات موجود تداخل دارد.".to_string()
            }
            Self::Otp(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Payment(_) => "اتصال به درگاه پرداخت ممکن نشد.".to_string(),
            Self::Captcha(CaptchaError::Rejected(_)) => {
                "تأیید «من ربات نیستم» انجام نشد. دوباره تلاش کنید.".to_string()
            }
            Self::Storage(StorageError::UnsupportedType) => {
                "فقط تصاویر JPEG، PNG، WebP و GIF پذیرفته می‌شوند.".to_string()
            }
            Self::Storage(StorageError::BadSize(_)) => {
                "حجم تصویر باید کمتر از ۵ مگابایت باشد.".to_string()
            }
            Self::Unauthorized(_) => "برای ادامه وارد حساب کاربری شوید.".to_string(),
            Self::Forbidden(_) => "به این بخش دسترسی ندارید.".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Database(_)
            | Self::Session(_)
            | Self::Internal(_)
            | Self::Captcha(_)
            | Self::Storage(_) => {
                "خطای داخلی رخ داد. دوباره تلاش کنید.".to_string()
            }
        }
    }

    /// Whether the error is a server-side failure worth reporting.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status();
        let body = format!(
            r#"<div class="alert alert-error" role="alert">{}</div>"#,
            escape_html(&self.user_message())
        );

        (status, Html(body)).into_response()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
/// Only the masked phone number is sent.
pub fn set_sentry_user(user_id: &impl ToString, masked_phone: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(masked_phone.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product castrol-edge".to_string());
        assert_eq!(err.to_string(), "Not found: product castrol-edge");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Otp(OtpError::ResendTooSoon { retry_after_secs: 30 })),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Otp(OtpError::InvalidCode { remaining: 3 })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection refused at 10.0.0.5".to_string());
        assert!(!err.user_message().contains("10.0.0.5"));

        let err = AppError::Database(RepositoryError::DataCorruption("bad row".to_string()));
        assert!(!err.user_message().contains("bad row"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }
}
