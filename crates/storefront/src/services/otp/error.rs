//! OTP error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::sms::SmsError;

/// Errors that can occur while issuing or verifying a code.
#[derive(Debug, Error)]
pub enum OtpError {
    /// A code was sent less than the resend window ago.
    #[error("resend too soon, retry in {retry_after_secs}s")]
    ResendTooSoon { retry_after_secs: i64 },

    /// No live code for this phone and purpose.
    #[error("no active code")]
    NotFound,

    /// The code expired.
    #[error("code expired")]
    Expired,

    /// The attempt cap was reached.
    #[error("too many attempts")]
    TooManyAttempts,

    /// The input is not a six-digit code.
    #[error("malformed code")]
    Malformed,

    /// Wrong code.
    #[error("invalid code, {remaining} attempts left")]
    InvalidCode { remaining: i32 },

    /// SMS delivery failed.
    #[error("sms error: {0}")]
    Sms(#[from] SmsError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OtpError {
    /// Message shown to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ResendTooSoon { retry_after_secs } => {
                format!("لطفاً {retry_after_secs} ثانیه دیگر برای ارسال دوباره کد تلاش کنید.")
            }
            Self::NotFound => "کد فعالی برای این شماره وجود ندارد. دوباره کد دریافت کنید.".to_string(),
            Self::Expired => "کد منقضی شده است. دوباره کد دریافت کنید.".to_string(),
            Self::TooManyAttempts => {
                "تعداد تلاش‌ها بیش از حد مجاز است. دوباره کد دریافت کنید.".to_string()
            }
            Self::Malformed => "کد تأیید باید ۶ رقم باشد.".to_string(),
            Self::InvalidCode { remaining } => {
                format!("کد وارد شده درست نیست. {remaining} تلاش دیگر باقی مانده است.")
            }
            Self::Sms(_) => "ارسال پیامک ممکن نشد. چند لحظه بعد دوباره تلاش کنید.".to_string(),
            Self::Repository(_) => "خطای داخلی رخ داد. دوباره تلاش کنید.".to_string(),
        }
    }

    /// Whether this is a server-side failure rather than a customer mistake.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Sms(_) | Self::Repository(_))
    }
}
