//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `otp` - One-time password issuance and verification
//! - `sms` - OTP delivery through Kavenegar or SMS.ir
//! - `payment` - `ZarinPal` gateway client
//! - `checkout` - Order placement and payment settlement
//! - `captcha` - Cloudflare Turnstile verification
//! - `rate_limit` - Database-backed fixed-window limits
//! - `storage` - Image uploads to disk or S3

pub mod captcha;
pub mod checkout;
pub mod otp;
pub mod payment;
pub mod rate_limit;
pub mod sms;
pub mod storage;

pub use captcha::{CaptchaError, CaptchaVerifier};
pub use checkout::{CallbackOutcome, CheckoutError, CheckoutService};
pub use otp::{OtpError, OtpService};
pub use payment::{PaymentClient, PaymentError};
pub use rate_limit::RateLimiter;
pub use sms::{SmsClient, SmsError};
pub use storage::{Storage, StorageError};
