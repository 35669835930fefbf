//! One-time password issuance and verification.
//!
//! Codes are six random digits, stored only as an HMAC-SHA256 keyed with the
//! session secret and bound to the phone number and purpose. Policy:
//!
//! - a new code can be requested once the previous one is consumed or was
//!   sent at least [`RESEND_WINDOW_SECS`] ago;
//! - a code lives [`CODE_TTL_SECS`];
//! - a code allows [`MAX_ATTEMPTS`] guesses. The attempt is counted before the
//!   comparison so parallel guesses cannot exceed the cap.
//!
//! The time and attempt rules are pure functions tested without a database.

mod error;

pub use error::OtpError;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use sqlx::PgPool;
use tracing::instrument;

use roghan_core::{OtpPurpose, PhoneNumber};

use crate::db::OtpRepository;
use crate::db::otp::OtpRequest;
use crate::services::sms::SmsClient;
use crate::validation::normalize_digits;

type HmacSha256 = Hmac<Sha256>;

/// Digits per code.
pub const CODE_LENGTH: usize = 6;

/// Minimum seconds between two codes for the same phone and purpose.
pub const RESEND_WINDOW_SECS: i64 = 60;

/// Seconds a code stays valid.
pub const CODE_TTL_SECS: i64 = 5 * 60;

/// Guesses allowed per code.
pub const MAX_ATTEMPTS: i32 = 5;

/// A uniformly random six-digit code, leading zeros kept.
#[must_use]
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

fn keyed_mac(
    secret: &SecretString,
    phone: &PhoneNumber,
    purpose: OtpPurpose,
    code: &str,
) -> Option<HmacSha256> {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return None;
    };
    mac.update(purpose.as_str().as_bytes());
    mac.update(b":");
    mac.update(phone.as_str().as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    Some(mac)
}

/// Hex HMAC of a code bound to its phone and purpose.
#[must_use]
pub fn hash_code(secret: &SecretString, phone: &PhoneNumber, purpose: OtpPurpose, code: &str) -> String {
    keyed_mac(secret, phone, purpose, code)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Constant-time check of a code against a stored hash.
#[must_use]
pub fn code_matches(
    secret: &SecretString,
    phone: &PhoneNumber,
    purpose: OtpPurpose,
    code: &str,
    stored_hash: &str,
) -> bool {
    let Ok(expected) = hex::decode(stored_hash) else {
        return false;
    };
    keyed_mac(secret, phone, purpose, code).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Accept Persian or Arabic digits and stray spaces; `None` unless exactly
/// six digits remain.
#[must_use]
pub fn normalize_code(input: &str) -> Option<String> {
    let code: String = normalize_digits(input)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    (code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}

/// Seconds until a new code may be sent, zero when allowed now.
#[must_use]
pub fn retry_after_secs(last_sent_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (RESEND_WINDOW_SECS - (now - last_sent_at).num_seconds()).clamp(0, RESEND_WINDOW_SECS)
}

/// Whether a stored request can still be verified at `now`.
///
/// # Errors
///
/// Returns `NotFound` for consumed codes, `Expired` past the TTL and
/// `TooManyAttempts` once the cap is reached.
pub fn check_usable(request: &OtpRequest, now: DateTime<Utc>) -> Result<(), OtpError> {
    if request.consumed_at.is_some() {
        return Err(OtpError::NotFound);
    }
    if request.expires_at <= now {
        return Err(OtpError::Expired);
    }
    if request.attempts >= MAX_ATTEMPTS {
        return Err(OtpError::TooManyAttempts);
    }
    Ok(())
}

/// Issues and verifies codes.
pub struct OtpService<'a> {
    pool: &'a PgPool,
    sms: &'a SmsClient,
    secret: &'a SecretString,
}

impl<'a> OtpService<'a> {
    /// Create an OTP service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, sms: &'a SmsClient, secret: &'a SecretString) -> Self {
        Self { pool, sms, secret }
    }

    /// Generate, store and send a code.
    ///
    /// # Errors
    ///
    /// Returns `ResendTooSoon` inside the resend window, `Sms` if delivery
    /// fails (the stored code is dropped so the customer can retry at once).
    #[instrument(skip(self), fields(phone = %phone.masked()))]
    pub async fn issue(&self, phone: &PhoneNumber, purpose: OtpPurpose) -> Result<(), OtpError> {
        let repo = OtpRepository::new(self.pool);
        let code = generate_code();
        let hash = hash_code(self.secret, phone, purpose, &code);

        let Some(id) = repo
            .upsert_if_resendable(phone, purpose, &hash, CODE_TTL_SECS, RESEND_WINDOW_SECS)
            .await?
        else {
            let retry_after_secs = repo
                .find(phone, purpose)
                .await?
                .map_or(RESEND_WINDOW_SECS, |r| retry_after_secs(r.last_sent_at, Utc::now()))
                .max(1);
            return Err(OtpError::ResendTooSoon { retry_after_secs });
        };

        if let Err(e) = self.sms.send_otp(phone, &code).await {
            tracing::error!(error = %e, "OTP delivery failed");
            if let Err(cleanup) = repo.delete(id).await {
                tracing::warn!(error = %cleanup, "Could not drop undelivered OTP");
            }
            return Err(e.into());
        }

        tracing::info!(purpose = %purpose, "OTP issued");
        Ok(())
    }

    /// Check a submitted code and consume it on success.
    ///
    /// # Errors
    ///
    /// Returns the reason the code was not accepted.
    #[instrument(skip(self, input), fields(phone = %phone.masked()))]
    pub async fn verify(
        &self,
        phone: &PhoneNumber,
        purpose: OtpPurpose,
        input: &str,
    ) -> Result<(), OtpError> {
        let code = normalize_code(input).ok_or(OtpError::Malformed)?;
        let repo = OtpRepository::new(self.pool);

        let request = repo.find(phone, purpose).await?.ok_or(OtpError::NotFound)?;
        check_usable(&request, Utc::now())?;

        let attempts = repo
            .record_attempt(request.id, MAX_ATTEMPTS)
            .await?
            .ok_or(OtpError::TooManyAttempts)?;

        if !code_matches(self.secret, phone, purpose, &code, &request.code_hash) {
            tracing::info!(attempts, "OTP mismatch");
            return Err(OtpError::InvalidCode {
                remaining: MAX_ATTEMPTS - attempts,
            });
        }

        if !repo.consume(request.id).await? {
            return Err(OtpError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn secret() -> SecretString {
        SecretString::from("k3T9#vQ2!mZ8@pL5^rW1&xN7*bH4$cJ6")
    }

    fn phone() -> PhoneNumber {
        PhoneNumber::parse("09121234567").unwrap()
    }

    fn request(attempts: i32, expires_in: Duration, consumed: bool) -> OtpRequest {
        let now = Utc::now();
        OtpRequest {
            id: 1,
            phone: phone(),
            purpose: OtpPurpose::Login,
            code_hash: String::new(),
            attempts,
            expires_at: now + expires_in,
            last_sent_at: now,
            consumed_at: consumed.then_some(now),
        }
    }

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_binds_phone_and_purpose() {
        let h = hash_code(&secret(), &phone(), OtpPurpose::Login, "123456");
        assert!(code_matches(&secret(), &phone(), OtpPurpose::Login, "123456", &h));
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::Login, "123457", &h));
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::ChangePhone, "123456", &h));

        let other = PhoneNumber::parse("09351234567").unwrap();
        assert!(!code_matches(&secret(), &other, OtpPurpose::Login, "123456", &h));
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::Login, "123456", "not-hex"));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" ۱۲۳ ۴۵۶ ").as_deref(), Some("123456"));
        assert_eq!(normalize_code("012-345").as_deref(), Some("012345"));
        assert_eq!(normalize_code("12345"), None);
        assert_eq!(normalize_code("12345a"), None);
    }

    #[test]
    fn test_resend_window() {
        let sent = Utc::now();
        assert_eq!(retry_after_secs(sent, sent), RESEND_WINDOW_SECS);
        assert_eq!(retry_after_secs(sent, sent + Duration::seconds(45)), 15);
        assert_eq!(retry_after_secs(sent, sent + Duration::seconds(60)), 0);
        assert_eq!(retry_after_secs(sent, sent + Duration::hours(1)), 0);
    }

    #[test]
    fn test_check_usable() {
        let now = Utc::now();
        assert!(check_usable(&request(0, Duration::minutes(5), false), now).is_ok());
        assert!(matches!(
            check_usable(&request(0, Duration::minutes(5), true), now),
            Err(OtpError::NotFound)
        ));
        assert!(matches!(
            check_usable(&request(0, Duration::seconds(-1), false), now),
            Err(OtpError::Expired)
        ));
        assert!(matches!(
            check_usable(&request(MAX_ATTEMPTS, Duration::minutes(5), false), now),
            Err(OtpError::TooManyAttempts)
        ));
        assert!(check_usable(&request(MAX_ATTEMPTS - 1, Duration::minutes(5), false), now).is_ok());
    }

    #[test]
    fn test_user_messages_are_persian() {
        let message = OtpError::ResendTooSoon { retry_after_secs: 42 }.user_message();
        assert!(message.contains("42"));
        assert!(OtpError::InvalidCode { remaining: 2 }.user_message().contains('2'));
        assert!(!OtpError::Expired.is_internal());
    }
}
