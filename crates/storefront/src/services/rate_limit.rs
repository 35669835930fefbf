//! Database-backed fixed-window rate limiting.
//!
//! Time is cut into windows aligned to the Unix epoch
//! (`bucket_start = floor(now / window) * window`). Every hit increments the
//! counter of `(key, bucket_start)`; the request is allowed while the count
//! stays within the limit. Counters survive restarts and are shared by every
//! instance, unlike the in-memory per-IP limiter on `/auth`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;

use crate::db::{RateLimitRepository, RepositoryError};

/// A named limit: at most `limit` hits per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub name: &'static str,
    pub limit: i32,
    pub window_secs: i64,
}

/// OTP sends per phone number.
pub const OTP_SEND_PER_PHONE: Policy = Policy {
    name: "otp_send_phone",
    limit: 3,
    window_secs: 10 * 60,
};

/// OTP sends per client IP.
pub const OTP_SEND_PER_IP: Policy = Policy {
    name: "otp_send_ip",
    limit: 10,
    window_secs: 10 * 60,
};

/// OTP verifications per phone number.
pub const OTP_VERIFY_PER_PHONE: Policy = Policy {
    name: "otp_verify_phone",
    limit: 10,
    window_secs: 10 * 60,
};

/// Questions per user.
pub const QUESTION_PER_USER: Policy = Policy {
    name: "question_user",
    limit: 5,
    window_secs: 60 * 60,
};

/// Reviews per user.
pub const REVIEW_PER_USER: Policy = Policy {
    name: "review_user",
    limit: 5,
    window_secs: 60 * 60,
};

/// Buckets older than this many seconds are deleted.
pub const RETENTION_SECS: i64 = 24 * 60 * 60;

/// Outcome of one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub hits: i32,
    /// Seconds until the current window closes.
    pub retry_after_secs: i64,
}

impl Decision {
    /// Message shown to the customer when the hit was refused.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!(
            "درخواست‌های زیادی ثبت شده است. {} ثانیه دیگر دوباره تلاش کنید.",
            self.retry_after_secs
        )
    }
}

/// Start of the window containing `now`.
#[must_use]
pub fn bucket_start(now: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    let window = window_secs.max(1);
    let start = now.timestamp().div_euclid(window) * window;
    Utc.timestamp_opt(start, 0).single().unwrap_or(now)
}

/// Decide a hit count against a policy at `now`.
#[must_use]
pub fn decide(policy: Policy, hits: i32, now: DateTime<Utc>) -> Decision {
    let window_end = bucket_start(now, policy.window_secs) + Duration::seconds(policy.window_secs);
    Decision {
        allowed: hits <= policy.limit,
        hits,
        retry_after_secs: (window_end - now).num_seconds().max(1),
    }
}

/// Key of a policy applied to a subject (phone, IP, user ID).
#[must_use]
pub fn key(policy: Policy, subject: &str) -> String {
    format!("{}:{subject}", policy.name)
}

/// Applies policies against the `rate_limit_hit` table.
pub struct RateLimiter<'a> {
    pool: &'a PgPool,
}

impl<'a> RateLimiter<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count a hit for `subject` under `policy`.
    ///
    /// About one hit in a hundred also purges expired buckets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the counter update fails.
    pub async fn hit(&self, policy: Policy, subject: &str) -> Result<Decision, RepositoryError> {
        let now = Utc::now();
        let repo = RateLimitRepository::new(self.pool);
        let hits = repo
            .hit(&key(policy, subject), bucket_start(now, policy.window_secs))
            .await?;

        if rand::random_ratio(1, 100) {
            match repo.purge_before(now - Duration::seconds(RETENTION_SECS)).await {
                Ok(purged) if purged > 0 => tracing::debug!(purged, "Purged rate-limit buckets"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Rate-limit purge failed"),
            }
        }

        let decision = decide(policy, hits, now);
        if !decision.allowed {
            tracing::info!(policy = policy.name, hits, "Rate limit exceeded");
        }
        Ok(decision)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_bucket_start_floors_to_window() {
        assert_eq!(bucket_start(at(1_200), 600), at(1_200));
        assert_eq!(bucket_start(at(1_799), 600), at(1_200));
        assert_eq!(bucket_start(at(1_800), 600), at(1_800));
    }

    #[test]
    fn test_decide_allows_up_to_limit() {
        let now = at(1_250);
        assert!(decide(OTP_SEND_PER_PHONE, 3, now).allowed);
        let blocked = decide(OTP_SEND_PER_PHONE, 4, now);
        assert!(!blocked.allowed);
        assert_eq!(blocked.retry_after_secs, 550);
        assert!(blocked.user_message().contains("550"));
    }

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(key(OTP_SEND_PER_IP, "203.0.113.9"), "otp_send_ip:203.0.113.9");
        assert_ne!(key(OTP_SEND_PER_PHONE, "x"), key(OTP_VERIFY_PER_PHONE, "x"));
    }
}
