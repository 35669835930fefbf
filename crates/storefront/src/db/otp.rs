//! OTP request repository.
//!
//! One row per `(phone, purpose)`. Re-issuing overwrites the row, so at most
//! one code is live per phone and purpose.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use roghan_core::{OtpPurpose, PhoneNumber};

use super::RepositoryError;

/// A stored OTP request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRequest {
    pub id: i64,
    pub phone: PhoneNumber,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub last_sent_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

const OTP_COLUMNS: &str =
    "id, phone, purpose, code_hash, attempts, expires_at, last_sent_at, consumed_at";

/// Repository for OTP database operations.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    /// Create a new OTP repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The row for a phone and purpose, in whatever state it is.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(
        &self,
        phone: &PhoneNumber,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, OtpRequest>(&format!(
            "SELECT {OTP_COLUMNS} FROM shop.otp_request WHERE phone = $1 AND purpose = $2"
        ))
        .bind(phone)
        .bind(purpose)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Store a fresh code hash, resetting attempts and consumption.
    ///
    /// The write only happens when the previous code was consumed or was sent
    /// at least `resend_after_secs` ago; the check and the write are one
    /// statement, so two concurrent sends cannot both succeed. Returns the
    /// row ID, or `None` when the resend window is still open.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_if_resendable(
        &self,
        phone: &PhoneNumber,
        purpose: OtpPurpose,
        code_hash: &str,
        ttl_secs: i64,
        resend_after_secs: i64,
    ) -> Result<Option<i64>, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.otp_request
                (phone, purpose, code_hash, attempts, expires_at, last_sent_at)
            VALUES ($1, $2, $3, 0, NOW() + make_interval(secs => $4::double precision), NOW())
            ON CONFLICT (phone, purpose) DO UPDATE
                SET code_hash = EXCLUDED.code_hash,
                    attempts = 0,
                    expires_at = EXCLUDED.expires_at,
                    last_sent_at = EXCLUDED.last_sent_at,
                    consumed_at = NULL
                WHERE shop.otp_request.consumed_at IS NOT NULL
                   OR shop.otp_request.last_sent_at
                      <= NOW() - make_interval(secs => $5::double precision)
            RETURNING id
            ",
        )
        .bind(phone)
        .bind(purpose)
        .bind(code_hash)
        .bind(ttl_secs)
        .bind(resend_after_secs)
        .fetch_optional(self.pool)
        .await?;
        Ok(id)
    }

    /// Remove a request, used when the SMS could not be delivered so the
    /// customer may try again right away.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.otp_request WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Count one verification attempt, if the cap has not been reached.
    ///
    /// Returns the new attempt count, or `None` when the code is consumed or
    /// already at `max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_attempt(
        &self,
        id: i64,
        max_attempts: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let attempts = sqlx::query_scalar(
            r"
            UPDATE shop.otp_request SET attempts = attempts + 1
            WHERE id = $1 AND consumed_at IS NULL AND attempts < $2
            RETURNING attempts
            ",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(self.pool)
        .await?;
        Ok(attempts)
    }

    /// Mark a code as used. Returns `false` if it was consumed concurrently.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.otp_request SET consumed_at = NOW() WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete requests that expired more than a day ago.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.otp_request WHERE expires_at < NOW() - INTERVAL '1 day'")
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
