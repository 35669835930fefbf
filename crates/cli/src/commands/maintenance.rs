//! Housekeeping for tables that only ever grow.

use chrono::{Duration, Utc};
use roghan_storefront::db::RepositoryError;
use roghan_storefront::db::carts::CartRepository;
use roghan_storefront::db::otp::OtpRepository;
use roghan_storefront::db::rate_limits::RateLimitRepository;
use thiserror::Error;

use super::ConnectError;

/// Rate-limit buckets older than this can no longer affect a decision.
const RATE_LIMIT_RETENTION: Duration = Duration::days(1);

/// Guest carts untouched for this many days are abandoned.
const GUEST_CART_RETENTION_DAYS: i32 = 30;

/// Errors that can occur during maintenance.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Delete expired OTP codes, rate-limit buckets and abandoned guest carts.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a delete fails.
pub async fn purge() -> Result<(), MaintenanceError> {
    let pool = super::connect().await?;

    let otp_rows = OtpRepository::new(&pool).purge_expired().await?;
    let bucket_rows = RateLimitRepository::new(&pool)
        .purge_before(Utc::now() - RATE_LIMIT_RETENTION)
        .await?;
    let guest_carts = CartRepository::new(&pool)
        .purge_stale_guests(GUEST_CART_RETENTION_DAYS)
        .await?;

    tracing::info!(otp_rows, bucket_rows, guest_carts, "Purge complete");
    Ok(())
}
