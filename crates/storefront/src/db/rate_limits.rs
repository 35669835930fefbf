//! Fixed-window rate-limit counters.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;

/// Repository for rate-limit buckets.
pub struct RateLimitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RateLimitRepository<'a> {
    /// Create a new rate-limit repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count one hit against `(key, bucket_start)` and return the bucket's total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn hit(&self, key: &str, bucket_start: DateTime<Utc>) -> Result<i32, RepositoryError> {
        let hits = sqlx::query_scalar(
            r"
            INSERT INTO shop.rate_limit_hit (key, bucket_start, hits)
            VALUES ($1, $2, 1)
            ON CONFLICT (key, bucket_start) DO UPDATE
                SET hits = shop.rate_limit_hit.hits + 1
            RETURNING hits
            ",
        )
        .bind(key)
        .bind(bucket_start)
        .fetch_one(self.pool)
        .await?;
        Ok(hits)
    }

    /// Delete buckets that started before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.rate_limit_hit WHERE bucket_start < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
