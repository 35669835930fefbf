//! Aggregates for the back-office overview page.

use sqlx::PgPool;

use roghan_core::{OrderStatus, Toman};

use super::RepositoryError;

/// Orders in one status.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Paid revenue figures.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct Revenue {
    pub today: Toman,
    pub last_30_days: Toman,
    pub all_time: Toman,
    pub paid_orders: i64,
}

/// Repository for back-office aggregates.
pub struct OverviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OverviewRepository<'a> {
    /// Create a new overview repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Revenue from paid orders (any status past payment).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue(&self) -> Result<Revenue, RepositoryError> {
        let revenue = sqlx::query_as::<_, Revenue>(
            r"
            SELECT
                COALESCE(SUM(total_toman) FILTER (WHERE paid_at >= date_trunc('day', NOW())), 0)::bigint AS today,
                COALESCE(SUM(total_toman) FILTER (WHERE paid_at >= NOW() - INTERVAL '30 days'), 0)::bigint AS last_30_days,
                COALESCE(SUM(total_toman), 0)::bigint AS all_time,
                COUNT(*) AS paid_orders
            FROM shop.order
            WHERE status IN ('paid', 'processing', 'shipped', 'delivered')
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(revenue)
    }

    /// Order counts for every status that has orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let counts = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM shop.order GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(counts)
    }

    /// Active products at or below `threshold` units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock_count(&self, threshold: i32) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.product WHERE is_active AND stock <= $1")
                .bind(threshold)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
