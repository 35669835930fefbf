//! Engagement event repository.

use sqlx::PgPool;

use roghan_core::{EngagementKind, ProductId, UserId};

use super::RepositoryError;

/// A product and how often it was viewed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductViews {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub views: i64,
}

/// Number of events of one kind.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KindCount {
    pub kind: EngagementKind,
    pub count: i64,
}

/// Repository for engagement events.
pub struct EngagementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EngagementRepository<'a> {
    /// Create a new engagement repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record one event. Events for unknown products are dropped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record(
        &self,
        kind: EngagementKind,
        product_id: Option<ProductId>,
        user_id: Option<UserId>,
        session_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.engagement_event (kind, product_id, user_id, session_key)
            SELECT $1, $2, $3, $4
            WHERE $2::bigint IS NULL OR EXISTS (SELECT 1 FROM shop.product WHERE id = $2)
            ",
        )
        .bind(kind)
        .bind(product_id)
        .bind(user_id)
        .bind(session_key)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Most viewed products over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_viewed(&self, days: i32, limit: i64) -> Result<Vec<ProductViews>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductViews>(
            r"
            SELECT p.id AS product_id, p.name, p.slug, COUNT(*) AS views
            FROM shop.engagement_event e
            JOIN shop.product p ON p.id = e.product_id
            WHERE e.kind = 'product_view' AND e.created_at > NOW() - make_interval(days => $1)
            GROUP BY p.id, p.name, p.slug
            ORDER BY views DESC
            LIMIT $2
            ",
        )
        .bind(days)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Event counts by kind over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts_by_kind(&self, days: i32) -> Result<Vec<KindCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, KindCount>(
            r"
            SELECT kind, COUNT(*) AS count
            FROM shop.engagement_event
            WHERE created_at > NOW() - make_interval(days => $1)
            GROUP BY kind
            ORDER BY kind
            ",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete events older than `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_older_than(&self, days: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM shop.engagement_event WHERE created_at < NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
