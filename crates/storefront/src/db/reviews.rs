//! Product review repository.

use sqlx::PgPool;

use roghan_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::RatingSummary;
use crate::models::community::Review;

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, p.name AS product_name, p.slug AS product_slug,
           COALESCE(NULLIF(u.full_name, ''), 'کاربر روغن') AS author_name,
           r.rating, r.body, r.is_approved, r.created_at
    FROM shop.product_review r
    JOIN shop.product p ON p.id = r.product_id
    JOIN shop.user u ON u.id = r.user_id
";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a review, pending approval. One review per user and product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i16,
        body: &str,
    ) -> Result<ReviewId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.product_review (product_id, user_id, rating, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(body)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("review"))?;
        Ok(id)
    }

    /// Approved reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn approved_for(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 AND r.is_approved ORDER BY r.created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Average rating and count of approved reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> Result<RatingSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            r"
            SELECT ROUND(AVG(rating)::numeric, 1) AS average, COUNT(*) AS count
            FROM shop.product_review
            WHERE product_id = $1 AND is_approved
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Back-office list, unapproved first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn admin_list(&self, pending_only: bool) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE NOT $1 OR NOT r.is_approved
            ORDER BY r.is_approved, r.created_at DESC
            LIMIT 200
            "
        ))
        .bind(pending_only)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Approve a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn approve(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.product_review SET is_approved = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product_review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Reviews awaiting approval.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_count(&self) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.product_review WHERE NOT is_approved")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
