//! Category repository.

use sqlx::PgPool;

use roghan_core::CategoryId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::{Category, CategoryInput};

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories, parents before children, by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            r"
            SELECT id, slug, name, parent_id, position FROM shop.category
            ORDER BY COALESCE(parent_id, id), parent_id NULLS FIRST, position, name
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// A category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, slug, name, parent_id, position FROM shop.category WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<CategoryId, RepositoryError> {
        let id: CategoryId = sqlx::query_scalar(
            r"
            INSERT INTO shop.category (slug, name, parent_id, position)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(input.slug.as_str())
        .bind(&input.name)
        .bind(input.parent_id)
        .bind(input.position)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category slug"))?;
        Ok(id)
    }

    /// Update a category. A category cannot be its own parent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or the parent
    /// is invalid, `NotFound` if the category does not exist.
    pub async fn update(&self, id: CategoryId, input: &CategoryInput) -> Result<(), RepositoryError> {
        if input.parent_id == Some(id) {
            return Err(RepositoryError::Conflict(
                "category cannot be its own parent".to_owned(),
            ));
        }
        let result = sqlx::query(
            r"
            UPDATE shop.category SET slug = $2, name = $3, parent_id = $4, position = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.slug.as_str())
        .bind(&input.name)
        .bind(input.parent_id)
        .bind(input.position)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("category slug"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a category that has no products. Child categories move to the top level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if products still reference it.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(conflict_on_unique("category"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
