//! Brand repository.

use sqlx::PgPool;

use roghan_core::BrandId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::{Brand, BrandInput};

/// Repository for brand database operations.
pub struct BrandRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BrandRepository<'a> {
    /// Create a new brand repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All brands, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Brand>, RepositoryError> {
        let brands = sqlx::query_as::<_, Brand>(
            "SELECT id, slug, name, description, logo_url FROM shop.brand ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(brands)
    }

    /// A brand by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Brand>, RepositoryError> {
        let brand = sqlx::query_as::<_, Brand>(
            "SELECT id, slug, name, description, logo_url FROM shop.brand WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(brand)
    }

    /// A brand by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand does not exist.
    pub async fn get(&self, id: BrandId) -> Result<Brand, RepositoryError> {
        sqlx::query_as::<_, Brand>(
            "SELECT id, slug, name, description, logo_url FROM shop.brand WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &BrandInput) -> Result<BrandId, RepositoryError> {
        let id: BrandId = sqlx::query_scalar(
            r"
            INSERT INTO shop.brand (slug, name, description, logo_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(input.slug.as_str())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.logo_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("brand slug"))?;
        Ok(id)
    }

    /// Update a brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken, `NotFound` if
    /// the brand does not exist.
    pub async fn update(&self, id: BrandId, input: &BrandInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.brand SET slug = $2, name = $3, description = $4, logo_url = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.slug.as_str())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.logo_url.as_deref())
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("brand slug"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a brand that has no products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if products still reference it.
    pub async fn delete(&self, id: BrandId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.brand WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(conflict_on_unique("brand"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
