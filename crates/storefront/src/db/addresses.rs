//! Shipping address repository.
//!
//! A user has at most one default address. Switching the default clears the
//! previous one inside the same transaction so the partial unique index
//! `address_one_default_per_user` is never violated.

use sqlx::PgPool;

use roghan_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::user::{Address, AddressInput};

const ADDRESS_COLUMNS: &str =
    "id, user_id, recipient, phone, province, city, line, postal_code, is_default, created_at";

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All addresses of a user, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, Address>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM shop.address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// One address, only if it belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not exist or
    /// belongs to someone else.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Save a new address. The first address of a user always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_default: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.address WHERE user_id = $1 AND is_default)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let make_default = input.make_default || !has_default;
        if make_default {
            sqlx::query("UPDATE shop.address SET is_default = FALSE WHERE user_id = $1 AND is_default")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            INSERT INTO shop.address
                (user_id, recipient, phone, province, city, line, postal_code, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&input.recipient)
        .bind(&input.phone)
        .bind(&input.province)
        .bind(&input.city)
        .bind(&input.line)
        .bind(&input.postal_code)
        .bind(make_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the user's default, clearing the previous default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE shop.address SET is_default = FALSE WHERE user_id = $1 AND is_default AND id <> $2",
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result =
            sqlx::query("UPDATE shop.address SET is_default = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the cleared default
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete an address. If it was the default, the newest remaining address
    /// becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM shop.address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(was_default) = was_default else {
            return Err(RepositoryError::NotFound);
        };

        if was_default {
            sqlx::query(
                r"
                UPDATE shop.address SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM shop.address WHERE user_id = $1
                    ORDER BY created_at DESC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
