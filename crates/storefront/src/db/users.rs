//! User repository for database operations.

use sqlx::PgPool;

use roghan_core::{PhoneNumber, UserId, UserRole};

use super::{RepositoryError, conflict_on_unique};
use crate::models::user::User;

const USER_COLUMNS: &str =
    "id, phone, full_name, role, phone_verified_at, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their mobile number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Find the account for a verified phone number, creating it on first sign-in.
    ///
    /// Returns the user and whether it was just created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_or_create_verified(
        &self,
        phone: &PhoneNumber,
    ) -> Result<(User, bool), RepositoryError> {
        // xmax = 0 only for freshly inserted rows
        let row = sqlx::query_as::<_, UserWithCreated>(&format!(
            r"
            INSERT INTO shop.user (phone, phone_verified_at)
            VALUES ($1, NOW())
            ON CONFLICT (phone) DO UPDATE
                SET phone_verified_at = COALESCE(shop.user.phone_verified_at, NOW())
            RETURNING {USER_COLUMNS}, (xmax = 0) AS created
            "
        ))
        .bind(phone)
        .fetch_one(self.pool)
        .await?;

        Ok((row.user, row.created))
    }

    /// Update the display name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_name(&self, id: UserId, full_name: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE shop.user SET full_name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(full_name)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Move the account to a newly verified phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another account owns the number.
    pub async fn change_phone(
        &self,
        id: UserId,
        phone: &PhoneNumber,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE shop.user
            SET phone = $2, phone_verified_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(phone)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("phone number"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Set the account role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.user SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the role of the account owning a phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no account uses the number.
    pub async fn set_role_by_phone(
        &self,
        phone: &PhoneNumber,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE shop.user SET role = $2, updated_at = NOW()
            WHERE phone = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(phone)
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// List users for the back-office, newest first, optionally searching
    /// phone and name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), RepositoryError> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM shop.user
            WHERE $1::text IS NULL OR phone LIKE $1 OR full_name ILIKE $1
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            r"
            SELECT {USER_COLUMNS} FROM shop.user
            WHERE $1::text IS NULL OR phone LIKE $1 OR full_name ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((users, total))
    }
}

#[derive(sqlx::FromRow)]
struct UserWithCreated {
    #[sqlx(flatten)]
    user: User,
    created: bool,
}

/// Escape `%`, `_` and `\` for use inside a `LIKE` pattern.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("کاسترول"), "کاسترول");
    }
}
