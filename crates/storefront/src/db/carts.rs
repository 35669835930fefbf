//! Cart repository.
//!
//! A cart belongs either to a signed-in user or to a guest token kept in the
//! session. At sign-in the guest cart is folded into the user's cart.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roghan_core::{CartId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{CartLine, MAX_LINE_QUANTITY};

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    Guest(Uuid),
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The owner's cart, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: CartOwner) -> Result<Option<CartId>, RepositoryError> {
        let id = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_scalar("SELECT id FROM shop.cart WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(self.pool)
                    .await?
            }
            CartOwner::Guest(token) => {
                sqlx::query_scalar("SELECT id FROM shop.cart WHERE token = $1")
                    .bind(token)
                    .fetch_optional(self.pool)
                    .await?
            }
        };
        Ok(id)
    }

    /// The owner's cart, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, owner: CartOwner) -> Result<CartId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = get_or_create_in(&mut tx, owner).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Add a product, summing with any existing quantity up to the line cap.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is missing or inactive.
    pub async fn add(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO shop.cart_item (cart_id, product_id, quantity)
            SELECT $1, p.id, $3 FROM shop.product p WHERE p.id = $2 AND p.is_active
            ON CONFLICT (cart_id, product_id) DO UPDATE
                SET quantity = LEAST(shop.cart_item.quantity + EXCLUDED.quantity, $4)
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        touch(self.pool, cart_id).await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.cart_item SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        touch(self.pool, cart_id).await
    }

    /// Remove a line. Removing a missing line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, cart_id: CartId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        touch(self.pool, cart_id).await
    }

    /// Lines with current product price and stock, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(
            r"
            SELECT p.id AS product_id, p.slug, p.name, p.image_url,
                   p.price_toman AS unit_price, ci.quantity, p.stock, p.is_active
            FROM shop.cart_item ci
            JOIN shop.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.added_at, p.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;
        Ok(lines)
    }

    /// Total quantity in the owner's cart, zero when there is no cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn item_count(&self, owner: CartOwner) -> Result<i64, RepositoryError> {
        let (user_id, token) = match owner {
            CartOwner::User(id) => (Some(id), None),
            CartOwner::Guest(token) => (None, Some(token)),
        };
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(ci.quantity), 0)::bigint
            FROM shop.cart c
            JOIN shop.cart_item ci ON ci.cart_id = c.id
            WHERE ($1::bigint IS NOT NULL AND c.user_id = $1)
               OR ($2::uuid IS NOT NULL AND c.token = $2)
            ",
        )
        .bind(user_id)
        .bind(token)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Fold a guest cart into the user's cart and delete the guest cart.
    ///
    /// Quantities of products present in both carts are summed up to the
    /// line cap. Returns the number of lines moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// merged in that case.
    pub async fn merge_guest(&self, token: Uuid, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest: Option<CartId> =
            sqlx::query_scalar("SELECT id FROM shop.cart WHERE token = $1 FOR UPDATE")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(guest) = guest else {
            return Ok(0);
        };

        let target = get_or_create_in(&mut tx, CartOwner::User(user_id)).await?;

        let moved = sqlx::query(
            r"
            INSERT INTO shop.cart_item (cart_id, product_id, quantity, added_at)
            SELECT $2, product_id, LEAST(quantity, $3), added_at
            FROM shop.cart_item WHERE cart_id = $1
            ON CONFLICT (cart_id, product_id) DO UPDATE
                SET quantity = LEAST(shop.cart_item.quantity + EXCLUDED.quantity, $3)
            ",
        )
        .bind(guest)
        .bind(target)
        .bind(MAX_LINE_QUANTITY)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM shop.cart WHERE id = $1")
            .bind(guest)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(moved)
    }

    /// Delete guest carts untouched for the given number of days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_stale_guests(&self, days: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.cart
            WHERE user_id IS NULL AND updated_at < NOW() - make_interval(days => $1)
            ",
        )
        .bind(days)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Find or create a cart inside an open transaction.
pub(crate) async fn get_or_create_in(
    tx: &mut Transaction<'_, Postgres>,
    owner: CartOwner,
) -> Result<CartId, RepositoryError> {
    let id = match owner {
        CartOwner::User(user_id) => {
            sqlx::query_scalar(
                r"
                INSERT INTO shop.cart (user_id) VALUES ($1)
                ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
                RETURNING id
                ",
            )
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?
        }
        CartOwner::Guest(token) => {
            sqlx::query_scalar(
                r"
                INSERT INTO shop.cart (token) VALUES ($1)
                ON CONFLICT (token) DO UPDATE SET updated_at = NOW()
                RETURNING id
                ",
            )
            .bind(token)
            .fetch_one(&mut **tx)
            .await?
        }
    };
    Ok(id)
}

async fn touch(pool: &PgPool, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}
