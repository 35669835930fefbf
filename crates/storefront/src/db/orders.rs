//! Order repository: placement from a cart, payment bookkeeping and
//! back-office status changes.

use sqlx::PgPool;

use roghan_core::{CartId, OrderId, OrderStatus, UserId};

use super::RepositoryError;
use super::users::escape_like;
use crate::config::ShippingConfig;
use crate::models::cart::{CartLine, CartView};
use crate::models::order::{Order, OrderDetail, OrderItem};
use crate::models::user::AddressInput;

const ORDER_COLUMNS: &str = "id, number, user_id, status, subtotal_toman AS subtotal, \
     shipping_toman AS shipping, total_toman AS total, recipient, phone, province, city, \
     line, postal_code, note, payment_authority, payment_ref_id, card_pan, paid_at, \
     created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, unit_price_toman AS unit_price, quantity";

/// Result of turning a cart into an order.
#[derive(Debug)]
pub enum PlaceOutcome {
    Placed(Order),
    EmptyCart,
    /// Names of products that are inactive or short on stock.
    Unavailable(Vec<String>),
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order from a cart in one transaction.
    ///
    /// Checks every line against current stock and availability, snapshots
    /// names and prices, inserts the order in `pending_payment` and empties
    /// the cart. Stock is only taken once payment is verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// written in that case.
    pub async fn place_from_cart(
        &self,
        cart_id: CartId,
        user_id: UserId,
        address: &AddressInput,
        note: &str,
        shipping: &ShippingConfig,
    ) -> Result<PlaceOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM shop.cart WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

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
        .fetch_all(&mut *tx)
        .await?;

        let cart = CartView::new(lines, shipping);
        if cart.is_empty() {
            return Ok(PlaceOutcome::EmptyCart);
        }
        let unavailable = cart.unavailable();
        if !unavailable.is_empty() {
            return Ok(PlaceOutcome::Unavailable(unavailable));
        }

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO shop.order (
                number, user_id, subtotal_toman, shipping_toman, total_toman,
                recipient, phone, province, city, line, postal_code, note
            )
            VALUES (
                'RG' || nextval('shop.order_number_seq'), $1, $2, $3, $4,
                $5, $6, $7, $8, $9, $10, $11
            )
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(cart.subtotal)
        .bind(cart.shipping)
        .bind(cart.total)
        .bind(&address.recipient)
        .bind(&address.phone)
        .bind(&address.province)
        .bind(&address.city)
        .bind(&address.line)
        .bind(&address.postal_code)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        let product_ids: Vec<i64> = cart.lines.iter().map(|l| l.product_id.as_i64()).collect();
        let names: Vec<String> = cart.lines.iter().map(|l| l.name.clone()).collect();
        let prices: Vec<i64> = cart.lines.iter().map(|l| l.unit_price.amount()).collect();
        let quantities: Vec<i32> = cart.lines.iter().map(|l| l.quantity).collect();

        sqlx::query(
            r"
            INSERT INTO shop.order_item (order_id, product_id, product_name, unit_price_toman, quantity)
            SELECT $1, * FROM UNNEST($2::bigint[], $3::text[], $4::bigint[], $5::int[])
            ",
        )
        .bind(order.id)
        .bind(&product_ids)
        .bind(&names)
        .bind(&prices)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(PlaceOutcome::Placed(order))
    }

    /// Attach a new gateway authority to a payable order and put it back
    /// into `pending_payment`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer payable.
    pub async fn set_authority(&self, id: OrderId, authority: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.order
            SET payment_authority = $2, status = 'pending_payment', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending_payment', 'payment_failed')
            ",
        )
        .bind(id)
        .bind(authority)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict("order is not payable".to_string()));
        }
        Ok(())
    }

    /// The order a gateway authority belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_authority(&self, authority: &str) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE payment_authority = $1"
        ))
        .bind(authority)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Record a verified payment and take the ordered stock.
    ///
    /// Guarded by `status = 'pending_payment'`: returns `false` without
    /// touching anything when the order was already settled, so a replayed
    /// callback is harmless.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// written in that case.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        ref_id: &str,
        card_pan: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<OrderId> = sqlx::query_scalar(
            r"
            UPDATE shop.order
            SET status = 'paid', payment_ref_id = $2, card_pan = $3,
                paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending_payment'
            RETURNING id
            ",
        )
        .bind(id)
        .bind(ref_id)
        .bind(card_pan)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(false);
        }

        // Stock may have been sold elsewhere while the customer was paying;
        // the order still stands and the shortfall floors at zero.
        let short: Vec<String> = sqlx::query_scalar(
            r"
            WITH taken AS (
                UPDATE shop.product p
                SET stock = GREATEST(p.stock - oi.quantity, 0), updated_at = NOW()
                FROM shop.order_item oi
                WHERE oi.order_id = $1 AND p.id = oi.product_id
                RETURNING p.name, p.stock, oi.quantity
            )
            SELECT name FROM taken WHERE stock = 0
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        if !short.is_empty() {
            tracing::warn!(order_id = %id, products = ?short, "Paid order emptied stock");
        }
        Ok(true)
    }

    /// Mark a pending order's payment as failed. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_failed(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.order SET status = 'payment_failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending_payment'
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.order
            WHERE user_id = $1
            ORDER BY created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// One of the user's orders by number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not the user's.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        number: &str,
    ) -> Result<OrderDetail, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE number = $1 AND user_id = $2"
        ))
        .bind(number)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let items = self.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Any order by ID (back-office).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<OrderDetail, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let items = self.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM shop.order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Back-office list filtered by status and searching number, phone and
    /// recipient.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn admin_list(
        &self,
        status: Option<OrderStatus>,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM shop.order
            WHERE ($1::shop.order_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR number ILIKE $2 OR phone LIKE $2 OR recipient ILIKE $2)
            ",
        )
        .bind(status)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.order
            WHERE ($1::shop.order_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR number ILIKE $2 OR phone LIKE $2 OR recipient ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(status)
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Move an order from one status to another.
    ///
    /// Whether the move is allowed is the caller's decision; the `from`
    /// guard only protects against a concurrent change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer in `from`.
    pub async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.order SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict("order status changed".to_string()));
        }
        Ok(())
    }
}
