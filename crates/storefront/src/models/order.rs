//! Orders and order items.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use roghan_core::{OrderId, OrderItemId, OrderStatus, ProductId, Toman, UserId};

/// A placed order with its shipping snapshot and payment trail.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Toman,
    pub shipping: Toman,
    pub total: Toman,
    pub recipient: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub line: String,
    pub postal_code: String,
    pub note: String,
    pub payment_authority: Option<String>,
    pub payment_ref_id: Option<String>,
    pub card_pan: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Shipping address on one line.
    #[must_use]
    pub fn address_line(&self) -> String {
        format!(
            "{}، {}، {} - کد پستی {}",
            self.province, self.city, self.line, self.postal_code
        )
    }
}

/// A product line frozen at order time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Toman,
    pub quantity: i32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Toman {
        self.unit_price * self.quantity
    }
}

/// An order with its items.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Shipping details submitted at checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    /// Saved address to ship to; when empty the inline fields are used.
    #[serde(default)]
    pub address_id: String,
    #[serde(flatten)]
    pub address: super::user::AddressForm,
    #[serde(default)]
    pub save_address: Option<String>,
    #[serde(default)]
    pub note: String,
}

/// Admin order list query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

impl OrderListQuery {
    /// Parsed status filter; unknown values mean "all".
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Search text (order number or phone).
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_list_query_status() {
        let query = OrderListQuery {
            status: Some("shipped".to_string()),
            q: Some("  ".to_string()),
            page: None,
        };
        assert_eq!(query.status(), Some(OrderStatus::Shipped));
        assert_eq!(query.search(), None);

        let query = OrderListQuery {
            status: Some("all".to_string()),
            ..OrderListQuery::default()
        };
        assert_eq!(query.status(), None);
    }

    #[test]
    fn test_item_line_total() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            product_id: None,
            product_name: "Behran Super Pishtaz".to_string(),
            unit_price: Toman::new(380_000),
            quantity: 3,
        };
        assert_eq!(item.line_total(), Toman::new(1_140_000));
    }
}
