//! Cart lines and totals.

use roghan_core::{ProductId, Toman};

use crate::config::ShippingConfig;

/// Largest quantity of a single product per order.
pub const MAX_LINE_QUANTITY: i32 = 20;

/// A cart line joined with the product's current price and stock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: Toman,
    pub quantity: i32,
    pub stock: i32,
    pub is_active: bool,
}

impl CartLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Toman {
        self.unit_price * self.quantity
    }

    /// Whether the line can be ordered as-is.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_active && self.quantity <= self.stock
    }
}

/// A cart ready for display or checkout.
#[derive(Debug, Clone, Default)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Toman,
    pub shipping: Toman,
    pub total: Toman,
    pub item_count: i64,
}

impl CartView {
    /// Compute totals for a set of lines.
    #[must_use]
    pub fn new(lines: Vec<CartLine>, shipping: &ShippingConfig) -> Self {
        let subtotal: Toman = lines.iter().map(CartLine::line_total).sum();
        let shipping_fee = shipping.fee_for(subtotal);
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();
        Self {
            lines,
            subtotal,
            shipping: shipping_fee,
            total: subtotal + shipping_fee,
            item_count,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Names of products that are inactive or short on stock.
    #[must_use]
    pub fn unavailable(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| !l.is_available())
            .map(|l| l.name.clone())
            .collect()
    }
}

/// Clamp a requested quantity to what one line may hold.
#[must_use]
pub fn clamp_quantity(requested: i32) -> i32 {
    requested.clamp(1, MAX_LINE_QUANTITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, price: i64, quantity: i32, stock: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            slug: format!("p-{id}"),
            name: format!("Product {id}"),
            image_url: None,
            unit_price: Toman::new(price),
            quantity,
            stock,
            is_active: true,
        }
    }

    fn shipping() -> ShippingConfig {
        ShippingConfig {
            fee: Toman::new(90_000),
            free_threshold: Toman::new(2_000_000),
        }
    }

    #[test]
    fn test_totals_with_shipping() {
        let cart = CartView::new(vec![line(1, 450_000, 2, 5), line(2, 300_000, 1, 1)], &shipping());
        assert_eq!(cart.subtotal, Toman::new(1_200_000));
        assert_eq!(cart.shipping, Toman::new(90_000));
        assert_eq!(cart.total, Toman::new(1_290_000));
        assert_eq!(cart.item_count, 3);
        assert!(cart.unavailable().is_empty());
    }

    #[test]
    fn test_free_shipping_above_threshold() {
        let cart = CartView::new(vec![line(1, 1_000_000, 2, 5)], &shipping());
        assert_eq!(cart.shipping, Toman::ZERO);
        assert_eq!(cart.total, Toman::new(2_000_000));
    }

    #[test]
    fn test_unavailable_lines() {
        let mut inactive = line(2, 100, 1, 10);
        inactive.is_active = false;
        let cart = CartView::new(vec![line(1, 100, 3, 2), inactive, line(3, 100, 1, 1)], &shipping());
        assert_eq!(cart.unavailable(), vec!["Product 1", "Product 2"]);
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(0), 1);
        assert_eq!(clamp_quantity(-3), 1);
        assert_eq!(clamp_quantity(7), 7);
        assert_eq!(clamp_quantity(500), MAX_LINE_QUANTITY);
    }
}
