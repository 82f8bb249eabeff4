//! Cart and order DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use discvault_core::pricing::{PricedLine, line_total, order_total};
use discvault_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// A cart line, priced at the current catalog price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub available: i32,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    #[must_use]
    pub const fn priced(&self) -> PricedLine {
        PricedLine {
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl Cart {
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let priced: Vec<PricedLine> = lines.iter().map(CartLine::priced).collect();
        Self {
            item_count: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            subtotal: order_total(&priced),
            lines,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl OrderItem {
    #[must_use]
    pub fn new(
        id: OrderItemId,
        product_id: ProductId,
        title: String,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id,
            product_id,
            title,
            quantity,
            unit_price,
            line_total: line_total(unit_price, quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub shipping_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// One row of the order history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A line requested at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(cents: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(1),
            title: "Blade Runner".to_string(),
            image_url: None,
            unit_price: Decimal::new(cents, 2),
            quantity,
            line_total: line_total(Decimal::new(cents, 2), quantity),
            available: 10,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from_lines(vec![line(1999, 2), line(500, 1)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, Decimal::new(4498, 2));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(Vec::new());
        assert_eq!(cart.item_count, 0);
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }
}
