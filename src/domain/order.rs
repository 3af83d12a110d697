//! Order and order line entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status. Orders are created `Pending`; the only transition
/// this service performs is `Pending` -> `Cancelled`. The remaining states
/// are driven by fulfillment systems outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    /// Sum of line subtotals at the moment of creation; never recomputed.
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn can_cancel(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// One product-quantity entry within an order. `price` is the unit price
/// captured when the order was placed; later catalog price changes never
/// touch it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A validated, priced line waiting to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            status,
            total_amount: Decimal::new(19998, 2),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_pending_orders_can_cancel() {
        assert!(order(OrderStatus::Pending).can_cancel());
        assert!(!order(OrderStatus::Confirmed).can_cancel());
        assert!(!order(OrderStatus::Shipped).can_cancel());
        assert!(!order(OrderStatus::Delivered).can_cancel());
        assert!(!order(OrderStatus::Cancelled).can_cancel());
    }

    #[test]
    fn test_line_subtotal() {
        let line = OrderLine {
            id: Uuid::now_v7(),
            order_id: Uuid::now_v7(),
            product_id: Uuid::now_v7(),
            quantity: 2,
            price: Decimal::new(999, 2),
            created_at: Utc::now(),
        };
        assert_eq!(line.subtotal(), Decimal::new(1998, 2));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(OrderStatus::Cancelled.as_str(), "CANCELLED");
        assert_eq!(OrderStatus::Pending.to_string(), "PENDING");
    }
}
