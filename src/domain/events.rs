//! Transient order lifecycle events.
//!
//! Events are constructed after the placement transaction commits, handed to
//! the publisher once and then discarded; they are never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::Order;

pub const ORDER_CREATED: &str = "ORDER_CREATED";

/// Snapshot of one order line as it looked at placement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineEvent {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// A fresh event id is minted per emission; the order id is the correlation
/// key for consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub items: Vec<OrderLineEvent>,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn order_created(order: &Order, items: Vec<OrderLineEvent>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: ORDER_CREATED.to_string(),
            order_id: order.id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            items,
            timestamp: Utc::now(),
        }
    }
}
