//! Product entity.
//!
//! The catalog owns products; order placement only reads them and adjusts
//! `stock` through the storage primitives.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn has_stock(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }
}

/// Fields supplied when creating a product; the store assigns the id and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
}

/// Partial product update; absent fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_stock() {
        let now = Utc::now();
        let product = Product {
            id: Uuid::now_v7(),
            name: "Widget".into(),
            description: None,
            price: Decimal::new(999, 2),
            stock: 3,
            created_at: now,
            updated_at: now,
        };
        assert!(product.has_stock(3));
        assert!(!product.has_stock(4));
    }
}
