//! Error taxonomy for order placement and cancellation.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Product with id {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order with id {0} not found")]
    OrderNotFound(Uuid),

    #[error("Insufficient stock for product {product_id}. Available: {available}, requested: {requested}")]
    InsufficientStock {
        product_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("Quantity must be positive, got {quantity} for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: i32 },

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("You can only cancel your own orders")]
    Forbidden,

    #[error("Only pending orders can be cancelled")]
    InvalidState,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, OrderError>;
