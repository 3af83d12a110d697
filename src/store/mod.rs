//! Storage seam between the engines and persistence.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{NewOrderLine, NewProduct, Order, OrderLine, OrderStatus, Product, ProductUpdate};

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Transactional storage for products, orders and order lines.
///
/// `begin` opens an atomic unit of work; every operation runs against the
/// returned transaction handle and becomes visible only at `commit`.
/// Dropping an uncommitted transaction rolls back everything done through
/// it. Implementations must serialize concurrent transactions touching the
/// same product's stock so `decrease_stock` can never drive stock below
/// zero.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn create_product(
        &self,
        tx: &mut Self::Tx,
        new: NewProduct,
    ) -> Result<Product, StoreError>;

    async fn find_product(&self, tx: &mut Self::Tx, id: Uuid)
        -> Result<Option<Product>, StoreError>;

    async fn update_product(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError>;

    /// Atomically decrement stock if at least `quantity` units remain.
    /// Returns false, mutating nothing, when the product is missing or its
    /// stock is insufficient.
    async fn decrease_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, StoreError>;

    /// Restock after a cancellation. Returns false only when the product is
    /// missing.
    async fn increase_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, StoreError>;

    /// Insert a `PENDING` order with a fresh id and current timestamps.
    async fn create_order(
        &self,
        tx: &mut Self::Tx,
        user_id: Uuid,
        total_amount: Decimal,
    ) -> Result<Order, StoreError>;

    /// Batch-insert lines for an order, preserving the given order.
    async fn create_order_lines(
        &self,
        tx: &mut Self::Tx,
        order_id: Uuid,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, StoreError>;

    async fn find_order(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// All orders for a user, newest first.
    async fn find_orders_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: Uuid,
    ) -> Result<Vec<Order>, StoreError>;

    /// Returns true iff a row existed and was updated; stamps `updated_at`.
    async fn update_status(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, StoreError>;

    async fn find_lines_by_order(
        &self,
        tx: &mut Self::Tx,
        order_id: Uuid,
    ) -> Result<Vec<OrderLine>, StoreError>;
}
