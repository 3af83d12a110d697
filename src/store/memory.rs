//! In-memory storage for tests and local runs.
//!
//! Transactions are copy-on-write: `begin` snapshots the shared state while
//! holding an owned mutex guard, operations mutate the snapshot, and
//! `commit` swaps it back. Keeping the guard for the lifetime of the
//! transaction serializes all units of work, which gives the same isolation
//! the Postgres backend gets from its transaction scope. Dropping a
//! transaction without committing discards the snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Storage, StoreError};
use crate::domain::{NewOrderLine, NewProduct, Order, OrderLine, OrderStatus, Product, ProductUpdate};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    lines: HashMap<Uuid, Vec<OrderLine>>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn commit(&self, mut tx: MemoryTx) -> Result<(), StoreError> {
        *tx.guard = tx.work;
        Ok(())
    }

    async fn create_product(
        &self,
        tx: &mut MemoryTx,
        new: NewProduct,
    ) -> Result<Product, StoreError> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::now_v7(),
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            created_at: now,
            updated_at: now,
        };
        tx.work.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, tx: &mut MemoryTx, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(tx.work.products.get(&id).cloned())
    }

    async fn update_product(
        &self,
        tx: &mut MemoryTx,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError> {
        let Some(product) = tx.work.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = Some(description);
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(stock) = update.stock {
            product.stock = stock;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn decrease_stock(
        &self,
        tx: &mut MemoryTx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, StoreError> {
        match tx.work.products.get_mut(&product_id) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increase_stock(
        &self,
        tx: &mut MemoryTx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, StoreError> {
        match tx.work.products.get_mut(&product_id) {
            Some(product) => {
                product.stock += quantity;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_order(
        &self,
        tx: &mut MemoryTx,
        user_id: Uuid,
        total_amount: Decimal,
    ) -> Result<Order, StoreError> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::now_v7(),
            user_id,
            status: OrderStatus::Pending,
            total_amount,
            created_at: now,
            updated_at: now,
        };
        tx.work.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn create_order_lines(
        &self,
        tx: &mut MemoryTx,
        order_id: Uuid,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, StoreError> {
        let now = Utc::now();
        let created: Vec<OrderLine> = lines
            .iter()
            .map(|line| OrderLine {
                id: Uuid::now_v7(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
                created_at: now,
            })
            .collect();
        tx.work
            .lines
            .entry(order_id)
            .or_default()
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn find_order(&self, tx: &mut MemoryTx, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(tx.work.orders.get(&id).cloned())
    }

    async fn find_orders_by_user(
        &self,
        tx: &mut MemoryTx,
        user_id: Uuid,
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = tx
            .work
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_status(
        &self,
        tx: &mut MemoryTx,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, StoreError> {
        match tx.work.orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_lines_by_order(
        &self,
        tx: &mut MemoryTx,
        order_id: Uuid,
    ) -> Result<Vec<OrderLine>, StoreError> {
        Ok(tx.work.lines.get(&order_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(stock: i32) -> NewProduct {
        NewProduct {
            name: "Widget".into(),
            description: None,
            price: Decimal::new(999, 2),
            stock,
        }
    }

    #[tokio::test]
    async fn test_decrease_stock_is_conditional() {
        let store = MemoryStorage::new();
        let mut tx = store.begin().await.unwrap();
        let product = store.create_product(&mut tx, widget(2)).await.unwrap();

        assert!(!store.decrease_stock(&mut tx, product.id, 5).await.unwrap());
        let unchanged = store.find_product(&mut tx, product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.stock, 2);

        assert!(store.decrease_stock(&mut tx, product.id, 2).await.unwrap());
        let drained = store.find_product(&mut tx, product.id).await.unwrap().unwrap();
        assert_eq!(drained.stock, 0);
        store.commit(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_decrease_stock_missing_product() {
        let store = MemoryStorage::new();
        let mut tx = store.begin().await.unwrap();
        assert!(!store.decrease_stock(&mut tx, Uuid::now_v7(), 1).await.unwrap());
        store.commit(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_increase_stock_missing_product() {
        let store = MemoryStorage::new();
        let mut tx = store.begin().await.unwrap();
        assert!(!store.increase_stock(&mut tx, Uuid::now_v7(), 1).await.unwrap());
        store.commit(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStorage::new();

        let mut tx = store.begin().await.unwrap();
        let product = store.create_product(&mut tx, widget(10)).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(store.find_product(&mut tx, product.id).await.unwrap().is_none());
        store.commit(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryStorage::new();

        let mut tx = store.begin().await.unwrap();
        let product = store.create_product(&mut tx, widget(10)).await.unwrap();
        store.commit(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(store.find_product(&mut tx, product.id).await.unwrap().is_some());
        store.commit(tx).await.unwrap();
    }
}
