//! Postgres storage backed by sqlx.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Storage, StoreError};
use crate::domain::{NewOrderLine, NewProduct, Order, OrderLine, OrderStatus, Product, ProductUpdate};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn create_product(
        &self,
        tx: &mut Self::Tx,
        new: NewProduct,
    ) -> Result<Product, StoreError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, description, price, stock, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .fetch_one(&mut **tx)
        .await?;
        Ok(product)
    }

    async fn find_product(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
    ) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError> {
        let Some(existing) = self.find_product(tx, id).await? else {
            return Ok(None);
        };
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET name = $2, description = $3, price = $4, stock = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(update.name.unwrap_or(existing.name))
        .bind(update.description.or(existing.description))
        .bind(update.price.unwrap_or(existing.price))
        .bind(update.stock.unwrap_or(existing.stock))
        .fetch_one(&mut **tx)
        .await?;
        Ok(Some(product))
    }

    async fn decrease_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, StoreError> {
        // Single conditional statement: the stock check and the decrement
        // happen atomically under the transaction's row lock.
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn increase_stock(
        &self,
        tx: &mut Self::Tx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn create_order(
        &self,
        tx: &mut Self::Tx,
        user_id: Uuid,
        total_amount: Decimal,
    ) -> Result<Order, StoreError> {
        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, status, total_amount, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(OrderStatus::Pending)
        .bind(total_amount)
        .fetch_one(&mut **tx)
        .await?;
        Ok(order)
    }

    async fn create_order_lines(
        &self,
        tx: &mut Self::Tx,
        order_id: Uuid,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, StoreError> {
        let mut created = Vec::with_capacity(lines.len());
        for line in lines {
            let persisted = sqlx::query_as::<_, OrderLine>(
                "INSERT INTO order_lines (id, order_id, product_id, quantity, price, created_at) \
                 VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING *",
            )
            .bind(Uuid::now_v7())
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.price)
            .fetch_one(&mut **tx)
            .await?;
            created.push(persisted);
        }
        Ok(created)
    }

    async fn find_order(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(order)
    }

    async fn find_orders_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: Uuid,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(orders)
    }

    async fn update_status(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(&mut **tx)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_lines_by_order(
        &self,
        tx: &mut Self::Tx,
        order_id: Uuid,
    ) -> Result<Vec<OrderLine>, StoreError> {
        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(lines)
    }
}
