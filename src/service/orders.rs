//! Order placement and cancellation engines.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{NewOrderLine, Order, OrderEvent, OrderLineEvent, OrderStatus, Product};
use crate::error::{OrderError, Result};
use crate::publisher::EventPublisher;
use crate::store::Storage;

/// One requested line of a placement: which product, how many.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Projection of a persisted order returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub items: Vec<LineReceipt>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineReceipt {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

pub struct OrderService<S: Storage> {
    store: Arc<S>,
    publisher: Arc<dyn EventPublisher>,
    events_subject: String,
}

impl<S: Storage> OrderService<S> {
    pub fn new(
        store: Arc<S>,
        publisher: Arc<dyn EventPublisher>,
        events_subject: impl Into<String>,
    ) -> Self {
        Self {
            store,
            publisher,
            events_subject: events_subject.into(),
        }
    }

    /// Place an order for `user_id`.
    ///
    /// Validation, pricing, order and line persistence and stock reservation
    /// all run inside one transaction; any failure rolls the whole unit
    /// back. The `ORDER_CREATED` event is published only after commit, and a
    /// failed publish never fails the placement.
    pub async fn place_order(&self, user_id: Uuid, items: &[LineRequest]) -> Result<OrderReceipt> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut tx = self.store.begin().await?;

        // First pass, in request order: validate each line against live
        // stock and capture the unit price it will be sold at.
        let mut priced: Vec<(Product, i32, Decimal)> = Vec::with_capacity(items.len());
        let mut total_amount = Decimal::ZERO;
        for item in items {
            if item.quantity <= 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
            let product = self
                .store
                .find_product(&mut tx, item.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(item.product_id))?;
            if !product.has_stock(item.quantity) {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    available: product.stock,
                    requested: item.quantity,
                });
            }
            let subtotal = product.price * Decimal::from(item.quantity);
            total_amount += subtotal;
            priced.push((product, item.quantity, subtotal));
        }

        let order = self.store.create_order(&mut tx, user_id, total_amount).await?;

        // Second pass, same order: reserve stock. The decrement re-checks
        // availability, so a concurrent placement that drained stock since
        // the first pass fails the whole transaction instead of overselling.
        let mut new_lines = Vec::with_capacity(priced.len());
        for (product, quantity, _) in &priced {
            if !self.store.decrease_stock(&mut tx, product.id, *quantity).await? {
                let available = self
                    .store
                    .find_product(&mut tx, product.id)
                    .await?
                    .map(|p| p.stock)
                    .unwrap_or(0);
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    available,
                    requested: *quantity,
                });
            }
            new_lines.push(NewOrderLine {
                product_id: product.id,
                quantity: *quantity,
                price: product.price,
            });
        }
        self.store.create_order_lines(&mut tx, order.id, &new_lines).await?;

        self.store.commit(tx).await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total_amount,
            "order placed"
        );

        let receipt = OrderReceipt {
            id: order.id,
            status: order.status,
            total_amount: order.total_amount,
            items: priced
                .iter()
                .map(|(product, quantity, subtotal)| LineReceipt {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: *quantity,
                    price: product.price,
                    subtotal: *subtotal,
                })
                .collect(),
            created_at: order.created_at,
        };

        let event_items = priced
            .into_iter()
            .map(|(product, quantity, _)| OrderLineEvent {
                product_id: product.id,
                product_name: product.name,
                quantity,
                price: product.price,
            })
            .collect();
        self.publish_event(OrderEvent::order_created(&order, event_items)).await;

        Ok(receipt)
    }

    /// Cancel a pending order owned by `user_id`, restocking every line.
    ///
    /// Restock and the status flip share one transaction; a failure in
    /// either leaves both untouched.
    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let order = self
            .store
            .find_order(&mut tx, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(OrderError::Forbidden);
        }
        if !order.can_cancel() {
            return Err(OrderError::InvalidState);
        }

        let lines = self.store.find_lines_by_order(&mut tx, order_id).await?;
        for line in &lines {
            if !self.store.increase_stock(&mut tx, line.product_id, line.quantity).await? {
                return Err(OrderError::ProductNotFound(line.product_id));
            }
        }
        if !self.store.update_status(&mut tx, order_id, OrderStatus::Cancelled).await? {
            return Err(OrderError::OrderNotFound(order_id));
        }
        self.store.commit(tx).await?;
        tracing::info!(order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// All orders belonging to `user_id`, newest first, with product names
    /// resolved at read time.
    pub async fn user_orders(&self, user_id: Uuid) -> Result<Vec<OrderReceipt>> {
        let mut tx = self.store.begin().await?;
        let orders = self.store.find_orders_by_user(&mut tx, user_id).await?;
        let mut receipts = Vec::with_capacity(orders.len());
        for order in orders {
            let receipt = self.load_receipt(&mut tx, order).await?;
            receipts.push(receipt);
        }
        self.store.commit(tx).await?;
        Ok(receipts)
    }

    /// A single order, restricted to its owner.
    pub async fn get_order(&self, order_id: Uuid, user_id: Uuid) -> Result<OrderReceipt> {
        let mut tx = self.store.begin().await?;
        let order = self
            .store
            .find_order(&mut tx, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(OrderError::Forbidden);
        }
        let receipt = self.load_receipt(&mut tx, order).await?;
        self.store.commit(tx).await?;
        Ok(receipt)
    }

    async fn load_receipt(&self, tx: &mut S::Tx, order: Order) -> Result<OrderReceipt> {
        let lines = self.store.find_lines_by_order(tx, order.id).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .store
                .find_product(tx, line.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(line.product_id))?;
            items.push(LineReceipt {
                product_id: line.product_id,
                product_name: product.name,
                quantity: line.quantity,
                price: line.price,
                subtotal: line.subtotal(),
            });
        }
        Ok(OrderReceipt {
            id: order.id,
            status: order.status,
            total_amount: order.total_amount,
            items,
            created_at: order.created_at,
        })
    }

    async fn publish_event(&self, event: OrderEvent) {
        // The order is already committed; delivery is best-effort.
        if let Err(err) = self.publisher.publish(&self.events_subject, &event).await {
            tracing::warn!(
                order_id = %event.order_id,
                error = %err,
                "failed to publish order event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewProduct, ProductUpdate, ORDER_CREATED};
    use crate::publisher::PublishError;
    use crate::store::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<OrderEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, _subject: &str, event: &OrderEvent) -> std::result::Result<(), PublishError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _subject: &str, _event: &OrderEvent) -> std::result::Result<(), PublishError> {
            Err(PublishError::Transport("connection refused".into()))
        }
    }

    fn service() -> (
        OrderService<MemoryStorage>,
        Arc<MemoryStorage>,
        Arc<RecordingPublisher>,
    ) {
        let store = Arc::new(MemoryStorage::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let svc = OrderService::new(store.clone(), publisher.clone(), "order-events");
        (svc, store, publisher)
    }

    async fn seed_product(store: &MemoryStorage, name: &str, price: Decimal, stock: i32) -> Product {
        let mut tx = store.begin().await.unwrap();
        let product = store
            .create_product(
                &mut tx,
                NewProduct {
                    name: name.into(),
                    description: None,
                    price,
                    stock,
                },
            )
            .await
            .unwrap();
        store.commit(tx).await.unwrap();
        product
    }

    async fn stock_of(store: &MemoryStorage, id: Uuid) -> i32 {
        let mut tx = store.begin().await.unwrap();
        let stock = store.find_product(&mut tx, id).await.unwrap().unwrap().stock;
        store.commit(tx).await.unwrap();
        stock
    }

    #[tokio::test]
    async fn test_placement_computes_total_and_reserves_stock() {
        let (svc, store, publisher) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let user = Uuid::now_v7();

        let receipt = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 3 }])
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderStatus::Pending);
        assert_eq!(receipt.total_amount, Decimal::new(2997, 2));
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].product_name, "Widget");
        assert_eq!(receipt.items[0].price, Decimal::new(999, 2));
        assert_eq!(receipt.items[0].subtotal, Decimal::new(2997, 2));
        assert_eq!(stock_of(&store, product.id).await, 7);

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, ORDER_CREATED);
        assert_eq!(events[0].order_id, receipt.id);
        assert_eq!(events[0].user_id, user);
        assert_eq!(events[0].total_amount, Decimal::new(2997, 2));
        assert_eq!(events[0].items[0].product_name, "Widget");
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_and_keeps_state() {
        let (svc, store, publisher) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 2).await;
        let user = Uuid::now_v7();

        let err = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 5 }])
            .await
            .unwrap_err();

        match err {
            OrderError::InsufficientStock { product_id, available, requested } => {
                assert_eq!(product_id, product.id);
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stock_of(&store, product.id).await, 2);
        assert!(svc.user_orders(user).await.unwrap().is_empty());
        assert!(publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let (svc, _, _) = service();
        let missing = Uuid::now_v7();
        let err = svc
            .place_order(Uuid::now_v7(), &[LineRequest { product_id: missing, quantity: 1 }])
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_whole_order() {
        let (svc, store, publisher) = service();
        let plenty = seed_product(&store, "Plenty", Decimal::new(500, 2), 10).await;
        let scarce = seed_product(&store, "Scarce", Decimal::new(300, 2), 1).await;
        let user = Uuid::now_v7();

        let err = svc
            .place_order(
                user,
                &[
                    LineRequest { product_id: plenty.id, quantity: 2 },
                    LineRequest { product_id: scarce.id, quantity: 4 },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InsufficientStock { .. }));
        assert_eq!(stock_of(&store, plenty.id).await, 10);
        assert_eq!(stock_of(&store, scarce.id).await, 1);
        assert!(svc.user_orders(user).await.unwrap().is_empty());
        assert!(publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let (svc, _, _) = service();
        let err = svc.place_order(Uuid::now_v7(), &[]).await.unwrap_err();
        assert!(matches!(err, OrderError::EmptyOrder));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let err = svc
            .place_order(Uuid::now_v7(), &[LineRequest { product_id: product.id, quantity: 0 }])
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity { quantity: 0, .. }));
        assert_eq!(stock_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_price_change() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let user = Uuid::now_v7();
        let receipt = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 3 }])
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        store
            .update_product(
                &mut tx,
                product.id,
                ProductUpdate { price: Some(Decimal::new(1999, 2)), ..Default::default() },
            )
            .await
            .unwrap();
        store.commit(tx).await.unwrap();

        let orders = svc.user_orders(user).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, receipt.id);
        assert_eq!(orders[0].items[0].price, Decimal::new(999, 2));
        assert_eq!(orders[0].items[0].subtotal, Decimal::new(2997, 2));
        assert_eq!(orders[0].total_amount, Decimal::new(2997, 2));
    }

    #[tokio::test]
    async fn test_cancel_restocks_and_flips_status() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let user = Uuid::now_v7();
        let receipt = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 1 }])
            .await
            .unwrap();
        assert_eq!(stock_of(&store, product.id).await, 9);

        svc.cancel_order(receipt.id, user).await.unwrap();
        assert_eq!(stock_of(&store, product.id).await, 10);
        let orders = svc.user_orders(user).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Cancelled);

        let err = svc.cancel_order(receipt.id, user).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidState));
        assert_eq!(stock_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn test_cancel_requires_ownership() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let owner = Uuid::now_v7();
        let stranger = Uuid::now_v7();
        let receipt = svc
            .place_order(owner, &[LineRequest { product_id: product.id, quantity: 1 }])
            .await
            .unwrap();

        let err = svc.cancel_order(receipt.id, stranger).await.unwrap_err();
        assert!(matches!(err, OrderError::Forbidden));
        assert_eq!(stock_of(&store, product.id).await, 9);
        let orders = svc.user_orders(owner).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_rejected_after_external_transition() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let user = Uuid::now_v7();
        let receipt = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 1 }])
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        store.update_status(&mut tx, receipt.id, OrderStatus::Confirmed).await.unwrap();
        store.commit(tx).await.unwrap();

        let err = svc.cancel_order(receipt.id, user).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidState));
        assert_eq!(stock_of(&store, product.id).await, 9);
    }

    #[tokio::test]
    async fn test_cancel_missing_order() {
        let (svc, _, _) = service();
        let missing = Uuid::now_v7();
        let err = svc.cancel_order(missing, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_concurrent_placements_never_oversell() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(100, 0), 10).await;
        let product_id = product.id;
        let svc = Arc::new(svc);
        let user = Uuid::now_v7();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.place_order(user, &[LineRequest { product_id, quantity: 6 }]).await
            }));
        }

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(OrderError::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(insufficient, 1);
        assert_eq!(stock_of(&store, product_id).await, 4);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_placement() {
        let store = Arc::new(MemoryStorage::new());
        let svc = OrderService::new(store.clone(), Arc::new(FailingPublisher), "order-events");
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let user = Uuid::now_v7();

        let receipt = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 2 }])
            .await
            .unwrap();

        let orders = svc.user_orders(user).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, receipt.id);
        assert_eq!(stock_of(&store, product.id).await, 8);
    }

    #[tokio::test]
    async fn test_user_orders_newest_first() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let user = Uuid::now_v7();

        let first = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 1 }])
            .await
            .unwrap();
        let second = svc
            .place_order(user, &[LineRequest { product_id: product.id, quantity: 2 }])
            .await
            .unwrap();

        let orders = svc.user_orders(user).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
    }

    #[tokio::test]
    async fn test_get_order_enforces_ownership() {
        let (svc, store, _) = service();
        let product = seed_product(&store, "Widget", Decimal::new(999, 2), 10).await;
        let owner = Uuid::now_v7();
        let receipt = svc
            .place_order(owner, &[LineRequest { product_id: product.id, quantity: 1 }])
            .await
            .unwrap();

        let fetched = svc.get_order(receipt.id, owner).await.unwrap();
        assert_eq!(fetched.id, receipt.id);

        let err = svc.get_order(receipt.id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, OrderError::Forbidden));
    }
}
