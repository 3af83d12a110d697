//! Thin catalog operations: enough product management to feed the inventory
//! store. Search, caching and bulk CRUD live outside this service.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{NewProduct, Product, ProductUpdate};
use crate::error::{OrderError, Result};
use crate::store::Storage;

pub struct CatalogService<S: Storage> {
    store: Arc<S>,
}

impl<S: Storage> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let product = self.store.create_product(&mut tx, new).await?;
        self.store.commit(tx).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let product = self
            .store
            .find_product(&mut tx, id)
            .await?
            .ok_or(OrderError::ProductNotFound(id))?;
        self.store.commit(tx).await?;
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, update: ProductUpdate) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let product = self
            .store
            .update_product(&mut tx, id, update)
            .await?
            .ok_or(OrderError::ProductNotFound(id))?;
        self.store.commit(tx).await?;
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_create_get_update_round_trip() {
        let catalog = CatalogService::new(Arc::new(MemoryStorage::new()));

        let created = catalog
            .create_product(NewProduct {
                name: "Widget".into(),
                description: Some("A widget".into()),
                price: Decimal::new(999, 2),
                stock: 5,
            })
            .await
            .unwrap();

        let fetched = catalog.get_product(created.id).await.unwrap();
        assert_eq!(fetched.name, "Widget");
        assert_eq!(fetched.stock, 5);

        let updated = catalog
            .update_product(
                created.id,
                ProductUpdate { stock: Some(8), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, 8);
        assert_eq!(updated.price, Decimal::new(999, 2));
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let catalog = CatalogService::new(Arc::new(MemoryStorage::new()));
        let err = catalog.get_product(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(_)));
    }
}
