use crate::cloud::{CloudCollection, CloudError, CloudSubscription};
use crate::db::{LocalStore, Product, ProductId, StoreError};
use std::sync::Arc;

/// Local store and cloud collection behind one API. Holds nothing but the two
/// gateway handles; every call is a direct delegation.
#[derive(Clone)]
pub struct SyncRepository {
    local: Arc<dyn LocalStore>,
    cloud: Arc<dyn CloudCollection>,
}

impl SyncRepository {
    pub fn new(local: Arc<dyn LocalStore>, cloud: Arc<dyn CloudCollection>) -> Self {
        Self { local, cloud }
    }

    pub async fn local_products(&self) -> Result<Vec<Product>, StoreError> {
        self.local.get_all().await
    }

    pub async fn insert_local(&self, product: &Product) -> Result<ProductId, StoreError> {
        self.local.insert(product).await
    }

    pub async fn update_local(&self, product: &Product) -> Result<(), StoreError> {
        self.local.update(product).await
    }

    pub async fn delete_local(&self, product: &Product) -> Result<(), StoreError> {
        self.local.delete(product).await
    }

    pub async fn upsert_all_local(&self, products: &[Product]) -> Result<(), StoreError> {
        self.local.insert_all(products).await
    }

    pub async fn upsert_cloud(&self, product: &Product) -> Result<(), CloudError> {
        self.cloud.upsert(product).await
    }

    pub async fn delete_cloud(&self, id: ProductId) -> Result<(), CloudError> {
        self.cloud.delete(id).await
    }

    pub async fn observe_cloud(&self) -> Result<CloudSubscription, CloudError> {
        self.cloud.subscribe().await
    }
}
