use crate::configuration::{LocalStoreSettings, StoreType};
use crate::errors::AppErrors;
use async_trait::async_trait;
use std::sync::Arc;

mod errors;
pub mod in_memory;
pub mod product;
pub mod relational;

pub use errors::{InMemoryError, StoreError};
pub use in_memory::InMemoryStore;
pub use product::{Product, ProductDraft, ProductId};
pub use relational::RelationalStore;

/// Durable on-device product table.
///
/// Every call is durable before it returns. Writes are upserts keyed by `id`,
/// except [`LocalStore::update`] which requires the row to exist.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All rows ordered by id.
    async fn get_all(&self) -> Result<Vec<Product>, StoreError>;

    /// Inserts or replaces by id. A product without an id gets a fresh one;
    /// the resolved id is returned.
    async fn insert(&self, product: &Product) -> Result<ProductId, StoreError>;

    /// Batch form of [`LocalStore::insert`]. Rows absent from `products` are kept.
    async fn insert_all(&self, products: &[Product]) -> Result<(), StoreError>;

    async fn update(&self, product: &Product) -> Result<(), StoreError>;

    async fn delete(&self, product: &Product) -> Result<(), StoreError>;
}

pub async fn connect(settings: &LocalStoreSettings) -> Result<Arc<dyn LocalStore>, AppErrors> {
    settings.check_if_valid()?;
    match settings.store_type {
        StoreType::InMemory => {
            let db = match &settings.file_path {
                Some(file_path) => InMemoryStore::try_from(file_path.to_owned())?,
                None => InMemoryStore::default(),
            };
            Ok(Arc::new(db))
        }
        StoreType::Relational => {
            let db = RelationalStore::connect(&settings.url_unchecked()).await?;
            Ok(Arc::new(db))
        }
    }
}
