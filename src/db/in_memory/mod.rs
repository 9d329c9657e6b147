use crate::db::errors::{InMemoryError, StoreError};
use crate::db::product::{Product, ProductId};
use crate::db::LocalStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type ProductMap = BTreeMap<ProductId, Product>;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileStructure {
    pub products: Vec<Product>,
}

/// Product table kept in memory. With a backing file every mutation is
/// written through to disk before the call returns.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<ProductMap>>,
    file_path: Option<PathBuf>,
}

impl TryFrom<String> for InMemoryStore {
    type Error = StoreError;

    fn try_from(file_path: String) -> Result<Self, Self::Error> {
        let path = PathBuf::from(file_path);
        let products = if path.is_file() {
            let data = fs::read_to_string(&path).map_err(InMemoryError::IoError)?;
            let db: FileStructure =
                serde_json::from_str(&data).map_err(InMemoryError::SerdeError)?;
            db.products
        } else {
            vec![]
        };
        debug!(path = %path.display(), rows = products.len(), "opened product file");
        Ok(Self {
            products: Arc::new(RwLock::new(index(products))),
            file_path: Some(path),
        })
    }
}

fn index(products: Vec<Product>) -> ProductMap {
    products
        .into_iter()
        .map(|product| (product.id, product))
        .collect()
}

impl InMemoryStore {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(RwLock::new(index(products))),
            file_path: None,
        }
    }

    /// Applies `change` to a copy of the table, writes the copy to the file
    /// and swaps it in. The commit runs on its own task: once started it
    /// completes even if the caller is dropped, so the file never runs ahead
    /// of the map and two file writes never overlap.
    async fn commit<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ProductMap) -> Result<T, StoreError> + Send + 'static,
    {
        let products = self.products.clone();
        let file_path = self.file_path.clone();
        tokio::spawn(async move {
            let mut products = products.write_owned().await;
            let mut staged = products.clone();
            let value = change(&mut staged)?;
            if let Some(path) = file_path {
                persist(&path, &staged).await?;
            }
            *products = staged;
            Ok::<_, StoreError>(value)
        })
        .await
        .map_err(InMemoryError::Interrupted)?
    }
}

/// Writes next to the target and renames over it, so a reader never sees a
/// partially written file.
async fn persist(path: &Path, products: &ProductMap) -> Result<(), InMemoryError> {
    let file = FileStructure {
        products: products.values().cloned().collect(),
    };
    let data = serde_json::to_string_pretty(&file)?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, data).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

fn next_id(products: &ProductMap) -> Result<ProductId, StoreError> {
    let last = products
        .keys()
        .next_back()
        .copied()
        .unwrap_or_default()
        .max(0);
    last.checked_add(1).ok_or(StoreError::IdOutOfRange(last))
}

fn resolve_id(products: &ProductMap, product: &Product) -> Result<ProductId, StoreError> {
    if product.has_id() {
        Ok(product.id)
    } else {
        next_id(products)
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }

    async fn insert(&self, product: &Product) -> Result<ProductId, StoreError> {
        let product = product.clone();
        self.commit(move |products| {
            let id = resolve_id(products, &product)?;
            products.insert(id, product.with_id(id));
            Ok(id)
        })
        .await
    }

    async fn insert_all(&self, new_products: &[Product]) -> Result<(), StoreError> {
        let new_products = new_products.to_vec();
        self.commit(move |products| {
            for product in new_products {
                let id = resolve_id(products, &product)?;
                products.insert(id, product.with_id(id));
            }
            Ok(())
        })
        .await
    }

    async fn update(&self, product: &Product) -> Result<(), StoreError> {
        let product = product.clone();
        self.commit(move |products| match products.get_mut(&product.id) {
            Some(row) => {
                *row = product;
                Ok(())
            }
            None => Err(StoreError::UnknownProduct),
        })
        .await
    }

    async fn delete(&self, product: &Product) -> Result<(), StoreError> {
        if !self.products.read().await.contains_key(&product.id) {
            return Ok(());
        }
        let id = product.id;
        self.commit(move |products| {
            products.remove(&id);
            Ok(())
        })
        .await
    }
}
