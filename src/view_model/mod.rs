//! Observable product list and the cloud subscription that keeps it fresh.
//!
//! The list shown to readers is always a whole read of the local store, taken
//! after the last mutation or the last absorbed cloud snapshot. Commands write
//! locally first, then to the cloud, then republish. The subscription is
//! processed collapse-to-latest: a snapshot still being absorbed is abandoned
//! as soon as a newer one arrives.

use crate::cloud::{CloudError, CloudSubscription};
use crate::db::{Product, ProductDraft};
use crate::repository::SyncRepository;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use validator::Validate;

mod errors;

pub use errors::ViewModelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncStatus {
    Uninitialized,
    /// Local data is shown, the first cloud snapshot has not been absorbed yet.
    Loading,
    Synced,
    /// The subscription ended with an error. The last list stays visible and
    /// nothing resubscribes until `start` is called again.
    Failed(String),
}

#[derive(Clone)]
pub struct ProductViewModel {
    inner: Arc<Inner>,
}

struct Inner {
    repository: SyncRepository,
    products: watch::Sender<Vec<Product>>,
    status: watch::Sender<SyncStatus>,
    /// Cancel token of the active subscription. Only held for synchronous
    /// sections: the cancelled check before an absorbed snapshot is published,
    /// and the cancel and clear in `stop`.
    subscription: Mutex<Option<CancellationToken>>,
    /// Held while `start` opens a subscription.
    opening: tokio::sync::Mutex<()>,
}

impl ProductViewModel {
    pub fn new(repository: SyncRepository) -> Self {
        let (products, _) = watch::channel(Vec::new());
        let (status, _) = watch::channel(SyncStatus::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                repository,
                products,
                status,
                subscription: Mutex::new(None),
                opening: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn products(&self) -> watch::Receiver<Vec<Product>> {
        self.inner.products.subscribe()
    }

    pub fn current_products(&self) -> Vec<Product> {
        self.inner.products.borrow().clone()
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Publishes the local list, then opens the cloud subscription unless one
    /// is already running.
    pub async fn start(&self) -> Result<(), ViewModelError> {
        let _opening = self.inner.opening.lock().await;
        self.refresh().await?;

        if self.is_subscribed() {
            debug!("cloud subscription already active");
            return Ok(());
        }
        self.set_status(SyncStatus::Loading);
        let subscription = match self.inner.repository.observe_cloud().await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "failed to open cloud subscription");
                self.set_status(SyncStatus::Failed(e.to_string()));
                return Err(ViewModelError::subscription(e));
            }
        };
        let token = subscription.cancel_token();
        *self.slot() = Some(token.clone());
        tokio::spawn(self.clone().run_subscription(subscription, token));
        info!("cloud subscription started");
        Ok(())
    }

    pub async fn add_product(&self, draft: ProductDraft) -> Result<Product, ViewModelError> {
        draft.validate()?;
        let product = draft.into_product();
        let id = self.inner.repository.insert_local(&product).await?;
        let saved = product.with_id(id);
        let pushed = self.inner.repository.upsert_cloud(&saved).await;
        self.refresh().await?;
        if let Err(e) = pushed {
            warn!(id, error = %e, "product added locally only");
            return Err(e.into());
        }
        info!(id, "added product");
        Ok(saved)
    }

    pub async fn update_product(&self, product: Product) -> Result<Product, ViewModelError> {
        if !product.has_id() {
            return Err(ViewModelError::MissingId);
        }
        ProductDraft::from(&product).validate()?;
        let product = product.with_name(product.name.trim());
        self.inner.repository.update_local(&product).await?;
        let pushed = self.inner.repository.upsert_cloud(&product).await;
        self.refresh().await?;
        if let Err(e) = pushed {
            warn!(id = product.id, error = %e, "product updated locally only");
            return Err(e.into());
        }
        info!(id = product.id, "updated product");
        Ok(product)
    }

    pub async fn delete_product(&self, product: &Product) -> Result<(), ViewModelError> {
        if !product.has_id() {
            return Err(ViewModelError::MissingId);
        }
        self.inner.repository.delete_local(product).await?;
        let removed = self.inner.repository.delete_cloud(product.id).await;
        self.refresh().await?;
        if let Err(e) = removed {
            warn!(id = product.id, error = %e, "product deleted locally only");
            return Err(e.into());
        }
        info!(id = product.id, "deleted product");
        Ok(())
    }

    /// Cancels the subscription and clears the list, so a later `start` for
    /// another user shows nothing of this one. A snapshot still being absorbed
    /// is dropped at its next await point and never published.
    pub async fn stop(&self) {
        self.cancel_subscription();
        // A concurrent `start` may be opening a subscription right now.
        let _opening = self.inner.opening.lock().await;
        self.cancel_subscription();
    }

    fn cancel_subscription(&self) {
        let mut slot = self.slot();
        if let Some(token) = slot.take() {
            token.cancel();
            info!("cloud subscription cancelled");
        }
        self.publish(Vec::new());
        self.set_status(SyncStatus::Uninitialized);
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(&self) -> Result<(), ViewModelError> {
        let products = self.inner.repository.local_products().await?;
        self.publish(products);
        Ok(())
    }

    fn publish(&self, products: Vec<Product>) {
        self.inner.products.send_replace(products);
    }

    fn set_status(&self, status: SyncStatus) {
        self.inner.status.send_replace(status);
    }

    async fn run_subscription(self, mut subscription: CloudSubscription, token: CancellationToken) {
        let mut pending = subscription.next().await;
        while let Some(item) = pending.take() {
            let snapshot = match item {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.fail_subscription(&token, e);
                    return;
                }
            };
            pending = tokio::select! {
                biased;
                newer = subscription.next() => {
                    debug!("newer cloud snapshot arrived, dropping the one in flight");
                    newer
                }
                absorbed = self.absorb(&snapshot, &token) => {
                    if let Err(e) = absorbed {
                        error!(error = %e, "failed to absorb cloud snapshot");
                    }
                    subscription.next().await
                }
            };
        }
        debug!("cloud subscription closed");
    }

    /// Cloud to local direction. Rows missing from the snapshot are kept.
    async fn absorb(
        &self,
        snapshot: &[Product],
        token: &CancellationToken,
    ) -> Result<(), ViewModelError> {
        if token.is_cancelled() {
            return Ok(());
        }
        self.inner.repository.upsert_all_local(snapshot).await?;
        let products = self.inner.repository.local_products().await?;
        let _slot = self.slot();
        if token.is_cancelled() {
            debug!("subscription cancelled while absorbing, snapshot discarded");
            return Ok(());
        }
        debug!(
            received = snapshot.len(),
            rows = products.len(),
            "absorbed cloud snapshot"
        );
        self.publish(products);
        self.set_status(SyncStatus::Synced);
        Ok(())
    }

    fn fail_subscription(&self, token: &CancellationToken, e: CloudError) {
        let mut slot = self.slot();
        if token.is_cancelled() {
            return;
        }
        token.cancel();
        *slot = None;
        error!(error = %e, "cloud subscription terminated");
        self.set_status(SyncStatus::Failed(e.to_string()));
    }
}

#[cfg(test)]
mod tests;
