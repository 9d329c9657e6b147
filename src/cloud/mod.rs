use crate::db::{Product, ProductId};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod errors;
pub mod in_memory;

pub use errors::CloudError;
pub use in_memory::InMemoryCloud;

/// One subscription item: a full snapshot of the collection, or the terminal error.
pub type SnapshotItem = Result<Vec<Product>, CloudError>;

/// Per-user remote product collection, keyed by the stringified product id.
///
/// Every call resolves the current identity and fails with
/// [`CloudError::Unauthenticated`] when there is none.
#[async_trait]
pub trait CloudCollection: Send + Sync {
    async fn upsert(&self, product: &Product) -> Result<(), CloudError>;

    async fn delete(&self, id: ProductId) -> Result<(), CloudError>;

    /// Opens a live subscription. The first item is the current collection;
    /// every later change emits the whole collection again.
    async fn subscribe(&self) -> Result<CloudSubscription, CloudError>;
}

/// Receiving half of a live subscription.
///
/// After [`CloudSubscription::unsubscribe`] (or drop) no further item is
/// delivered, even one the producer already queued.
#[derive(Debug)]
pub struct CloudSubscription {
    receiver: mpsc::UnboundedReceiver<SnapshotItem>,
    cancel: CancellationToken,
}

impl CloudSubscription {
    /// Producers keep the sender and must stop sending once `cancel` fires.
    pub fn new(receiver: mpsc::UnboundedReceiver<SnapshotItem>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Next snapshot, or `None` once the stream ended or was cancelled.
    pub async fn next(&mut self) -> Option<SnapshotItem> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.receiver.recv() => {
                if self.cancel.is_cancelled() {
                    return None;
                }
                item
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.receiver.close();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for CloudSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
