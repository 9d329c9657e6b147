use crate::cloud::{CloudCollection, CloudError, CloudSubscription, SnapshotItem};
use crate::db::{Product, ProductId};
use crate::identity::{IdentityProvider, UserId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Collection = BTreeMap<String, Product>;

#[derive(Debug)]
struct Subscriber {
    sender: mpsc::UnboundedSender<SnapshotItem>,
    cancel: CancellationToken,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.sender.is_closed()
    }
}

#[derive(Debug, Default)]
struct CloudState {
    collections: HashMap<UserId, Collection>,
    subscribers: HashMap<UserId, Vec<Subscriber>>,
}

impl CloudState {
    fn snapshot(&self, user: &str) -> Vec<Product> {
        self.collections
            .get(user)
            .map(|collection| collection.values().cloned().collect())
            .unwrap_or_default()
    }

    fn notify(&mut self, user: &str) {
        let snapshot = self.snapshot(user);
        if let Some(subscribers) = self.subscribers.get_mut(user) {
            subscribers.retain(|subscriber| {
                subscriber.is_live() && subscriber.sender.send(Ok(snapshot.clone())).is_ok()
            });
            debug!(%user, listeners = subscribers.len(), "pushed cloud snapshot");
        }
    }
}

/// In-process stand-in for the remote document store. Collections live under
/// `users/{uid}/products/{id}` semantics: one map per user keyed by the
/// stringified product id.
#[derive(Debug)]
pub struct InMemoryCloud {
    identity: Arc<dyn IdentityProvider>,
    state: Mutex<CloudState>,
    fail_writes: AtomicBool,
}

impl InMemoryCloud {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            state: Mutex::new(CloudState::default()),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn current_user(&self) -> Result<UserId, CloudError> {
        self.identity
            .current_user()
            .ok_or(CloudError::Unauthenticated)
    }

    fn check_writable(&self) -> Result<(), CloudError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CloudError::RemoteWrite("remote store unavailable".to_string()));
        }
        Ok(())
    }

    /// Makes every following upsert and delete fail with [`CloudError::RemoteWrite`].
    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Writes a document on behalf of another device of `user`.
    pub async fn put_remote(&self, user: &str, product: Product) {
        let mut state = self.state.lock().await;
        state
            .collections
            .entry(user.to_string())
            .or_default()
            .insert(product.document_key(), product);
        state.notify(user);
    }

    /// Deletes a document on behalf of another device of `user`.
    pub async fn remove_remote(&self, user: &str, id: ProductId) {
        let mut state = self.state.lock().await;
        if let Some(collection) = state.collections.get_mut(user) {
            collection.remove(&id.to_string());
        }
        state.notify(user);
    }

    pub async fn documents(&self, user: &str) -> Vec<Product> {
        self.state.lock().await.snapshot(user)
    }

    pub async fn subscriber_count(&self, user: &str) -> usize {
        let mut state = self.state.lock().await;
        match state.subscribers.get_mut(user) {
            Some(subscribers) => {
                subscribers.retain(Subscriber::is_live);
                subscribers.len()
            }
            None => 0,
        }
    }

    /// Terminates every live subscription of `user` with a stream error,
    /// as when access to the collection is withdrawn.
    pub async fn revoke(&self, user: &str) {
        let mut state = self.state.lock().await;
        if let Some(subscribers) = state.subscribers.remove(user) {
            warn!(%user, count = subscribers.len(), "revoking cloud subscriptions");
            for subscriber in subscribers.into_iter().filter(Subscriber::is_live) {
                let _ = subscriber.sender.send(Err(CloudError::RemoteStream(
                    "permission denied".to_string(),
                )));
            }
        }
    }
}

#[async_trait]
impl CloudCollection for InMemoryCloud {
    async fn upsert(&self, product: &Product) -> Result<(), CloudError> {
        let user = self.current_user()?;
        if !product.has_id() {
            return Err(CloudError::MissingId);
        }
        self.check_writable()?;
        let mut state = self.state.lock().await;
        state
            .collections
            .entry(user.clone())
            .or_default()
            .insert(product.document_key(), product.clone());
        state.notify(&user);
        Ok(())
    }

    async fn delete(&self, id: ProductId) -> Result<(), CloudError> {
        let user = self.current_user()?;
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if let Some(collection) = state.collections.get_mut(&user) {
            collection.remove(&id.to_string());
        }
        state.notify(&user);
        Ok(())
    }

    async fn subscribe(&self) -> Result<CloudSubscription, CloudError> {
        let user = self.current_user()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut state = self.state.lock().await;
        let _ = sender.send(Ok(state.snapshot(&user)));
        let subscribers = state.subscribers.entry(user.clone()).or_default();
        subscribers.retain(Subscriber::is_live);
        subscribers.push(Subscriber {
            sender,
            cancel: cancel.clone(),
        });
        debug!(%user, "opened cloud subscription");
        Ok(CloudSubscription::new(receiver, cancel))
    }
}
