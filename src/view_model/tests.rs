use std::io::{Error as IoError, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use super::*;
use crate::cloud::InMemoryCloud;
use crate::db::{InMemoryError, InMemoryStore, LocalStore, ProductId, StoreError};
use crate::identity::SessionIdentity;

const USER: &str = "alice";

/// Wraps the in-memory store, counts batch upserts and can hold the first one
/// until released.
#[derive(Default)]
struct ProbeStore {
    inner: InMemoryStore,
    hold_first_batch: bool,
    batches: AtomicUsize,
    entered: Notify,
    release: Notify,
}

impl ProbeStore {
    fn holding_first_batch() -> Self {
        Self {
            hold_first_batch: true,
            ..Default::default()
        }
    }

    fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalStore for ProbeStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        self.inner.get_all().await
    }

    async fn insert(&self, product: &Product) -> Result<ProductId, StoreError> {
        self.inner.insert(product).await
    }

    async fn insert_all(&self, products: &[Product]) -> Result<(), StoreError> {
        let call = self.batches.fetch_add(1, Ordering::SeqCst);
        if call == 0 && self.hold_first_batch {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.insert_all(products).await
    }

    async fn update(&self, product: &Product) -> Result<(), StoreError> {
        self.inner.update(product).await
    }

    async fn delete(&self, product: &Product) -> Result<(), StoreError> {
        self.inner.delete(product).await
    }
}

/// Reads work, every write fails like a full disk.
#[derive(Default)]
struct BrokenDiskStore {
    inner: InMemoryStore,
}

fn disk_full() -> StoreError {
    StoreError::InMemoryError(InMemoryError::IoError(IoError::new(
        ErrorKind::Other,
        "disk full",
    )))
}

#[async_trait]
impl LocalStore for BrokenDiskStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        self.inner.get_all().await
    }

    async fn insert(&self, _product: &Product) -> Result<ProductId, StoreError> {
        Err(disk_full())
    }

    async fn insert_all(&self, _products: &[Product]) -> Result<(), StoreError> {
        Err(disk_full())
    }

    async fn update(&self, _product: &Product) -> Result<(), StoreError> {
        Err(disk_full())
    }

    async fn delete(&self, _product: &Product) -> Result<(), StoreError> {
        Err(disk_full())
    }
}

struct Fixture<S> {
    view_model: ProductViewModel,
    local: Arc<S>,
    cloud: Arc<InMemoryCloud>,
    identity: Arc<SessionIdentity>,
}

fn fixture_with<S: LocalStore + 'static>(local: S) -> Fixture<S> {
    let local = Arc::new(local);
    let identity = Arc::new(SessionIdentity::logged_in(USER));
    let cloud = Arc::new(InMemoryCloud::new(identity.clone()));
    let repository = SyncRepository::new(local.clone(), cloud.clone());
    Fixture {
        view_model: ProductViewModel::new(repository),
        local,
        cloud,
        identity,
    }
}

fn fixture() -> Fixture<InMemoryStore> {
    fixture_with(InMemoryStore::default())
}

fn price(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

fn pen() -> Product {
    Product::new(7, "Pen", 3, price(15, 1))
}

async fn wait_until<F>(name: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(Duration::from_secs(2), async move {
        loop {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"));
}

#[tokio::test]
async fn add_product_publishes_fresh_id() {
    let fx = fixture();
    let draft = ProductDraft::new("Pen", 3, price(15, 1));
    let saved = fx
        .view_model
        .add_product(draft.clone())
        .await
        .expect("Failed to add product");

    assert_ne!(saved.id, 0);
    assert_eq!(saved, draft.into_product().with_id(saved.id));
    assert_eq!(fx.view_model.current_products(), vec![saved.clone()]);
    assert_eq!(fx.cloud.documents(USER).await, vec![saved]);
}

#[tokio::test]
async fn add_product_with_zero_quantity_works() {
    let fx = fixture();
    let saved = fx
        .view_model
        .add_product(ProductDraft::new("Empty box", 0, price(2, 0)))
        .await
        .expect("Failed to add product");
    assert_eq!(saved.quantity, 0);
    assert_eq!(fx.view_model.current_products().len(), 1);
}

#[tokio::test]
async fn add_product_with_zero_price_fails_before_any_write() {
    let fx = fixture();
    let result = fx
        .view_model
        .add_product(ProductDraft::new("Pen", 3, Decimal::ZERO))
        .await;

    assert!(matches!(result, Err(ViewModelError::Validation(_))));
    assert!(fx.local.get_all().await.unwrap().is_empty());
    assert!(fx.cloud.documents(USER).await.is_empty());
}

#[tokio::test]
async fn update_keeps_id_and_renames() {
    let fx = fixture();
    let saved = fx
        .view_model
        .add_product(ProductDraft::new("Pen", 3, price(15, 1)))
        .await
        .expect("Failed to add product");

    let updated = fx
        .view_model
        .update_product(saved.with_name("X"))
        .await
        .expect("Failed to update product");

    assert_eq!(updated.id, saved.id);
    let products = fx.view_model.current_products();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, saved.id);
    assert_eq!(products[0].name, "X");
    assert_eq!(fx.cloud.documents(USER).await, products);
}

#[tokio::test]
async fn update_without_id_fails() {
    let fx = fixture();
    let result = fx.view_model.update_product(pen().with_id(0)).await;
    assert!(matches!(result, Err(ViewModelError::MissingId)));
}

#[tokio::test]
async fn update_unknown_product_fails_without_cloud_write() {
    let fx = fixture();
    let result = fx.view_model.update_product(pen()).await;
    assert!(matches!(
        result,
        Err(ViewModelError::LocalStore(StoreError::UnknownProduct))
    ));
    assert!(fx.cloud.documents(USER).await.is_empty());
}

#[tokio::test]
async fn delete_removes_from_list_and_store() {
    let fx = fixture();
    let saved = fx
        .view_model
        .add_product(ProductDraft::new("Pen", 3, price(15, 1)))
        .await
        .expect("Failed to add product");

    fx.view_model
        .delete_product(&saved)
        .await
        .expect("Failed to delete product");

    assert!(fx
        .view_model
        .current_products()
        .iter()
        .all(|product| product.id != saved.id));
    assert!(fx.local.get_all().await.unwrap().is_empty());
    assert!(fx.cloud.documents(USER).await.is_empty());
}

#[tokio::test]
async fn delete_with_failing_cloud_still_removes_locally() {
    let fx = fixture_with(InMemoryStore::with_products(vec![pen()]));
    fx.cloud.put_remote(USER, pen()).await;
    fx.cloud.set_write_failure(true);

    let result = fx.view_model.delete_product(&pen()).await;

    assert!(matches!(
        result,
        Err(ViewModelError::RemoteWrite(CloudError::RemoteWrite(_)))
    ));
    assert!(fx.view_model.current_products().is_empty());
    assert!(fx.local.get_all().await.unwrap().is_empty());
    assert_eq!(fx.cloud.documents(USER).await, vec![pen()]);
}

#[tokio::test]
async fn add_with_failing_cloud_keeps_local_row() {
    let fx = fixture();
    fx.cloud.set_write_failure(true);
    let result = fx
        .view_model
        .add_product(ProductDraft::new("Pen", 3, price(15, 1)))
        .await;

    assert!(matches!(result, Err(ViewModelError::RemoteWrite(_))));
    let products = fx.view_model.current_products();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Pen");
    assert!(fx.cloud.documents(USER).await.is_empty());
}

#[tokio::test]
async fn local_failure_publishes_nothing() {
    let fx = fixture_with(BrokenDiskStore::default());
    let receiver = fx.view_model.products();
    let result = fx
        .view_model
        .add_product(ProductDraft::new("Pen", 3, price(15, 1)))
        .await;

    assert!(matches!(result, Err(ViewModelError::LocalStore(_))));
    assert!(fx.view_model.current_products().is_empty());
    assert!(!receiver.has_changed().unwrap());
    assert!(fx.cloud.documents(USER).await.is_empty());
}

#[tokio::test]
async fn start_shows_local_then_cloud_snapshot() {
    let fx = fixture();
    fx.cloud.put_remote(USER, pen()).await;

    fx.view_model.start().await.expect("Failed to start");
    assert!(fx.view_model.current_products().is_empty());
    assert_ne!(fx.view_model.current_status(), SyncStatus::Uninitialized);

    let view_model = fx.view_model.clone();
    wait_until("cloud snapshot", move || {
        view_model.current_products() == vec![pen()]
    })
    .await;
    assert_eq!(fx.view_model.current_status(), SyncStatus::Synced);
    assert_eq!(fx.local.get_all().await.unwrap(), vec![pen()]);
}

#[tokio::test]
async fn start_twice_keeps_one_subscription() {
    let fx = fixture_with(ProbeStore::default());
    fx.view_model.start().await.expect("Failed to start");
    fx.view_model.start().await.expect("Failed to start again");
    assert_eq!(fx.cloud.subscriber_count(USER).await, 1);

    let local = fx.local.clone();
    wait_until("first snapshot", move || local.batches() == 1).await;

    fx.cloud.put_remote(USER, pen()).await;
    let view_model = fx.view_model.clone();
    wait_until("pen absorbed", move || {
        view_model.current_products() == vec![pen()]
    })
    .await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.local.batches(), 2);
}

#[tokio::test]
async fn newer_snapshot_supersedes_one_in_flight() {
    let fx = fixture_with(ProbeStore::holding_first_batch());
    let old = Product::new(1, "Old", 1, price(1, 0));
    let new = Product::new(1, "New", 2, price(2, 0));
    fx.cloud.put_remote(USER, old.clone()).await;

    fx.view_model.start().await.expect("Failed to start");
    timeout(Duration::from_secs(2), fx.local.entered.notified())
        .await
        .expect("first snapshot never reached the store");

    fx.cloud.put_remote(USER, new.clone()).await;
    let view_model = fx.view_model.clone();
    let expected = vec![new.clone()];
    wait_until("latest snapshot", move || {
        view_model.current_products() == expected
    })
    .await;

    fx.local.release.notify_one();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.view_model.current_products(), vec![new.clone()]);
    assert_eq!(fx.local.get_all().await.unwrap(), vec![new]);
    assert_eq!(fx.local.batches(), 2);
}

#[tokio::test]
async fn snapshot_absorption_never_deletes_local_rows() {
    let local_only = Product::new(3, "Notebook", 1, price(4, 0));
    let fx = fixture_with(InMemoryStore::with_products(vec![local_only.clone()]));
    fx.cloud.put_remote(USER, pen()).await;

    fx.view_model.start().await.expect("Failed to start");
    let view_model = fx.view_model.clone();
    wait_until("pen absorbed", move || view_model.current_products().len() == 2).await;

    fx.cloud.remove_remote(USER, pen().id).await;
    fx.cloud
        .put_remote(USER, Product::new(9, "Ruler", 1, price(1, 0)))
        .await;
    let view_model = fx.view_model.clone();
    wait_until("ruler absorbed", move || view_model.current_products().len() == 3).await;

    let ids: Vec<ProductId> = fx
        .view_model
        .current_products()
        .iter()
        .map(|product| product.id)
        .collect();
    assert_eq!(ids, vec![3, 7, 9]);
}

#[tokio::test]
async fn stop_clears_list_and_ignores_later_snapshots() {
    let fx = fixture();
    fx.cloud.put_remote(USER, pen()).await;
    fx.view_model.start().await.expect("Failed to start");
    let view_model = fx.view_model.clone();
    wait_until("pen absorbed", move || !view_model.current_products().is_empty()).await;

    fx.view_model.stop().await;
    assert!(fx.view_model.current_products().is_empty());
    assert_eq!(fx.view_model.current_status(), SyncStatus::Uninitialized);
    assert!(!fx.view_model.is_subscribed());

    fx.cloud
        .put_remote(USER, Product::new(9, "Ruler", 1, price(1, 0)))
        .await;
    sleep(Duration::from_millis(50)).await;
    assert!(fx.view_model.current_products().is_empty());
    assert_eq!(fx.local.get_all().await.unwrap(), vec![pen()]);
    assert_eq!(fx.cloud.subscriber_count(USER).await, 0);
}

#[tokio::test]
async fn stop_during_absorption_discards_snapshot() {
    let fx = fixture_with(ProbeStore::holding_first_batch());
    fx.cloud.put_remote(USER, pen()).await;
    fx.view_model.start().await.expect("Failed to start");
    timeout(Duration::from_secs(2), fx.local.entered.notified())
        .await
        .expect("first snapshot never reached the store");

    timeout(Duration::from_secs(1), fx.view_model.stop())
        .await
        .expect("stop waited for the absorption");
    fx.local.release.notify_one();
    sleep(Duration::from_millis(50)).await;

    assert!(fx.view_model.current_products().is_empty());
    assert_eq!(fx.view_model.current_status(), SyncStatus::Uninitialized);
    assert!(fx.local.get_all().await.unwrap().is_empty());
    assert!(!fx.view_model.is_subscribed());
    assert_eq!(fx.local.batches(), 1);
}

#[tokio::test]
async fn restart_for_another_user_shows_local_rows_only() {
    let fx = fixture();
    fx.view_model.start().await.expect("Failed to start");
    fx.view_model.stop().await;

    fx.identity.login("bob");
    fx.cloud.put_remote("bob", pen()).await;
    fx.view_model.start().await.expect("Failed to start");
    let view_model = fx.view_model.clone();
    wait_until("bob snapshot", move || {
        view_model.current_products() == vec![pen()]
    })
    .await;
    assert_eq!(fx.cloud.subscriber_count(USER).await, 0);
    assert_eq!(fx.cloud.subscriber_count("bob").await, 1);
}

#[tokio::test]
async fn stream_failure_keeps_last_list() {
    let fx = fixture();
    fx.cloud.put_remote(USER, pen()).await;
    fx.view_model.start().await.expect("Failed to start");
    let view_model = fx.view_model.clone();
    wait_until("synced", move || {
        view_model.current_status() == SyncStatus::Synced
    })
    .await;

    fx.cloud.revoke(USER).await;
    let view_model = fx.view_model.clone();
    wait_until("failed", move || {
        matches!(view_model.current_status(), SyncStatus::Failed(_))
    })
    .await;
    assert_eq!(fx.view_model.current_products(), vec![pen()]);
    assert!(!fx.view_model.is_subscribed());

    fx.view_model.start().await.expect("Failed to restart");
    assert_eq!(fx.cloud.subscriber_count(USER).await, 1);
    let view_model = fx.view_model.clone();
    wait_until("synced again", move || {
        view_model.current_status() == SyncStatus::Synced
    })
    .await;
}

#[tokio::test]
async fn start_without_user_fails_after_local_read() {
    let fx = fixture_with(InMemoryStore::with_products(vec![pen()]));
    fx.identity.logout();

    let result = fx.view_model.start().await;

    assert!(matches!(result, Err(ViewModelError::Unauthenticated)));
    assert_eq!(fx.view_model.current_products(), vec![pen()]);
    assert!(matches!(
        fx.view_model.current_status(),
        SyncStatus::Failed(_)
    ));
    assert!(!fx.view_model.is_subscribed());
}

#[test]
fn sync_status_serializes_with_tag() {
    let failed = serde_json::to_string(&SyncStatus::Failed("revoked".to_string())).unwrap();
    assert_eq!(failed, r#"{"state":"failed","reason":"revoked"}"#);
    let synced = serde_json::to_string(&SyncStatus::Synced).unwrap();
    assert_eq!(synced, r#"{"state":"synced"}"#);
}
