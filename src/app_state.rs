use crate::cloud::InMemoryCloud;
use crate::configuration::LocalStoreSettings;
use crate::db::{self, LocalStore};
use crate::errors::AppErrors;
use crate::identity::{IdentityProvider, SessionIdentity, UserId};
use crate::repository::SyncRepository;
use crate::view_model::ProductViewModel;
use std::sync::Arc;

/// Composition root: the gateways are built once here and injected.
#[derive(Clone)]
pub struct AppState {
    pub view_model: ProductViewModel,
    pub identity: Arc<SessionIdentity>,
    pub cloud: Arc<InMemoryCloud>,
}

impl AppState {
    pub fn init(local: Arc<dyn LocalStore>) -> Self {
        let identity = Arc::new(SessionIdentity::default());
        let cloud = Arc::new(InMemoryCloud::new(identity.clone()));
        let repository = SyncRepository::new(local, cloud.clone());
        Self {
            view_model: ProductViewModel::new(repository),
            identity,
            cloud,
        }
    }

    pub async fn try_from(settings: &LocalStoreSettings) -> Result<Self, AppErrors> {
        let local = db::connect(settings).await?;
        Ok(Self::init(local))
    }

    pub fn require_login(&self) -> Result<UserId, AppErrors> {
        self.identity.current_user().ok_or(AppErrors::NotLoggedIn)
    }
}
