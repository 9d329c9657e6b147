use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};
use tracing::info;

/// Opaque identifier of the authenticated user.
pub type UserId = String;

pub trait IdentityProvider: Send + Sync + Debug {
    fn current_user(&self) -> Option<UserId>;

    fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Identity of the current session, switched by login and logout.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user: RwLock<Option<UserId>>,
}

impl SessionIdentity {
    pub fn logged_in(user: &str) -> Self {
        Self {
            user: RwLock::new(Some(user.to_string())),
        }
    }

    pub fn login(&self, user: &str) {
        let mut current = self.user.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(user.to_string());
        info!(%user, "logged in");
    }

    pub fn logout(&self) {
        let mut current = self.user.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(user) = current.take() {
            info!(%user, "logged out");
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
