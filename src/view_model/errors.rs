use crate::cloud::CloudError;
use crate::db::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewModelError {
    #[error("invalid product: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("product has no id, it has to be added first")]
    MissingId,
    #[error("local store failure: {0}")]
    LocalStore(#[from] StoreError),
    #[error("change kept locally, cloud write failed: {0}")]
    RemoteWrite(CloudError),
    #[error("no authenticated user for the cloud collection")]
    Unauthenticated,
    #[error("cloud subscription failed: {0}")]
    Subscription(CloudError),
}

impl From<CloudError> for ViewModelError {
    fn from(error: CloudError) -> Self {
        match error {
            CloudError::Unauthenticated => ViewModelError::Unauthenticated,
            error => ViewModelError::RemoteWrite(error),
        }
    }
}

impl ViewModelError {
    pub(crate) fn subscription(error: CloudError) -> Self {
        match error {
            CloudError::Unauthenticated => ViewModelError::Unauthenticated,
            error => ViewModelError::Subscription(error),
        }
    }
}
