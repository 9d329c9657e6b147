use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("no authenticated user")]
    Unauthenticated,
    #[error("remote write failed: {0}")]
    RemoteWrite(String),
    #[error("remote subscription failed: {0}")]
    RemoteStream(String),
    #[error("product has no id, it must be stored locally first")]
    MissingId,
}
