use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Relational(#[from] sea_orm::DbErr),
    #[error(transparent)]
    InMemoryError(#[from] InMemoryError),
    #[error("unknown product")]
    UnknownProduct,
    #[error("product id {0} is out of range")]
    IdOutOfRange(i64),
}

#[derive(Error, Debug)]
pub enum InMemoryError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to read with serde: {0}")]
    SerdeError(#[from] serde_json::error::Error),
    #[error("write task did not complete: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}
