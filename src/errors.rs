use crate::db::StoreError;
use crate::view_model::ViewModelError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("socket address parsing error: {0}")]
    SocketAddressParsingError(#[from] std::net::AddrParseError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    AppErrors(#[from] AppErrors),
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to read configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("unknown local store type `{0}`, use `in_memory` or `relational`")]
    UnknownStoreType(String),
    #[error("{0} is not a supported environment, use either `dev` or `prod`")]
    UnknownEnvironment(String),
    #[error("relational store requires a database url")]
    MissingDatabaseUrl,
}

#[derive(Error, Debug)]
pub enum AppErrors {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    LocalStore(#[from] StoreError),
    #[error(transparent)]
    ViewModel(#[from] ViewModelError),
    #[error("invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("no user is logged in")]
    NotLoggedIn,
    #[error("product {0} not found")]
    ProductNotFound(i64),
}

impl AppErrors {
    fn status_code(&self) -> StatusCode {
        match self {
            AppErrors::NotLoggedIn => StatusCode::UNAUTHORIZED,
            AppErrors::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrors::ProductNotFound(_) => StatusCode::NOT_FOUND,
            AppErrors::LocalStore(StoreError::UnknownProduct) => StatusCode::NOT_FOUND,
            AppErrors::ViewModel(error) => match error {
                ViewModelError::Validation(_) | ViewModelError::MissingId => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ViewModelError::Unauthenticated => StatusCode::UNAUTHORIZED,
                ViewModelError::LocalStore(StoreError::UnknownProduct) => StatusCode::NOT_FOUND,
                ViewModelError::RemoteWrite(_) | ViewModelError::Subscription(_) => {
                    StatusCode::BAD_GATEWAY
                }
                ViewModelError::LocalStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppErrors::Configuration(_) | AppErrors::LocalStore(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppErrors {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
