pub mod app_state;
pub mod cloud;
pub mod configuration;
pub mod db;
pub mod errors;
pub mod identity;
pub mod repository;
mod routes;
pub mod stats;
pub mod view_model;

use crate::app_state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/health_check", get(routes::health_check))
        .route("/session", post(routes::login).delete(routes::logout))
        .route("/status", get(routes::status))
        .route(
            "/products",
            get(routes::products).post(routes::add_product),
        )
        .route(
            "/products/:id",
            put(routes::update_product).delete(routes::delete_product),
        )
        .route("/stats", get(routes::stock_summary))
        .route("/chart", get(routes::chart))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
