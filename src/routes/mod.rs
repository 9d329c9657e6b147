use crate::app_state::AppState;
use crate::db::{Product, ProductDraft, ProductId};
use crate::errors::AppErrors;
use crate::identity::IdentityProvider;
use crate::stats::{self, ChartBar, ChartMetric, StockSummary};
use crate::view_model::SyncStatus;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Result};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct Login {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub query: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    #[serde(default)]
    pub metric: ChartMetric,
}

fn find_product(state: &AppState, id: ProductId) -> Result<Product, AppErrors> {
    state
        .view_model
        .current_products()
        .into_iter()
        .find(|product| product.id == id)
        .ok_or(AppErrors::ProductNotFound(id))
}

pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn login(
    State(state): State<AppState>,
    Json(login): Json<Login>,
) -> Result<Json<SyncStatus>, AppErrors> {
    login.validate()?;
    if state
        .identity
        .current_user()
        .is_some_and(|user| user != login.user_id)
    {
        info!("switching user, dropping previous session");
        state.view_model.stop().await;
    }
    state.identity.login(&login.user_id);
    state.view_model.start().await?;
    Ok(Json(state.view_model.current_status()))
}

pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.view_model.stop().await;
    state.identity.logout();
    StatusCode::NO_CONTENT
}

pub async fn status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.view_model.current_status())
}

pub async fn products(
    State(state): State<AppState>,
    Query(params): Query<ProductQuery>,
) -> Json<Vec<Product>> {
    let products = state.view_model.current_products();
    let query = params.query.unwrap_or_default();
    Json(stats::filter_by_name(&products, &query))
}

pub async fn add_product(
    State(state): State<AppState>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppErrors> {
    state.require_login()?;
    let product = state.view_model.add_product(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, AppErrors> {
    state.require_login()?;
    find_product(&state, id)?;
    let product = state
        .view_model
        .update_product(draft.into_product().with_id(id))
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppErrors> {
    state.require_login()?;
    let product = find_product(&state, id)?;
    state.view_model.delete_product(&product).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stock_summary(State(state): State<AppState>) -> Json<StockSummary> {
    Json(stats::summary(&state.view_model.current_products()))
}

pub async fn chart(
    State(state): State<AppState>,
    Query(params): Query<ChartQuery>,
) -> Json<Vec<ChartBar>> {
    let products = state.view_model.current_products();
    Json(stats::chart_series(&products, params.metric))
}
