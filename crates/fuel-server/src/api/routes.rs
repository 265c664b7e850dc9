//! Router assembly and service-level endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::api::{api_error, plan, request_id, stations, ApiError};
use crate::config::Config;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    tracing::debug!(
        strategy = config.price_strategy.as_str(),
        "registering API routes"
    );

    let api_routes = Router::new()
        .route("/api/v1/route/optimize", post(plan::optimize_route))
        .route("/api/v1/plan", post(plan::plan_geometry))
        .route("/api/v1/stations/summary", get(stations::station_summary))
        .route("/api/v1/admin/reload", post(admin_reload));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id::ensure_request_id))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub regions: usize,
    pub stations: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Reload region boundaries and station prices from the database.
async fn admin_reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let snapshot = state.reload_pricing().await.map_err(|err| {
        tracing::error!("Failed to reload pricing data: {:#}", err);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to reload pricing data")
    })?;

    Ok(Json(ReloadResponse {
        regions: snapshot.regions().len(),
        stations: snapshot.stations().len(),
        loaded_at: snapshot.loaded_at(),
    }))
}
