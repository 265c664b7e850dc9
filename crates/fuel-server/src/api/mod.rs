//! HTTP API for the fuel planner.

pub mod plan;
pub mod request_id;
mod routes;
pub mod stations;

use crate::config::Config;
use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};

pub fn routes(config: &Config) -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router(config)
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}
