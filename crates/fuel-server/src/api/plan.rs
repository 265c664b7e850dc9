//! Route optimisation and planning endpoints.

use axum::{extract::State, http::StatusCode, Json};
use fuel_core::models::round_dp;
use fuel_core::{Decision, FuelPlan, PlanError, PlanOptions, RouteGeometry, StopStation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::api::{api_error, ApiError};
use crate::routing::{is_client_error, RoutingError};
use crate::state::AppState;

const MAX_LOCATION_LEN: usize = 255;
/// Decimal places for the summed fuel quantity in a route summary.
const SUMMARY_UNITS_DP: u32 = 2;

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    /// Place name or "lat,lng"
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub start: String,
    pub end: String,
    pub total_distance_miles: f64,
    pub geometry: RouteGeometry,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelStopView {
    pub order: usize,
    pub station: StopStation,
    pub region: Option<String>,
    pub distance_from_start_miles: f64,
    pub units_bought: Decimal,
    pub cost: Decimal,
    pub price_per_unit: Decimal,
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub total_distance_miles: f64,
    pub total_fuel_units: Decimal,
    pub total_fuel_cost: Decimal,
    pub number_of_stops: usize,
    pub average_price_per_unit: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub route: RouteView,
    pub fuel_stops: Vec<FuelStopView>,
    pub summary: RouteSummary,
    pub plan: FuelPlan,
    pub computation_time_ms: u64,
    pub cache_hit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub geometry: RouteGeometry,
    pub waypoint_interval_miles: Option<f64>,
    pub reserve_miles: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub plan: FuelPlan,
    pub waypoints_sampled: usize,
    pub route_miles: f64,
    pub computation_time_ms: u64,
}

/// Resolve a route between two locations and plan fuel stops along it.
pub async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let started = Instant::now();

    let start = required_location(req.start.as_deref());
    let end = required_location(req.end.as_deref());
    let (Some(start), Some(end)) = (start, end) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Both start and end locations are required",
        ));
    };
    if start.len() > MAX_LOCATION_LEN || end.len() > MAX_LOCATION_LEN {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Locations must be at most {} characters", MAX_LOCATION_LEN),
        ));
    }

    let (route, cache_hit) = state
        .resolve_route(start, end)
        .await
        .map_err(routing_failure)?;

    let run = state
        .plan(&route.geometry, &state.config().plan)
        .map_err(plan_failure)?;
    let plan = run.plan;

    let fuel_stops = plan
        .stops
        .iter()
        .enumerate()
        .map(|(idx, stop)| FuelStopView {
            order: idx + 1,
            station: stop.station.clone(),
            region: stop.region_at_stop.clone(),
            distance_from_start_miles: round_miles(stop.mile_marker),
            units_bought: stop.units_bought,
            cost: stop.cost,
            price_per_unit: stop.price_per_unit,
            decision: stop.decision,
        })
        .collect();

    let summary = RouteSummary {
        total_distance_miles: round_miles(route.total_distance_miles),
        total_fuel_units: round_dp(plan.total_units_bought, SUMMARY_UNITS_DP),
        total_fuel_cost: plan.total_cost,
        number_of_stops: plan.stop_count(),
        average_price_per_unit: plan.average_price_per_unit(),
    };

    tracing::info!(
        stops = summary.number_of_stops,
        cost = %summary.total_fuel_cost,
        cache_hit,
        "route optimized"
    );

    Ok(Json(OptimizeResponse {
        route: RouteView {
            start: start.to_string(),
            end: end.to_string(),
            total_distance_miles: summary.total_distance_miles,
            geometry: route.geometry,
        },
        fuel_stops,
        summary,
        plan,
        computation_time_ms: started.elapsed().as_millis() as u64,
        cache_hit,
    }))
}

/// Plan fuel stops along a caller-supplied geometry.
pub async fn plan_geometry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let started = Instant::now();
    let defaults = &state.config().plan;
    let options = PlanOptions {
        waypoint_interval_miles: req
            .waypoint_interval_miles
            .unwrap_or(defaults.waypoint_interval_miles),
        reserve_miles: req.reserve_miles.unwrap_or(defaults.reserve_miles),
    };

    let problems = options.validate();
    if !problems.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, problems.join("; ")));
    }

    let run = state.plan(&req.geometry, &options).map_err(plan_failure)?;
    let route_miles = run
        .waypoints
        .last()
        .map_or(0.0, |wp| round_miles(wp.cumulative_miles));

    Ok(Json(PlanResponse {
        plan: run.plan,
        waypoints_sampled: run.waypoints.len(),
        route_miles,
        computation_time_ms: started.elapsed().as_millis() as u64,
    }))
}

fn required_location(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn round_miles(miles: f64) -> f64 {
    (miles * 100.0).round() / 100.0
}

fn routing_failure(err: RoutingError) -> ApiError {
    match err {
        RoutingError::MissingApiKey => {
            tracing::error!("Route requested but no routing API key is configured");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Routing provider is not configured",
            )
        }
        err if is_client_error(&err) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        err => {
            tracing::warn!("Routing provider failed: {}", err);
            api_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

fn plan_failure(err: PlanError) -> ApiError {
    tracing::error!("Fuel plan could not be computed: {}", err);
    api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuel_core::ResolverError;

    #[test]
    fn blank_locations_are_missing() {
        assert_eq!(required_location(Some("  Denver ")), Some("Denver"));
        assert_eq!(required_location(Some("   ")), None);
        assert_eq!(required_location(None), None);
    }

    #[test]
    fn failures_map_to_status_codes() {
        assert_eq!(
            routing_failure(RoutingError::Geocode("Atlantis".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            routing_failure(RoutingError::InvalidResponse("boom".into())).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            routing_failure(RoutingError::MissingApiKey).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = PlanError::Dependency(ResolverError::Unavailable("db".into()));
        assert_eq!(plan_failure(err).0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
