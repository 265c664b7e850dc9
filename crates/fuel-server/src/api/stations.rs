//! Station catalogue endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCount {
    pub region: String,
    pub stations: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSummary {
    pub total_stations: usize,
    pub regions_with_boundaries: usize,
    pub by_region: Vec<RegionCount>,
    pub loaded_at: DateTime<Utc>,
}

/// Station count per region in the loaded snapshot, largest first.
pub async fn station_summary(State(state): State<Arc<AppState>>) -> Json<StationSummary> {
    let snapshot = state.pricing();
    let by_region = snapshot
        .stations()
        .count_by_region()
        .into_iter()
        .map(|(region, stations)| RegionCount { region, stations })
        .collect();

    Json(StationSummary {
        total_stations: snapshot.stations().len(),
        regions_with_boundaries: snapshot.regions().len(),
        by_region,
        loaded_at: snapshot.loaded_at(),
    })
}
