//! OpenRouteService client: geocoding, driving directions and snapping.

use fuel_core::spatial::MILES_PER_METER;
use fuel_core::RouteGeometry;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(15);
const SNAP_RADIUS_METERS: u32 = 2000;
const UNROUTABLE_POINT: &str = "Could not find routable point";

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("OPEN_ROUTE_API_KEY is missing")]
    MissingApiKey,
    #[error("invalid location: {0}")]
    InvalidLocation(String),
    #[error("Could not geocode location: {0}")]
    Geocode(String),
    #[error("routing provider request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("unexpected routing provider response: {0}")]
    InvalidResponse(String),
}

/// Road-following geometry and length of one route.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRoute {
    pub geometry: RouteGeometry,
    pub total_distance_miles: f64,
}

pub struct RoutingService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Value,
    #[serde(default)]
    properties: Value,
}

impl RoutingService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RoutingError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, RoutingError> {
        self.api_key.as_deref().ok_or(RoutingError::MissingApiKey)
    }

    /// Resolve both ends and fetch the driving route between them.
    pub async fn fetch_route(&self, start: &str, end: &str) -> Result<FetchedRoute, RoutingError> {
        let api_key = self.api_key()?;
        let mut start_coords = self.resolve_to_coords(start).await?;
        let mut end_coords = self.resolve_to_coords(end).await?;

        let mut response = self.directions(api_key, start_coords, end_coords).await?;
        if response.status().is_client_error() || response.status().is_server_error() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            if !message.contains(UNROUTABLE_POINT) {
                return Err(RoutingError::InvalidResponse(format!(
                    "directions returned {}: {}",
                    status, message
                )));
            }

            info!("endpoint not routable, snapping to road network");
            let snapped = self
                .snap_to_network(api_key, &[start_coords, end_coords], SNAP_RADIUS_METERS)
                .await?;
            if let Some(Some(coords)) = snapped.first() {
                start_coords = *coords;
            }
            if let Some(Some(coords)) = snapped.get(1) {
                end_coords = *coords;
            }
            response = self.directions(api_key, start_coords, end_coords).await?;
        }

        let body: Value = response.error_for_status()?.json().await?;
        parse_directions(body)
    }

    /// `[lng, lat]` for a "lat,lng" pair or a geocoded place name.
    pub async fn resolve_to_coords(&self, location: &str) -> Result<[f64; 2], RoutingError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(RoutingError::InvalidLocation("location is empty".to_string()));
        }
        if let Some(coords) = parse_coordinate_pair(location) {
            return Ok(coords);
        }
        self.geocode(location).await
    }

    async fn geocode(&self, text: &str) -> Result<[f64; 2], RoutingError> {
        let api_key = self.api_key()?;
        let url = format!("{}/geocode/search", self.base_url);
        debug!(text, "geocoding location");

        let body: FeatureCollection = self
            .client
            .get(&url)
            .query(&[
                ("api_key", api_key),
                ("text", text),
                ("boundary.country", "US"),
                ("size", "1"),
            ])
            .timeout(GEOCODE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.features
            .first()
            .and_then(|feature| coordinate(&feature.geometry["coordinates"]))
            .ok_or_else(|| RoutingError::Geocode(text.to_string()))
    }

    async fn directions(
        &self,
        api_key: &str,
        start: [f64; 2],
        end: [f64; 2],
    ) -> Result<reqwest::Response, RoutingError> {
        let url = format!("{}/v2/directions/driving-car", self.base_url);
        let start = format!("{},{}", start[0], start[1]);
        let end = format!("{},{}", end[0], end[1]);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key), ("start", start.as_str()), ("end", end.as_str())])
            .send()
            .await?;
        Ok(response)
    }

    async fn snap_to_network(
        &self,
        api_key: &str,
        locations: &[[f64; 2]],
        radius_meters: u32,
    ) -> Result<Vec<Option<[f64; 2]>>, RoutingError> {
        let url = format!("{}/v2/snap/driving-car/json", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", api_key)
            .header("Accept", "application/json")
            .json(&json!({
                "locations": locations,
                "radius": radius_meters,
                "id": "snap_request",
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "snap request failed");
            return Err(RoutingError::InvalidResponse(format!(
                "Snap failed: {} {}",
                status.as_u16(),
                body
            )));
        }

        let body: Value = response.json().await?;
        Ok(parse_snapped(&body))
    }
}

/// Parse `"lat,lng"` into GeoJSON `[lng, lat]` order, if it is a valid pair.
pub fn parse_coordinate_pair(text: &str) -> Option<[f64; 2]> {
    let (lat, lng) = text.split_once(',')?;
    if lng.contains(',') {
        return None;
    }
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
        Some([lng, lat])
    } else {
        None
    }
}

/// SHA-256 hex digest identifying a start/end pair, case and whitespace insensitive.
pub fn route_cache_key(start: &str, end: &str) -> String {
    let start = Value::String(start.trim().to_lowercase());
    let end = Value::String(end.trim().to_lowercase());
    let canonical = format!("{{\"end\": {}, \"start\": {}}}", end, start);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract geometry and distance from a directions GeoJSON response.
pub fn parse_directions(body: Value) -> Result<FetchedRoute, RoutingError> {
    let collection: FeatureCollection = serde_json::from_value(body)
        .map_err(|err| RoutingError::InvalidResponse(err.to_string()))?;
    let feature = collection
        .features
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::InvalidResponse("no route features".to_string()))?;

    let distance_meters = feature.properties["summary"]["distance"]
        .as_f64()
        .or_else(|| feature.properties["segments"][0]["distance"].as_f64())
        .ok_or_else(|| {
            RoutingError::InvalidResponse("Could not extract distance from response".to_string())
        })?;

    let geometry: RouteGeometry = serde_json::from_value(feature.geometry)
        .map_err(|err| RoutingError::InvalidResponse(format!("bad geometry: {}", err)))?;

    Ok(FetchedRoute {
        geometry,
        total_distance_miles: distance_meters * MILES_PER_METER,
    })
}

fn parse_snapped(body: &Value) -> Vec<Option<[f64; 2]>> {
    body["locations"]
        .as_array()
        .map(|items| items.iter().map(|item| coordinate(&item["location"])).collect())
        .unwrap_or_default()
}

fn coordinate(value: &Value) -> Option<[f64; 2]> {
    let lng = value.get(0)?.as_f64()?;
    let lat = value.get(1)?.as_f64()?;
    Some([lng, lat])
}

/// Best-effort error text from a provider error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value["error"]["message"]
            .as_str()
            .or_else(|| value["error"].as_str())
            .or_else(|| value["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

/// Whether a routing failure was caused by the caller's input.
pub fn is_client_error(err: &RoutingError) -> bool {
    match err {
        RoutingError::InvalidLocation(_) | RoutingError::Geocode(_) => true,
        RoutingError::Upstream(inner) => inner.status() == Some(StatusCode::BAD_REQUEST),
        _ => false,
    }
}
