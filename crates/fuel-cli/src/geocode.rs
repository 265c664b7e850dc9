//! Station geocoding against the US Census batch geocoder, with a
//! Nominatim free-text fallback.

use anyhow::{anyhow, Context, Result};
use fuel_server::persistence::geocoding::GeocodeTarget;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

pub const CENSUS_BATCH_URL: &str =
    "https://geocoding.geo.census.gov/geocoder/locations/addressbatch";
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Largest batch the Census service accepts.
pub const CENSUS_MAX_BATCH: usize = 10_000;

const CENSUS_TIMEOUT: Duration = Duration::from_secs(60);
const NOMINATIM_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "fuel-planner-geocoder";

/// Census request body: `id, street, city, state, zip` per line, no header.
pub fn census_batch_csv(targets: &[GeocodeTarget]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for target in targets {
        writer.write_record([
            target.id.to_string().as_str(),
            target.address.as_str(),
            target.city.as_str(),
            target.region.as_str(),
            "",
        ])?;
    }
    let bytes = writer.into_inner().map_err(|err| anyhow!(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Matched `(lat, lng)` per station id from a Census batch response.
///
/// Matched rows look like
/// `"id","input","Match","Exact","matched address","lng,lat","tigerline","side"`;
/// `No_Match` and `Tie` rows are left out.
pub fn parse_census_batch(body: &str) -> HashMap<i64, (f64, f64)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut located = HashMap::new();
    for record in reader.records().flatten() {
        if record.get(2) != Some("Match") {
            continue;
        }
        let Some(id) = record.get(0).and_then(|v| v.parse::<i64>().ok()) else {
            continue;
        };
        if let Some(point) = record.get(5).and_then(parse_lng_lat) {
            located.insert(id, point);
        }
    }
    located
}

fn parse_lng_lat(field: &str) -> Option<(f64, f64)> {
    let (lng, lat) = field.split_once(',')?;
    let lng = lng.trim().parse::<f64>().ok()?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let in_range = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng);
    in_range.then_some((lat, lng))
}

fn highway_markers() -> &'static [Regex] {
    static MARKERS: OnceLock<Vec<Regex>> = OnceLock::new();
    MARKERS.get_or_init(|| {
        [
            r"(?i)\bI-\d+\b",
            r"(?i)\bUS-\d+\b",
            r"(?i)\bSR-\d+\b",
            r"(?i)\bCR-\d+\b",
            r"(?i)\bEXIT\s+\d+[A-Z]?\b",
            r"(?i)\bMM\s+\d+\b",
            r"[,&\s]+",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Strip interstate, highway, exit and mile-marker tokens from a truck stop
/// address. Returns an empty string when nothing street-like remains.
pub fn clean_address(address: &str) -> String {
    let mut cleaned = address.to_string();
    for marker in highway_markers() {
        cleaned = marker.replace_all(&cleaned, " ").into_owned();
    }
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.len() < 3 {
        return String::new();
    }
    cleaned
}

/// Free-text queries to try in order, each tagged with its strategy name.
pub fn fallback_queries(target: &GeocodeTarget) -> Vec<(String, &'static str)> {
    let mut queries = Vec::new();
    let cleaned = clean_address(&target.address);
    if !cleaned.is_empty() && cleaned != target.address {
        queries.push((
            format!("{}, {}, {}, USA", cleaned, target.city, target.region),
            "cleaned_address",
        ));
    }
    queries.push((
        format!("{}, {}, USA", target.city, target.region),
        "city_state",
    ));
    queries
}

/// First hit of a Nominatim `/search?format=json` response as `(lat, lng)`.
pub fn parse_nominatim(body: &Value) -> Option<(f64, f64)> {
    let hit = body.as_array()?.first()?;
    let lat = coordinate_text(&hit["lat"])?;
    let lng = coordinate_text(&hit["lon"])?;
    Some((lat, lng))
}

fn coordinate_text(value: &Value) -> Option<f64> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_f64())
}

/// HTTP access to both geocoding services.
pub struct Geocoder {
    client: Client,
    census_url: String,
    nominatim_url: String,
}

impl Geocoder {
    pub fn new(census_url: impl Into<String>, nominatim_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            census_url: census_url.into(),
            nominatim_url: nominatim_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Geocode one batch through the Census service.
    pub async fn census_batch(&self, targets: &[GeocodeTarget]) -> Result<HashMap<i64, (f64, f64)>> {
        let file = Part::text(census_batch_csv(targets)?)
            .file_name("addresses.csv")
            .mime_str("text/csv")?;
        let form = Form::new()
            .part("addressFile", file)
            .text("benchmark", "Public_AR_Current")
            .text("vintage", "Current_Current");

        let body = self
            .client
            .post(&self.census_url)
            .multipart(form)
            .timeout(CENSUS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_census_batch(&body))
    }

    /// Try each fallback query; returns the location and the strategy that found it.
    pub async fn fallback(&self, target: &GeocodeTarget) -> Result<Option<((f64, f64), &'static str)>> {
        for (query, strategy) in fallback_queries(target) {
            let body: Value = self
                .client
                .get(format!("{}/search", self.nominatim_url))
                .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
                .timeout(NOMINATIM_TIMEOUT)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .with_context(|| format!("decoding search response for '{}'", query))?;
            if let Some(point) = parse_nominatim(&body) {
                return Ok(Some((point, strategy)));
            }
        }
        Ok(None)
    }
}
