//! Retail price feed rows.

use anyhow::{bail, Result};
use fuel_server::persistence::StationRecord;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Columns every price feed must carry.
pub const REQUIRED_HEADERS: [&str; 6] = [
    "OPIS Truckstop ID",
    "Truckstop Name",
    "Address",
    "City",
    "State",
    "Retail Price",
];

/// One raw feed row. Numeric columns stay text so bad values can be
/// reported per row instead of aborting the import.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceRow {
    #[serde(rename = "OPIS Truckstop ID")]
    pub opis_id: String,
    #[serde(rename = "Truckstop Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Retail Price")]
    pub retail_price: String,
    /// Optional, present in pre-geocoded feeds
    #[serde(rename = "Latitude", default)]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude", default)]
    pub longitude: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Station(StationRecord),
    /// Row is incomplete; not counted as an error
    Skipped(String),
    /// Row has malformed values
    Error(String),
}

/// Fail unless every required column is present.
pub fn check_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let present: Vec<&str> = headers.into_iter().map(str::trim).collect();
    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !present.contains(h))
        .collect();
    if !missing.is_empty() {
        bail!("CSV missing required headers: {}", missing.join(", "));
    }
    Ok(())
}

/// Validate one row into a station record.
pub fn parse_price_row(row: &PriceRow) -> RowOutcome {
    let opis_id = match row.opis_id.trim().parse::<i64>() {
        Ok(id) => id,
        Err(_) => return RowOutcome::Error(format!("invalid truckstop id '{}'", row.opis_id)),
    };
    let price = match Decimal::from_str(row.retail_price.trim()) {
        Ok(price) if price.is_sign_negative() => {
            return RowOutcome::Error(format!("negative retail price '{}'", row.retail_price))
        }
        Ok(price) => price,
        Err(_) => return RowOutcome::Error(format!("invalid retail price '{}'", row.retail_price)),
    };

    let name = row.name.trim();
    let city = row.city.trim();
    let state = row.state.trim().to_ascii_uppercase();
    if name.is_empty() || city.is_empty() || state.is_empty() {
        return RowOutcome::Skipped(format!("station {} is missing name, city or state", opis_id));
    }
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return RowOutcome::Skipped(format!("station {} has invalid state '{}'", opis_id, state));
    }

    let (lat, lng) = match parse_location(row) {
        Ok(location) => location,
        Err(msg) => return RowOutcome::Error(msg),
    };

    RowOutcome::Station(StationRecord {
        opis_id: Some(opis_id),
        name: name.to_string(),
        address: row.address.trim().to_string(),
        city: city.to_string(),
        region: state,
        price_per_unit: price,
        lat,
        lng,
    })
}

fn parse_location(row: &PriceRow) -> Result<(Option<f64>, Option<f64>), String> {
    let lat = optional_f64(row.latitude.as_deref(), "latitude")?;
    let lng = optional_f64(row.longitude.as_deref(), "longitude")?;
    match (lat, lng) {
        (Some(lat), Some(lng)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) => {
            Ok((Some(lat), Some(lng)))
        }
        (Some(lat), Some(lng)) => Err(format!("coordinates out of range: {}, {}", lat, lng)),
        _ => Ok((None, None)),
    }
}

fn optional_f64(value: Option<&str>, field: &str) -> Result<Option<f64>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| format!("invalid {} '{}'", field, v)),
    }
}
