//! Core data models for fuel planning.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places for monetary amounts.
pub const COST_DP: u32 = 2;
/// Decimal places for fuel quantities.
pub const QUANTITY_DP: u32 = 4;
/// Decimal places for unit prices.
pub const PRICE_DP: u32 = 5;

/// Convert a float to a decimal with exactly `dp` places, rounded half away from zero.
pub fn round_decimal(value: f64, dp: u32) -> Decimal {
    round_dp(Decimal::from_f64(value).unwrap_or(Decimal::ZERO), dp)
}

/// Round half away from zero and fix the scale at `dp` places.
pub fn round_dp(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

/// Road-following route geometry as delivered by the routing provider.
///
/// Coordinates are GeoJSON ordered: `[lng, lat]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    pub fn new(coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            kind: Some("LineString".to_string()),
            coordinates,
        }
    }

    /// Build from `(lat, lng)` pairs, flipping into GeoJSON order.
    pub fn from_lat_lng(points: &[(f64, f64)]) -> Self {
        Self::new(points.iter().map(|&(lat, lng)| [lng, lat]).collect())
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// A sampled point along a route with its distance from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
    pub cumulative_miles: f64,
}

/// A fuel station with its current retail price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: i64,
    /// Upstream price-feed identifier
    #[serde(default)]
    pub opis_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    /// Region code (state/province), upper case
    pub region: String,
    pub price_per_unit: Decimal,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl Station {
    /// Whether the station has been geocoded.
    pub fn location_known(&self) -> bool {
        self.location().is_some()
    }

    /// `(lat, lng)` if both coordinates are present and finite.
    pub fn location(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Station details embedded in a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopStation {
    pub id: i64,
    pub opis_id: Option<i64>,
    pub name: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_known: bool,
}

impl From<&Station> for StopStation {
    fn from(station: &Station) -> Self {
        Self {
            id: station.id,
            opis_id: station.opis_id,
            name: station.name.clone(),
            address: station.address.clone(),
            city: station.city.clone(),
            region: station.region.clone(),
            lat: station.lat,
            lng: station.lng,
            location_known: station.location_known(),
        }
    }
}

/// Why a purchase was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Buy just enough to reach a strictly cheaper price ahead
    BuyToReachCheaperAhead,
    /// No cheaper price in range: fill to max range or to the destination
    FillToMaxOrDestination,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::BuyToReachCheaperAhead => "BUY_TO_REACH_CHEAPER_AHEAD",
            Decision::FillToMaxOrDestination => "FILL_TO_MAX_OR_DESTINATION",
        }
    }
}

/// A purchase made at a route waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub mile_marker: f64,
    pub marker_lat: f64,
    pub marker_lng: f64,
    pub region_at_stop: Option<String>,
    pub units_bought: Decimal,
    pub cost: Decimal,
    pub price_per_unit: Decimal,
    pub decision: Decision,
    pub station: StopStation,
    pub note: String,
}

/// Vehicle and sampling parameters a plan was computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub max_range_miles: f64,
    pub miles_per_unit: f64,
    pub start_fuel_units: f64,
    pub tank_capacity_units: f64,
    pub waypoint_interval_miles: f64,
    pub reserve_miles: f64,
}

/// The output of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelPlan {
    pub regions_traversed: Vec<String>,
    pub stops: Vec<Stop>,
    pub total_cost: Decimal,
    pub total_units_bought: Decimal,
    pub assumptions: Assumptions,
    pub warnings: Vec<String>,
}

impl FuelPlan {
    /// A plan with no stops, carrying a single explanatory warning.
    pub fn empty(
        regions_traversed: Vec<String>,
        assumptions: Assumptions,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            regions_traversed,
            stops: Vec::new(),
            total_cost: round_dp(Decimal::ZERO, COST_DP),
            total_units_bought: round_dp(Decimal::ZERO, QUANTITY_DP),
            assumptions,
            warnings: vec![warning.into()],
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Cost-weighted average unit price, zero when nothing was bought.
    pub fn average_price_per_unit(&self) -> Decimal {
        if self.total_units_bought.is_zero() {
            return round_dp(Decimal::ZERO, PRICE_DP);
        }
        round_dp(self.total_cost / self.total_units_bought, PRICE_DP)
    }

    pub fn has_warning_containing(&self, needle: &str) -> bool {
        self.warnings.iter().any(|w| w.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn assumptions() -> Assumptions {
        Assumptions {
            max_range_miles: 500.0,
            miles_per_unit: 10.0,
            start_fuel_units: 50.0,
            tank_capacity_units: 50.0,
            waypoint_interval_miles: 50.0,
            reserve_miles: 120.0,
        }
    }

    #[test]
    fn round_decimal_rounds_half_away_from_zero() {
        assert_eq!(round_decimal(2.5, 0), dec!(3));
        assert_eq!(round_decimal(1.23456, 4), dec!(1.2346));
        assert_eq!(round_decimal(f64::NAN, 2), Decimal::ZERO);
    }

    #[test]
    fn rounded_values_keep_fixed_scale() {
        assert_eq!(round_decimal(10.0, 4).to_string(), "10.0000");
        assert_eq!(round_dp(dec!(3), PRICE_DP).to_string(), "3.00000");
        assert_eq!(round_dp(dec!(12.345), COST_DP).to_string(), "12.35");
    }

    #[test]
    fn route_geometry_keeps_lng_lat_order() {
        let geometry = RouteGeometry::from_lat_lng(&[(35.0, -100.0), (36.0, -101.0)]);
        assert_eq!(geometry.coordinates[0], [-100.0, 35.0]);
        assert_eq!(geometry.len(), 2);
    }

    #[test]
    fn route_geometry_parses_geojson_linestring() {
        let geometry: RouteGeometry = serde_json::from_str(
            r#"{"type": "LineString", "coordinates": [[-104.99, 39.74], [-105.27, 40.01]]}"#,
        )
        .unwrap();
        assert_eq!(geometry.kind.as_deref(), Some("LineString"));
        assert_eq!(geometry.coordinates[1], [-105.27, 40.01]);
    }

    #[test]
    fn station_location_requires_both_coordinates() {
        let mut station = Station {
            id: 1,
            opis_id: None,
            name: "Pilot".into(),
            address: "I-80, EXIT 123".into(),
            city: "Ogallala".into(),
            region: "NE".into(),
            price_per_unit: dec!(3.199),
            lat: Some(41.1),
            lng: None,
        };
        assert!(!station.location_known());
        station.lng = Some(-101.7);
        assert!(station.location_known());
        assert!(StopStation::from(&station).location_known);
    }

    #[test]
    fn fuel_plan_serializes_external_field_names() {
        let plan = FuelPlan::empty(vec!["TX".into()], assumptions(), "no stations");
        let value = serde_json::to_value(&plan).unwrap();
        assert!(value.get("regionsTraversed").is_some());
        assert!(value.get("totalUnitsBought").is_some());
        assert_eq!(value["assumptions"]["tankCapacityUnits"], 50.0);
        assert_eq!(value["warnings"][0], "no stations");
    }

    #[test]
    fn decision_tags_use_screaming_snake_case() {
        let json = serde_json::to_string(&Decision::BuyToReachCheaperAhead).unwrap();
        assert_eq!(json, "\"BUY_TO_REACH_CHEAPER_AHEAD\"");
        assert_eq!(
            Decision::FillToMaxOrDestination.as_str(),
            "FILL_TO_MAX_OR_DESTINATION"
        );
    }

    #[test]
    fn average_price_is_zero_without_purchases() {
        let mut plan = FuelPlan::empty(Vec::new(), assumptions(), "x");
        assert_eq!(plan.average_price_per_unit(), Decimal::ZERO);
        plan.total_cost = dec!(31.99);
        plan.total_units_bought = dec!(10);
        assert_eq!(plan.average_price_per_unit(), dec!(3.199));
    }
}
