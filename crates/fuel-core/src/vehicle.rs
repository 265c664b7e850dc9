//! Vehicle profile and planning parameters.
//!
//! These are plain values handed to the engine per call, so several
//! simulations with different profiles can run side by side.

use crate::models::Assumptions;
use serde::{Deserialize, Serialize};

/// Fuel characteristics of the vehicle being planned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    /// Distance covered on a full tank
    pub max_range_miles: f64,
    /// Fuel economy (miles per gallon/litre/...)
    pub miles_per_unit: f64,
    /// Fuel in the tank at departure, capped at tank capacity
    pub start_fuel_units: f64,
}

impl Default for VehicleProfile {
    fn default() -> Self {
        Self {
            max_range_miles: 500.0,
            miles_per_unit: 10.0,
            start_fuel_units: 50.0,
        }
    }
}

impl VehicleProfile {
    pub fn tank_capacity_units(&self) -> f64 {
        self.max_range_miles / self.miles_per_unit
    }

    /// Departure fuel, never more than the tank holds.
    pub fn start_fuel(&self) -> f64 {
        self.start_fuel_units.min(self.tank_capacity_units()).max(0.0)
    }

    /// Returns a list of configuration problems (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.max_range_miles.is_finite() && self.max_range_miles > 0.0) {
            errors.push("max_range_miles must be positive".to_string());
        }
        if !(self.miles_per_unit.is_finite() && self.miles_per_unit > 0.0) {
            errors.push("miles_per_unit must be positive".to_string());
        }
        if !self.start_fuel_units.is_finite() || self.start_fuel_units < 0.0 {
            errors.push("start_fuel_units cannot be negative".to_string());
        }
        errors
    }
}

/// Per-request sampling and decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Approximate spacing between sampled waypoints
    pub waypoint_interval_miles: f64,
    /// Remaining range below which a purchase is considered
    pub reserve_miles: f64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            waypoint_interval_miles: 50.0,
            reserve_miles: 120.0,
        }
    }
}

impl PlanOptions {
    /// Minimum cumulative distance between two consecutive stops.
    pub fn min_stop_spacing_miles(&self) -> f64 {
        self.waypoint_interval_miles * 0.5
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.waypoint_interval_miles.is_finite() && self.waypoint_interval_miles > 0.0) {
            errors.push("waypoint_interval_miles must be positive".to_string());
        }
        if !self.reserve_miles.is_finite() || self.reserve_miles < 0.0 {
            errors.push("reserve_miles cannot be negative".to_string());
        }
        errors
    }
}

/// Proximity parameters for the corridor-keyed price strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorOptions {
    /// Half-width of the buffer around the route polyline
    pub corridor_width_miles: f64,
    /// Search radius around each waypoint
    pub station_radius_miles: f64,
}

impl Default for CorridorOptions {
    fn default() -> Self {
        Self {
            corridor_width_miles: 25.0,
            station_radius_miles: 25.0,
        }
    }
}

/// Echo of the parameters a plan was computed with.
pub fn assumptions(profile: &VehicleProfile, options: &PlanOptions) -> Assumptions {
    Assumptions {
        max_range_miles: profile.max_range_miles,
        miles_per_unit: profile.miles_per_unit,
        start_fuel_units: profile.start_fuel(),
        tank_capacity_units: profile.tank_capacity_units(),
        waypoint_interval_miles: options.waypoint_interval_miles,
        reserve_miles: options.reserve_miles,
    }
}
