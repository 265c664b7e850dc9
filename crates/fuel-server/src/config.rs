//! Server configuration from environment.

use fuel_core::{CorridorOptions, PlanOptions, VehicleProfile};
use std::env;
use std::str::FromStr;

/// Which price resolver the service plans with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceStrategy {
    /// Cheapest station per region, overall cheapest as fallback
    #[default]
    Region,
    /// Cheapest geocoded station near each waypoint
    Corridor,
}

impl FromStr for PriceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "region" | "state" => Ok(PriceStrategy::Region),
            "corridor" | "nearby" => Ok(PriceStrategy::Corridor),
            other => Err(format!("unknown price strategy '{}'", other)),
        }
    }
}

impl PriceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceStrategy::Region => "region",
            PriceStrategy::Corridor => "corridor",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    pub open_route_api_key: Option<String>,
    pub open_route_base_url: String,
    pub http_timeout_secs: u64,
    pub route_cache_ttl_days: i64,
    pub route_cache_max_entries: usize,
    pub price_strategy: PriceStrategy,
    pub vehicle: VehicleProfile,
    pub plan: PlanOptions,
    pub corridor: CorridorOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8000,
            database_path: "data/fuel_planner.db".to_string(),
            database_max_connections: 5,
            open_route_api_key: None,
            open_route_base_url: "https://api.openrouteservice.org".to_string(),
            http_timeout_secs: 30,
            route_cache_ttl_days: 7,
            route_cache_max_entries: 512,
            price_strategy: PriceStrategy::Region,
            vehicle: VehicleProfile::default(),
            plan: PlanOptions::default(),
            corridor: CorridorOptions::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            server_port: parse_env("FUEL_PORT").unwrap_or(defaults.server_port),
            database_path: env::var("FUEL_DATABASE_PATH").unwrap_or(defaults.database_path),
            database_max_connections: parse_env("FUEL_DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            open_route_api_key: env::var("OPEN_ROUTE_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            open_route_base_url: env::var("OPEN_ROUTE_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.open_route_base_url),
            http_timeout_secs: parse_env("FUEL_HTTP_TIMEOUT_SECS")
                .unwrap_or(defaults.http_timeout_secs),
            route_cache_ttl_days: parse_env("FUEL_ROUTE_CACHE_TTL_DAYS")
                .unwrap_or(defaults.route_cache_ttl_days),
            route_cache_max_entries: parse_env("FUEL_ROUTE_CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.route_cache_max_entries),
            price_strategy: parse_env("FUEL_PRICE_STRATEGY").unwrap_or(defaults.price_strategy),
            vehicle: VehicleProfile {
                max_range_miles: parse_env("FUEL_MAX_RANGE_MILES")
                    .unwrap_or(defaults.vehicle.max_range_miles),
                miles_per_unit: parse_env("FUEL_MILES_PER_UNIT")
                    .unwrap_or(defaults.vehicle.miles_per_unit),
                start_fuel_units: parse_env("FUEL_START_UNITS")
                    .unwrap_or(defaults.vehicle.start_fuel_units),
            },
            plan: PlanOptions {
                waypoint_interval_miles: parse_env("FUEL_WAYPOINT_INTERVAL_MILES")
                    .unwrap_or(defaults.plan.waypoint_interval_miles),
                reserve_miles: parse_env("FUEL_RESERVE_MILES")
                    .unwrap_or(defaults.plan.reserve_miles),
            },
            corridor: CorridorOptions {
                corridor_width_miles: parse_env("FUEL_CORRIDOR_WIDTH_MILES")
                    .unwrap_or(defaults.corridor.corridor_width_miles),
                station_radius_miles: parse_env("FUEL_STATION_RADIUS_MILES")
                    .unwrap_or(defaults.corridor.station_radius_miles),
            },
        }
    }

    /// Problems that make the configured vehicle or planning options unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.vehicle.validate();
        errors.extend(self.plan.validate());
        if self.route_cache_ttl_days <= 0 {
            errors.push("FUEL_ROUTE_CACHE_TTL_DAYS must be positive".to_string());
        }
        errors
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_strategy_parses_aliases() {
        assert_eq!("Region".parse::<PriceStrategy>(), Ok(PriceStrategy::Region));
        assert_eq!(" corridor ".parse::<PriceStrategy>(), Ok(PriceStrategy::Corridor));
        assert!("cheapest".parse::<PriceStrategy>().is_err());
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.vehicle.tank_capacity_units(), 50.0);
    }

    #[test]
    fn invalid_vehicle_is_reported() {
        let mut config = Config::default();
        config.vehicle.miles_per_unit = 0.0;
        config.route_cache_ttl_days = 0;
        assert_eq!(config.validate().len(), 2);
    }
}
