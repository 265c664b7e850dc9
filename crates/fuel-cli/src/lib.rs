//! Fuel planner CLI - offline tools around the planning service.
//!
//! Binaries:
//! - load_fuel_prices: import a retail price feed (CSV) into the station store
//! - load_regions: import region boundaries (GeoJSON) into the region store
//! - geocode_stations: fill in station coordinates from their addresses
//! - plan_route: run the planner locally over a GeoJSON route

pub mod geocode;
pub mod geojson;
pub mod prices;

pub use geojson::{regions_from_geojson, route_geometry_from_geojson, RegionImport};
pub use prices::{check_headers, parse_price_row, PriceRow, RowOutcome, REQUIRED_HEADERS};
