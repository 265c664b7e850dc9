pub mod engine;
pub mod models;
pub mod regions;
pub mod resolver;
pub mod spatial;
pub mod vehicle;
pub mod waypoints;

pub use engine::{
    compute_fuel_plan, FuelEngine, PlanError, PlanRun, TankReading, NO_ROUTE_WARNING,
    NO_STATIONS_WARNING, OUT_OF_FUEL_WARNING, UNKNOWN_LOCATION_WARNING,
};
pub use models::{
    Assumptions, Decision, FuelPlan, RouteGeometry, Station, Stop, StopStation, Waypoint,
};
pub use regions::{Region, RegionIndex};
pub use resolver::{
    CorridorPriceResolver, PriceBasis, PriceResolver, PricedPoint, RegionDirectory,
    RegionPriceResolver, ResolverError, RoutePricing, StationCatalog, StationTable,
};
pub use spatial::haversine_miles;
pub use vehicle::{CorridorOptions, PlanOptions, VehicleProfile};
pub use waypoints::build_waypoints;
