//! Persistence layer for the fuel planner.
//!
//! SQLite-backed storage for station prices, region boundaries and resolved
//! routes. The pricing tables are read into an in-memory snapshot at startup
//! and on reload; the route cache is read through on every request.

pub mod db;
pub mod geocoding;
pub mod regions;
pub mod route_cache;
pub mod stations;

pub use db::{clear_all, init_database, Database};
pub use stations::StationRecord;
