//! Shared library surface for the fuel planner service and its tools.

pub mod api;
pub mod cache;
pub mod config;
pub mod persistence;
pub mod routing;
pub mod state;
