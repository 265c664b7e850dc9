//! Shared application state.

pub mod pricing;
pub mod store;

pub use pricing::PricingSnapshot;
pub use store::AppState;
