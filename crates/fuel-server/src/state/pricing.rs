//! Immutable in-memory view of station prices and region boundaries.

use crate::config::PriceStrategy;
use chrono::{DateTime, Utc};
use fuel_core::{
    CorridorOptions, CorridorPriceResolver, PriceResolver, Region, RegionIndex,
    RegionPriceResolver, Station, StationTable,
};

/// Pricing data loaded from the store, swapped as a whole on reload.
#[derive(Debug, Clone)]
pub struct PricingSnapshot {
    regions: RegionIndex,
    stations: StationTable,
    loaded_at: DateTime<Utc>,
}

impl Default for PricingSnapshot {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl PricingSnapshot {
    pub fn new(regions: Vec<Region>, stations: Vec<Station>) -> Self {
        Self {
            regions: RegionIndex::new(regions),
            stations: StationTable::new(stations),
            loaded_at: Utc::now(),
        }
    }

    pub fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    pub fn stations(&self) -> &StationTable {
        &self.stations
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Resolver for the configured strategy, borrowing this snapshot.
    pub fn resolver<'a>(
        &'a self,
        strategy: PriceStrategy,
        corridor: &CorridorOptions,
    ) -> Box<dyn PriceResolver + Send + Sync + 'a> {
        match strategy {
            PriceStrategy::Region => {
                Box::new(RegionPriceResolver::new(&self.regions, &self.stations))
            }
            PriceStrategy::Corridor => {
                Box::new(CorridorPriceResolver::new(&self.stations, corridor.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuel_core::{RouteGeometry, Waypoint};
    use rust_decimal_macros::dec;

    fn station(id: i64, region: &str) -> Station {
        Station {
            id,
            opis_id: None,
            name: format!("Station {}", id),
            address: String::new(),
            city: "Hays".to_string(),
            region: region.to_string(),
            price_per_unit: dec!(3.10),
            lat: Some(38.88),
            lng: Some(-99.33),
        }
    }

    #[test]
    fn both_strategies_price_a_kansas_route() {
        let snapshot = PricingSnapshot::new(
            vec![Region::rectangle("KS", "Kansas", 37.0, -102.0, 40.0, -94.6)],
            vec![station(1, "KS")],
        );
        let geometry = RouteGeometry::from_lat_lng(&[(38.88, -99.8), (38.88, -98.9)]);
        let waypoints = vec![
            Waypoint { lat: 38.88, lng: -99.8, cumulative_miles: 0.0 },
            Waypoint { lat: 38.88, lng: -98.9, cumulative_miles: 48.6 },
        ];

        for strategy in [PriceStrategy::Region, PriceStrategy::Corridor] {
            let resolver = snapshot.resolver(strategy, &CorridorOptions::default());
            let pricing = resolver.resolve(&geometry, &waypoints).unwrap();
            assert_eq!(pricing.regions, vec!["KS"], "{:?}", strategy);
            assert!(pricing.has_any_station());
        }
    }

    #[test]
    fn empty_snapshot_prices_nothing() {
        let snapshot = PricingSnapshot::default();
        assert!(snapshot.regions().is_empty());
        assert!(snapshot.stations().is_empty());
    }
}
