//! Price resolution along a route.
//!
//! The engine only sees [`PriceResolver`]. Two strategies implement it:
//! region-keyed (cheapest station per state, plus a global fallback) and
//! corridor-keyed (cheapest station near each waypoint). Both are built on
//! the lower-level [`RegionDirectory`] and [`StationCatalog`] collaborators,
//! which may be backed by memory, a database or a remote service.

use crate::models::{RouteGeometry, Station, Waypoint};
use crate::spatial::{distance_to_polyline_miles, haversine_miles, miles_per_deg_lat, miles_per_deg_lon};
use crate::vehicle::CorridorOptions;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Failure of a pricing/geography collaborator.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("price data unavailable: {0}")]
    Unavailable(String),
    #[error("invalid route geometry: {0}")]
    InvalidGeometry(String),
}

/// Looks up which region a route or point falls in.
pub trait RegionDirectory {
    /// Sorted codes of all regions the route touches.
    fn regions_for_route(&self, geometry: &RouteGeometry) -> Result<Vec<String>, ResolverError>;

    fn region_for_point(&self, lat: f64, lng: f64) -> Result<Option<String>, ResolverError>;
}

/// Read access to station prices.
pub trait StationCatalog {
    /// The cheapest station in each of the given regions that has any.
    fn cheapest_by_region(
        &self,
        regions: &[String],
    ) -> Result<BTreeMap<String, Station>, ResolverError>;

    /// Geocoded stations within `corridor_width_miles` of the route.
    fn stations_in_corridor(
        &self,
        geometry: &RouteGeometry,
        corridor_width_miles: f64,
    ) -> Result<Vec<Station>, ResolverError>;
}

impl<T: RegionDirectory + ?Sized> RegionDirectory for &T {
    fn regions_for_route(&self, geometry: &RouteGeometry) -> Result<Vec<String>, ResolverError> {
        (**self).regions_for_route(geometry)
    }

    fn region_for_point(&self, lat: f64, lng: f64) -> Result<Option<String>, ResolverError> {
        (**self).region_for_point(lat, lng)
    }
}

impl<T: StationCatalog + ?Sized> StationCatalog for &T {
    fn cheapest_by_region(
        &self,
        regions: &[String],
    ) -> Result<BTreeMap<String, Station>, ResolverError> {
        (**self).cheapest_by_region(regions)
    }

    fn stations_in_corridor(
        &self,
        geometry: &RouteGeometry,
        corridor_width_miles: f64,
    ) -> Result<Vec<Station>, ResolverError> {
        (**self).stations_in_corridor(geometry, corridor_width_miles)
    }
}

/// How a waypoint's station was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    /// Cheapest station in the waypoint's region
    Region,
    /// Waypoint's region had no price; cheapest along the whole route
    RouteFallback,
    /// Cheapest station within the search radius
    Nearby,
}

impl PriceBasis {
    pub fn note(&self) -> &'static str {
        match self {
            PriceBasis::Region => {
                "Stop marker is on route waypoint; station chosen as cheapest in that region."
            }
            PriceBasis::RouteFallback => {
                "Stop marker is on route waypoint; no priced station in this region, using cheapest along the route."
            }
            PriceBasis::Nearby => {
                "Stop marker is on route waypoint; station chosen as cheapest within search radius."
            }
        }
    }
}

/// The station applicable at one waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedPoint {
    pub region: Option<String>,
    pub station: Station,
    pub basis: PriceBasis,
}

/// Pricing resolved for every sampled waypoint of one route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePricing {
    /// Regions the route passes through, sorted
    pub regions: Vec<String>,
    /// Aligned with the waypoint list; `None` where nothing applies
    pub points: Vec<Option<PricedPoint>>,
    /// Used at waypoints with no applicable station
    pub fallback: Option<PricedPoint>,
}

impl RoutePricing {
    /// Pricing that knows no stations at all.
    pub fn unpriced(regions: Vec<String>, waypoint_count: usize) -> Self {
        Self {
            regions,
            points: vec![None; waypoint_count],
            fallback: None,
        }
    }

    pub fn has_any_station(&self) -> bool {
        self.fallback.is_some() || self.points.iter().any(Option::is_some)
    }

    /// Station resolved for waypoint `index` itself.
    pub fn at(&self, index: usize) -> Option<&PricedPoint> {
        self.points.get(index).and_then(Option::as_ref)
    }

    /// Station to buy from at waypoint `index`, falling back if configured.
    pub fn applicable(&self, index: usize) -> Option<&PricedPoint> {
        self.at(index).or(self.fallback.as_ref())
    }
}

/// Resolves the applicable station for each waypoint of a route.
pub trait PriceResolver {
    fn resolve(
        &self,
        geometry: &RouteGeometry,
        waypoints: &[Waypoint],
    ) -> Result<RoutePricing, ResolverError>;
}

impl<T: PriceResolver + ?Sized> PriceResolver for &T {
    fn resolve(
        &self,
        geometry: &RouteGeometry,
        waypoints: &[Waypoint],
    ) -> Result<RoutePricing, ResolverError> {
        (**self).resolve(geometry, waypoints)
    }
}

impl<T: PriceResolver + ?Sized> PriceResolver for Box<T> {
    fn resolve(
        &self,
        geometry: &RouteGeometry,
        waypoints: &[Waypoint],
    ) -> Result<RoutePricing, ResolverError> {
        (**self).resolve(geometry, waypoints)
    }
}

/// Price ordering with a stable tie-break on station id.
pub fn compare_stations(a: &Station, b: &Station) -> Ordering {
    a.price_per_unit
        .cmp(&b.price_per_unit)
        .then_with(|| a.id.cmp(&b.id))
}

/// The cheapest of a set of stations.
pub fn cheapest<'a>(stations: impl IntoIterator<Item = &'a Station>) -> Option<&'a Station> {
    stations.into_iter().min_by(|a, b| compare_stations(a, b))
}

/// Geocoded candidates within `radius_miles` of a point.
pub fn stations_within_radius<'a>(
    lat: f64,
    lng: f64,
    radius_miles: f64,
    candidates: &'a [Station],
) -> Vec<&'a Station> {
    candidates
        .iter()
        .filter(|station| {
            station
                .location()
                .is_some_and(|(s_lat, s_lng)| haversine_miles(lat, lng, s_lat, s_lng) <= radius_miles)
        })
        .collect()
}

/// Cheapest station per region the route touches, with the overall cheapest
/// as fallback for waypoints outside any priced region.
pub struct RegionPriceResolver<D, C> {
    directory: D,
    catalog: C,
}

impl<D: RegionDirectory, C: StationCatalog> RegionPriceResolver<D, C> {
    pub fn new(directory: D, catalog: C) -> Self {
        Self { directory, catalog }
    }
}

impl<D: RegionDirectory, C: StationCatalog> PriceResolver for RegionPriceResolver<D, C> {
    fn resolve(
        &self,
        geometry: &RouteGeometry,
        waypoints: &[Waypoint],
    ) -> Result<RoutePricing, ResolverError> {
        let regions = self.directory.regions_for_route(geometry)?;
        let cheapest_by_region = self.catalog.cheapest_by_region(&regions)?;
        if cheapest_by_region.is_empty() {
            return Ok(RoutePricing::unpriced(regions, waypoints.len()));
        }

        let fallback = cheapest(cheapest_by_region.values()).map(|station| PricedPoint {
            region: Some(station.region.clone()),
            station: station.clone(),
            basis: PriceBasis::RouteFallback,
        });

        let mut points = Vec::with_capacity(waypoints.len());
        for wp in waypoints {
            let region = self.directory.region_for_point(wp.lat, wp.lng)?;
            let priced = region.and_then(|code| {
                cheapest_by_region.get(&code).map(|station| PricedPoint {
                    region: Some(code.clone()),
                    station: station.clone(),
                    basis: PriceBasis::Region,
                })
            });
            points.push(priced);
        }

        Ok(RoutePricing {
            regions,
            points,
            fallback,
        })
    }
}

/// Cheapest geocoded station within a radius of each waypoint, among the
/// stations inside a corridor around the route. No fallback: waypoints with
/// nothing nearby are skipped.
pub struct CorridorPriceResolver<C> {
    catalog: C,
    options: CorridorOptions,
}

impl<C: StationCatalog> CorridorPriceResolver<C> {
    pub fn new(catalog: C, options: CorridorOptions) -> Self {
        Self { catalog, options }
    }
}

impl<C: StationCatalog> PriceResolver for CorridorPriceResolver<C> {
    fn resolve(
        &self,
        geometry: &RouteGeometry,
        waypoints: &[Waypoint],
    ) -> Result<RoutePricing, ResolverError> {
        let candidates = self
            .catalog
            .stations_in_corridor(geometry, self.options.corridor_width_miles)?;

        let regions: Vec<String> = candidates
            .iter()
            .map(|s| s.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if candidates.is_empty() {
            return Ok(RoutePricing::unpriced(regions, waypoints.len()));
        }

        let points = waypoints
            .iter()
            .map(|wp| {
                let nearby =
                    stations_within_radius(wp.lat, wp.lng, self.options.station_radius_miles, &candidates);
                cheapest(nearby).map(|station| PricedPoint {
                    region: Some(station.region.clone()),
                    station: station.clone(),
                    basis: PriceBasis::Nearby,
                })
            })
            .collect();

        Ok(RoutePricing {
            regions,
            points,
            fallback: None,
        })
    }
}

/// In-memory station list.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    stations: Vec<Station>,
}

impl StationTable {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Station count per region, largest first.
    pub fn count_by_region(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for station in &self.stations {
            *counts.entry(station.region.as_str()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> =
            counts.into_iter().map(|(r, c)| (r.to_string(), c)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

impl StationCatalog for StationTable {
    fn cheapest_by_region(
        &self,
        regions: &[String],
    ) -> Result<BTreeMap<String, Station>, ResolverError> {
        let wanted: BTreeSet<String> = regions.iter().map(|r| r.trim().to_uppercase()).collect();
        let mut best: BTreeMap<String, &Station> = BTreeMap::new();

        for station in &self.stations {
            let code = station.region.to_uppercase();
            if !wanted.contains(&code) {
                continue;
            }
            best.entry(code)
                .and_modify(|current| {
                    if compare_stations(station, *current) == Ordering::Less {
                        *current = station;
                    }
                })
                .or_insert(station);
        }

        Ok(best.into_iter().map(|(code, s)| (code, s.clone())).collect())
    }

    fn stations_in_corridor(
        &self,
        geometry: &RouteGeometry,
        corridor_width_miles: f64,
    ) -> Result<Vec<Station>, ResolverError> {
        let coords = &geometry.coordinates;
        if coords.len() < 2 {
            return Err(ResolverError::InvalidGeometry(
                "corridor search needs at least 2 coordinates".to_string(),
            ));
        }

        // Coarse bounding box prefilter before exact polyline distance.
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
        for &[lng, lat] in coords {
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lng = min_lng.min(lng);
            max_lng = max_lng.max(lng);
        }
        let lat_pad = corridor_width_miles / miles_per_deg_lat(0.0);
        let widest_lat = min_lat.abs().max(max_lat.abs()).min(89.0);
        let lng_pad = corridor_width_miles / miles_per_deg_lon(widest_lat).max(1e-6);

        Ok(self
            .stations
            .iter()
            .filter(|station| {
                let Some((lat, lng)) = station.location() else {
                    return false;
                };
                if lat < min_lat - lat_pad
                    || lat > max_lat + lat_pad
                    || lng < min_lng - lng_pad
                    || lng > max_lng + lng_pad
                {
                    return false;
                }
                distance_to_polyline_miles(lat, lng, coords)
                    .is_some_and(|d| d <= corridor_width_miles)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{Region, RegionIndex};
    use crate::waypoints::build_waypoints;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn station(id: i64, region: &str, price: Decimal, location: Option<(f64, f64)>) -> Station {
        Station {
            id,
            opis_id: Some(1000 + id),
            name: format!("Station {id}"),
            address: String::new(),
            city: String::new(),
            region: region.to_string(),
            price_per_unit: price,
            lat: location.map(|l| l.0),
            lng: location.map(|l| l.1),
        }
    }

    fn index() -> RegionIndex {
        RegionIndex::new(vec![
            Region::rectangle("AA", "Alpha", 30.0, -101.0, 32.0, -99.0),
            Region::rectangle("BB", "Beta", 32.0, -101.0, 34.0, -99.0),
        ])
    }

    fn route() -> RouteGeometry {
        RouteGeometry::from_lat_lng(&[(30.5, -100.0), (31.5, -100.0), (33.5, -100.0)])
    }

    #[test]
    fn cheapest_by_region_breaks_ties_on_id() {
        let table = StationTable::new(vec![
            station(3, "AA", dec!(3.10), None),
            station(2, "AA", dec!(3.10), None),
            station(5, "BB", dec!(2.90), None),
            station(9, "CC", dec!(1.00), None),
        ]);
        let best = table
            .cheapest_by_region(&["aa".to_string(), "BB".to_string()])
            .unwrap();
        assert_eq!(best.len(), 2);
        assert_eq!(best["AA"].id, 2);
        assert_eq!(best["BB"].id, 5);
    }

    #[test]
    fn region_resolver_prices_each_waypoint() {
        let table = StationTable::new(vec![
            station(1, "AA", dec!(3.50), None),
            station(2, "BB", dec!(3.00), None),
        ]);
        let resolver = RegionPriceResolver::new(index(), table);
        let geometry = route();
        let waypoints = build_waypoints(&geometry, 50.0);
        let pricing = resolver.resolve(&geometry, &waypoints).unwrap();

        assert_eq!(pricing.regions, vec!["AA", "BB"]);
        assert_eq!(pricing.points.len(), waypoints.len());
        assert_eq!(pricing.at(0).unwrap().station.id, 1);
        assert_eq!(pricing.at(waypoints.len() - 1).unwrap().station.id, 2);
        assert_eq!(pricing.fallback.as_ref().unwrap().station.id, 2);
    }

    #[test]
    fn region_resolver_falls_back_outside_priced_regions() {
        let table = StationTable::new(vec![station(1, "AA", dec!(3.50), None)]);
        let resolver = RegionPriceResolver::new(index(), table);
        let geometry = route();
        let waypoints = build_waypoints(&geometry, 50.0);
        let pricing = resolver.resolve(&geometry, &waypoints).unwrap();

        let last = waypoints.len() - 1;
        assert!(pricing.at(last).is_none());
        let applicable = pricing.applicable(last).unwrap();
        assert_eq!(applicable.station.id, 1);
        assert_eq!(applicable.region.as_deref(), Some("AA"));
        assert_eq!(applicable.basis, PriceBasis::RouteFallback);
    }

    #[test]
    fn region_resolver_without_stations_is_unpriced() {
        let resolver = RegionPriceResolver::new(index(), StationTable::default());
        let geometry = route();
        let waypoints = build_waypoints(&geometry, 50.0);
        let pricing = resolver.resolve(&geometry, &waypoints).unwrap();
        assert!(!pricing.has_any_station());
        assert_eq!(pricing.regions, vec!["AA", "BB"]);
    }

    #[test]
    fn corridor_excludes_far_and_ungeocoded_stations() {
        let table = StationTable::new(vec![
            station(1, "AA", dec!(3.00), Some((31.0, -100.1))),
            station(2, "AA", dec!(2.00), Some((31.0, -95.0))),
            station(3, "BB", dec!(1.00), None),
        ]);
        let found = table.stations_in_corridor(&route(), 25.0).unwrap();
        let ids: Vec<i64> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn corridor_search_rejects_degenerate_geometry() {
        let table = StationTable::default();
        let err = table
            .stations_in_corridor(&RouteGeometry::new(vec![[-100.0, 30.0]]), 25.0)
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidGeometry(_)));
    }

    #[test]
    fn corridor_resolver_picks_cheapest_within_radius() {
        let table = StationTable::new(vec![
            station(1, "AA", dec!(3.00), Some((30.55, -100.05))),
            station(2, "AA", dec!(2.80), Some((30.6, -99.95))),
            station(3, "BB", dec!(2.00), Some((33.45, -100.0))),
        ]);
        let resolver = CorridorPriceResolver::new(table, CorridorOptions::default());
        let geometry = route();
        let waypoints = build_waypoints(&geometry, 50.0);
        let pricing = resolver.resolve(&geometry, &waypoints).unwrap();

        assert!(pricing.fallback.is_none());
        assert_eq!(pricing.at(0).unwrap().station.id, 2);
        assert_eq!(pricing.at(waypoints.len() - 1).unwrap().station.id, 3);
        assert_eq!(pricing.regions, vec!["AA", "BB"]);
    }

    #[test]
    fn stations_within_radius_filters_by_distance() {
        let candidates = vec![
            station(1, "AA", dec!(3.00), Some((30.0, -100.0))),
            station(2, "AA", dec!(3.00), Some((31.0, -100.0))),
        ];
        let nearby = stations_within_radius(30.1, -100.0, 25.0, &candidates);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].id, 1);
    }

    #[test]
    fn count_by_region_sorts_largest_first() {
        let table = StationTable::new(vec![
            station(1, "TX", dec!(3.00), None),
            station(2, "TX", dec!(3.00), None),
            station(3, "OK", dec!(3.00), None),
        ]);
        assert_eq!(
            table.count_by_region(),
            vec![("TX".to_string(), 2), ("OK".to_string(), 1)]
        );
    }
}
