//! Fuel stop decision engine.
//!
//! Walks the sampled waypoints of a route once, draining the tank by the
//! distance driven. When remaining range drops to the reserve threshold it
//! buys at the applicable station: just enough to reach the first strictly
//! cheaper price within max range, or otherwise enough to fill up (or reach
//! the destination). The result is feasible and traceable, not globally
//! cheapest.

use crate::models::{
    round_decimal, round_dp, Decision, FuelPlan, RouteGeometry, Stop, StopStation, Waypoint,
    COST_DP, PRICE_DP, QUANTITY_DP,
};
use crate::resolver::{PriceResolver, PricedPoint, ResolverError, RoutePricing};
use crate::vehicle::{assumptions, PlanOptions, VehicleProfile};
use crate::waypoints::build_waypoints;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, debug_span, warn};

/// Tolerance for tank arithmetic.
pub const FUEL_EPSILON: f64 = 1e-6;

pub const NO_ROUTE_WARNING: &str = "Route geometry had fewer than two coordinates.";
pub const NO_STATIONS_WARNING: &str = "No stations found for any region along the route.";
pub const OUT_OF_FUEL_WARNING: &str =
    "Ran out of fuel before reaching destination (check station coverage / parameters).";
pub const UNKNOWN_LOCATION_WARNING: &str =
    "Some stop stations lack precise coordinates; stop markers use route waypoint coordinates.";

/// The engine could not run because a collaborator failed.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("dependency failure: {0}")]
    Dependency(#[from] ResolverError),
}

/// Tank contents around one processed waypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankReading {
    pub waypoint_index: usize,
    pub mile: f64,
    /// Fuel after driving to the waypoint
    pub arrival_units: f64,
    /// Fuel after any purchase at the waypoint
    pub departure_units: f64,
}

/// A plan plus the data it was derived from.
#[derive(Debug, Clone)]
pub struct PlanRun {
    pub plan: FuelPlan,
    pub waypoints: Vec<Waypoint>,
    pub trace: Vec<TankReading>,
}

/// Mutable state of one simulation, discarded when the run ends.
#[derive(Debug, Clone)]
struct SimulationState {
    fuel_in_tank: f64,
    previous_cumulative_miles: f64,
    last_stop_station_id: Option<i64>,
    last_stop_mile: Option<f64>,
}

impl SimulationState {
    fn new(start_fuel: f64) -> Self {
        Self {
            fuel_in_tank: start_fuel,
            previous_cumulative_miles: 0.0,
            last_stop_station_id: None,
            last_stop_mile: None,
        }
    }

    fn drive_to(&mut self, cumulative_miles: f64, miles_per_unit: f64) {
        let delta = cumulative_miles - self.previous_cumulative_miles;
        self.fuel_in_tank -= delta / miles_per_unit;
        self.previous_cumulative_miles = cumulative_miles;
    }

    fn range_miles(&self, miles_per_unit: f64) -> f64 {
        self.fuel_in_tank * miles_per_unit
    }

    /// Whether a stop at `mile` keeps the minimum spacing from the last one.
    fn spacing_allows(&self, mile: f64, min_spacing: f64) -> bool {
        self.last_stop_mile
            .map_or(true, |last| mile - last >= min_spacing)
    }
}

/// Accumulates stops and totals.
#[derive(Debug, Default)]
struct Ledger {
    stops: Vec<Stop>,
    total_cost: Decimal,
    total_units: f64,
}

/// Plans refuelling stops for one vehicle profile.
#[derive(Debug, Clone, Default)]
pub struct FuelEngine {
    profile: VehicleProfile,
}

impl FuelEngine {
    pub fn new(profile: VehicleProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &VehicleProfile {
        &self.profile
    }

    /// Compute a fuel plan for a route.
    ///
    /// Degenerate outcomes (no route, no stations, running dry) come back as
    /// warnings on a successful plan. Only a failing resolver is an error.
    pub fn compute_fuel_plan<R: PriceResolver + ?Sized>(
        &self,
        geometry: &RouteGeometry,
        options: &PlanOptions,
        resolver: &R,
    ) -> Result<FuelPlan, PlanError> {
        Ok(self.run(geometry, options, resolver)?.plan)
    }

    /// Like [`FuelEngine::compute_fuel_plan`], also returning waypoints and the tank trace.
    pub fn run<R: PriceResolver + ?Sized>(
        &self,
        geometry: &RouteGeometry,
        options: &PlanOptions,
        resolver: &R,
    ) -> Result<PlanRun, PlanError> {
        let span = debug_span!(
            "fuel_plan",
            coordinates = geometry.len(),
            interval_miles = options.waypoint_interval_miles,
            reserve_miles = options.reserve_miles,
        );
        let _entered = span.enter();

        let waypoints = build_waypoints(geometry, options.waypoint_interval_miles);
        if waypoints.is_empty() {
            debug!("route has no usable coordinates");
            return Ok(PlanRun {
                plan: FuelPlan::empty(
                    Vec::new(),
                    assumptions(&self.profile, options),
                    NO_ROUTE_WARNING,
                ),
                waypoints,
                trace: Vec::new(),
            });
        }

        let pricing = resolver.resolve(geometry, &waypoints)?;
        if pricing.points.len() != waypoints.len() {
            return Err(PlanError::Dependency(ResolverError::Unavailable(format!(
                "resolver priced {} points for {} waypoints",
                pricing.points.len(),
                waypoints.len()
            ))));
        }

        if !pricing.has_any_station() {
            debug!(regions = ?pricing.regions, "no stations along route");
            return Ok(PlanRun {
                plan: FuelPlan::empty(
                    pricing.regions,
                    assumptions(&self.profile, options),
                    NO_STATIONS_WARNING,
                ),
                waypoints,
                trace: Vec::new(),
            });
        }

        let (plan, trace) = self.simulate(&waypoints, &pricing, options);
        Ok(PlanRun {
            plan,
            waypoints,
            trace,
        })
    }

    fn simulate(
        &self,
        waypoints: &[Waypoint],
        pricing: &RoutePricing,
        options: &PlanOptions,
    ) -> (FuelPlan, Vec<TankReading>) {
        let mpu = self.profile.miles_per_unit;
        let max_range = self.profile.max_range_miles;
        let capacity = self.profile.tank_capacity_units();
        let min_spacing = options.min_stop_spacing_miles();
        let total_miles = waypoints.last().map_or(0.0, |wp| wp.cumulative_miles);

        let mut state = SimulationState::new(self.profile.start_fuel());
        let mut ledger = Ledger::default();
        let mut trace = Vec::with_capacity(waypoints.len());
        let mut ran_dry = false;

        for (i, wp) in waypoints.iter().enumerate().skip(1) {
            state.drive_to(wp.cumulative_miles, mpu);
            let mut reading = TankReading {
                waypoint_index: i,
                mile: wp.cumulative_miles,
                arrival_units: state.fuel_in_tank,
                departure_units: state.fuel_in_tank,
            };

            if state.fuel_in_tank < -FUEL_EPSILON {
                warn!(
                    mile = wp.cumulative_miles,
                    fuel = state.fuel_in_tank,
                    "vehicle runs dry before destination"
                );
                trace.push(reading);
                ran_dry = true;
                break;
            }

            let remaining = total_miles - wp.cumulative_miles;
            let range = state.range_miles(mpu);
            if remaining <= range {
                trace.push(reading);
                break;
            }
            if range > options.reserve_miles {
                trace.push(reading);
                continue;
            }

            let Some(current) = pricing.applicable(i) else {
                trace.push(reading);
                continue;
            };

            if !state.spacing_allows(wp.cumulative_miles, min_spacing) {
                trace.push(reading);
                continue;
            }

            let cheaper_ahead = first_cheaper_ahead(waypoints, pricing, i, current, max_range);
            let (target_miles, decision) = match cheaper_ahead {
                Some(miles_ahead) => (miles_ahead, Decision::BuyToReachCheaperAhead),
                None => (max_range.min(remaining), Decision::FillToMaxOrDestination),
            };

            let units_needed = target_miles / mpu;
            let units_to_buy = (units_needed - state.fuel_in_tank)
                .max(0.0)
                .min(capacity - state.fuel_in_tank);
            if units_to_buy <= FUEL_EPSILON {
                trace.push(reading);
                continue;
            }

            if state.last_stop_station_id == Some(current.station.id) {
                debug!(station = current.station.id, "repeat purchase at same station");
            }

            let exact_cost = Decimal::from_f64(units_to_buy).unwrap_or(Decimal::ZERO)
                * current.station.price_per_unit;
            state.fuel_in_tank += units_to_buy;
            ledger.total_cost += exact_cost;
            ledger.total_units += units_to_buy;

            debug!(
                mile = wp.cumulative_miles,
                station = current.station.id,
                units = units_to_buy,
                decision = decision.as_str(),
                "fuel stop"
            );

            ledger.stops.push(build_stop(wp, current, units_to_buy, exact_cost, decision));
            state.last_stop_station_id = Some(current.station.id);
            state.last_stop_mile = Some(wp.cumulative_miles);

            reading.departure_units = state.fuel_in_tank;
            trace.push(reading);
        }

        let mut warnings = Vec::new();
        if ran_dry {
            warnings.push(OUT_OF_FUEL_WARNING.to_string());
        }
        if ledger.stops.iter().any(|stop| !stop.station.location_known) {
            warnings.push(UNKNOWN_LOCATION_WARNING.to_string());
        }

        let plan = FuelPlan {
            regions_traversed: pricing.regions.clone(),
            stops: ledger.stops,
            total_cost: round_dp(ledger.total_cost, COST_DP),
            total_units_bought: round_decimal(ledger.total_units, QUANTITY_DP),
            assumptions: assumptions(&self.profile, options),
            warnings,
        };
        (plan, trace)
    }
}

/// Distance to the first waypoint after `index`, within max range, whose own
/// price is strictly below the current station's.
fn first_cheaper_ahead(
    waypoints: &[Waypoint],
    pricing: &RoutePricing,
    index: usize,
    current: &PricedPoint,
    max_range_miles: f64,
) -> Option<f64> {
    let origin = waypoints[index].cumulative_miles;
    let limit = origin + max_range_miles;

    for (j, ahead) in waypoints.iter().enumerate().skip(index + 1) {
        if ahead.cumulative_miles > limit {
            break;
        }
        let Some(priced) = pricing.at(j) else {
            continue;
        };
        if priced.station.price_per_unit < current.station.price_per_unit {
            return Some(ahead.cumulative_miles - origin);
        }
    }
    None
}

fn build_stop(
    wp: &Waypoint,
    current: &PricedPoint,
    units: f64,
    exact_cost: Decimal,
    decision: Decision,
) -> Stop {
    Stop {
        mile_marker: (wp.cumulative_miles * 100.0).round() / 100.0,
        marker_lat: wp.lat,
        marker_lng: wp.lng,
        region_at_stop: current.region.clone(),
        units_bought: round_decimal(units, QUANTITY_DP),
        cost: round_dp(exact_cost, COST_DP),
        price_per_unit: round_dp(current.station.price_per_unit, PRICE_DP),
        decision,
        station: StopStation::from(&current.station),
        note: current.basis.note().to_string(),
    }
}

/// Plan with the default vehicle profile and options.
pub fn compute_fuel_plan<R: PriceResolver + ?Sized>(
    geometry: &RouteGeometry,
    resolver: &R,
) -> Result<FuelPlan, PlanError> {
    FuelEngine::default().compute_fuel_plan(geometry, &PlanOptions::default(), resolver)
}
