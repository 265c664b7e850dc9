//! Application state shared by all request handlers.

use crate::cache::RouteMemoryCache;
use crate::config::Config;
use crate::persistence::{self, Database};
use crate::routing::{route_cache_key, FetchedRoute, RoutingError, RoutingService};
use crate::state::PricingSnapshot;
use anyhow::Result;
use fuel_core::{FuelEngine, PlanError, PlanOptions, PlanRun, RouteGeometry};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Application state: configuration, storage, routing and the current pricing snapshot.
pub struct AppState {
    config: Config,
    db: Database,
    routing: RoutingService,
    engine: FuelEngine,
    pricing: RwLock<Arc<PricingSnapshot>>,
    route_memory: RouteMemoryCache,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let routing = RoutingService::new(
            config.open_route_base_url.clone(),
            config.open_route_api_key.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )?;
        let ttl = Duration::from_secs(config.route_cache_ttl_days.max(0) as u64 * 86_400);
        Ok(Self {
            engine: FuelEngine::new(config.vehicle.clone()),
            route_memory: RouteMemoryCache::new(config.route_cache_max_entries, ttl),
            pricing: RwLock::new(Arc::new(PricingSnapshot::default())),
            routing,
            db,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The pricing snapshot current at the time of the call.
    pub fn pricing(&self) -> Arc<PricingSnapshot> {
        match self.pricing.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace_pricing(&self, snapshot: PricingSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.pricing.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Rebuild the pricing snapshot from the database and swap it in.
    pub async fn reload_pricing(&self) -> Result<Arc<PricingSnapshot>> {
        let pool = self.db.pool();
        let regions = persistence::regions::load_all_regions(pool).await?;
        let stations = persistence::stations::load_all_stations(pool).await?;
        info!(
            regions = regions.len(),
            stations = stations.len(),
            "pricing snapshot loaded"
        );

        self.replace_pricing(PricingSnapshot::new(regions, stations));
        Ok(self.pricing())
    }

    /// Route between two locations, served from cache when possible.
    /// Returns the route and whether it was a cache hit.
    pub async fn resolve_route(
        &self,
        start: &str,
        end: &str,
    ) -> Result<(FetchedRoute, bool), RoutingError> {
        let key = route_cache_key(start, end);
        if let Some(route) = self.route_memory.get(&key) {
            debug!(route_hash = %key, "route served from memory");
            return Ok((route, true));
        }

        let ttl = chrono::Duration::days(self.config.route_cache_ttl_days);
        match persistence::route_cache::get_cached_route(self.db.pool(), &key, ttl).await {
            Ok(Some(stored)) => {
                debug!(route_hash = %key, "route served from database cache");
                self.route_memory
                    .insert_with_remaining(key, stored.route.clone(), stored.remaining(ttl));
                return Ok((stored.route, true));
            }
            Ok(None) => {}
            Err(err) => warn!(route_hash = %key, "route cache read failed: {}", err),
        }

        let route = self.routing.fetch_route(start, end).await?;
        info!(
            route_hash = %key,
            miles = route.total_distance_miles,
            points = route.geometry.len(),
            "route fetched from provider"
        );
        if let Err(err) =
            persistence::route_cache::save_route(self.db.pool(), &key, start, end, &route).await
        {
            warn!(route_hash = %key, "route cache write failed: {}", err);
        }
        self.route_memory.insert(key, route.clone());
        Ok((route, false))
    }

    /// Run the engine over `geometry` against the current pricing snapshot.
    pub fn plan(&self, geometry: &RouteGeometry, options: &PlanOptions) -> Result<PlanRun, PlanError> {
        let snapshot = self.pricing();
        let resolver = snapshot.resolver(self.config.price_strategy, &self.config.corridor);
        self.engine.run(geometry, options, resolver.as_ref())
    }
}
