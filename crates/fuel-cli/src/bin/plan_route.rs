//! Run the fuel planner locally over a GeoJSON route line.
//!
//! Usage:
//!   cargo run -p fuel-cli --bin plan_route -- route.geojson --reserve 100 --strategy corridor

use anyhow::{Context, Result};
use clap::Parser;
use fuel_cli::geojson::route_geometry_from_geojson;
use fuel_core::{FuelEngine, PlanOptions};
use fuel_server::config::{Config, PriceStrategy};
use fuel_server::persistence;
use fuel_server::state::PricingSnapshot;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan fuel stops along a GeoJSON route", long_about = None)]
struct Args {
    /// GeoJSON LineString, Feature or FeatureCollection
    route: PathBuf,

    /// Waypoint sampling interval in miles
    #[arg(long)]
    interval: Option<f64>,

    /// Remaining range that triggers a purchase decision, in miles
    #[arg(long)]
    reserve: Option<f64>,

    /// Price strategy: region or corridor
    #[arg(long)]
    strategy: Option<PriceStrategy>,

    /// SQLite database path (defaults to FUEL_DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// Include the per-waypoint tank trace in the output
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plan_route=info".parse()?)
                .add_directive("fuel_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let options = PlanOptions {
        waypoint_interval_miles: args.interval.unwrap_or(config.plan.waypoint_interval_miles),
        reserve_miles: args.reserve.unwrap_or(config.plan.reserve_miles),
    };
    let problems = options.validate();
    if !problems.is_empty() {
        anyhow::bail!("invalid options: {}", problems.join("; "));
    }
    let strategy = args.strategy.unwrap_or(config.price_strategy);

    let raw = std::fs::read_to_string(&args.route)
        .with_context(|| format!("reading {}", args.route.display()))?;
    let data: serde_json::Value = serde_json::from_str(&raw).context("parsing GeoJSON")?;
    let geometry = route_geometry_from_geojson(&data)?;

    let database = args.database.unwrap_or(config.database_path.clone());
    let db = persistence::init_database(&database, 1).await?;
    let snapshot = PricingSnapshot::new(
        persistence::regions::load_all_regions(db.pool()).await?,
        persistence::stations::load_all_stations(db.pool()).await?,
    );
    tracing::info!(
        regions = snapshot.regions().len(),
        stations = snapshot.stations().len(),
        strategy = strategy.as_str(),
        "pricing loaded"
    );

    let engine = FuelEngine::new(config.vehicle.clone());
    let resolver = snapshot.resolver(strategy, &config.corridor);
    let run = engine.run(&geometry, &options, resolver.as_ref())?;

    let mut output = json!({
        "plan": run.plan,
        "waypointsSampled": run.waypoints.len(),
        "routeMiles": run.waypoints.last().map_or(0.0, |wp| wp.cumulative_miles),
    });
    if args.trace {
        output["trace"] = run
            .trace
            .iter()
            .map(|reading| {
                json!({
                    "waypoint": reading.waypoint_index,
                    "mile": reading.mile,
                    "arrivalUnits": reading.arrival_units,
                    "departureUnits": reading.departure_units,
                })
            })
            .collect();
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
