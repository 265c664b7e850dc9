//! Import region boundaries from a GeoJSON feature collection.
//!
//! Usage:
//!   cargo run -p fuel-cli --bin load_regions -- data/us-states.json --clear

use anyhow::{Context, Result};
use clap::Parser;
use fuel_cli::geojson::regions_from_geojson;
use fuel_server::config::Config;
use fuel_server::persistence;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load region boundaries from GeoJSON into the database", long_about = None)]
struct Args {
    /// Path to the GeoJSON feature collection
    path: PathBuf,

    /// Clear existing regions before importing
    #[arg(long)]
    clear: bool,

    /// SQLite database path (defaults to FUEL_DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("load_regions=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let database = args.database.unwrap_or_else(|| Config::from_env().database_path);

    let raw = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&raw).context("parsing GeoJSON")?;
    let import = regions_from_geojson(&data)?;

    let db = persistence::init_database(&database, 1).await?;
    let pool = db.pool();

    if args.clear {
        let deleted = persistence::regions::clear_regions(pool).await?;
        println!("Cleared {} existing regions.", deleted);
    }

    let existing: Vec<String> = persistence::regions::load_all_regions(pool)
        .await?
        .into_iter()
        .map(|region| region.code)
        .collect();

    let (mut created, mut updated) = (0usize, 0usize);
    for region in &import.regions {
        persistence::regions::upsert_region(pool, region)
            .await
            .with_context(|| format!("saving region {}", region.code))?;
        if existing.contains(&region.code) {
            updated += 1;
        } else {
            created += 1;
        }
        tracing::debug!(code = %region.code, polygons = region.polygons().len(), "region saved");
    }

    println!(
        "Done. created={}, updated={}, skipped={}",
        created, updated, import.skipped
    );
    Ok(())
}
