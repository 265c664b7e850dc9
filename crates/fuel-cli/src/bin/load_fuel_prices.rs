//! Import a retail price feed into the station store.
//!
//! Usage:
//!   cargo run -p fuel-cli --bin load_fuel_prices -- data/fuel-prices.csv --clear

use anyhow::{Context, Result};
use clap::Parser;
use fuel_cli::prices::{check_headers, parse_price_row, PriceRow, RowOutcome};
use fuel_server::config::Config;
use fuel_server::persistence::{self, Database, StationRecord};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load fuel prices from CSV into the database", long_about = None)]
struct Args {
    /// Path to the CSV file
    csv_file: PathBuf,

    /// Clear existing station data before importing
    #[arg(long)]
    clear: bool,

    /// Number of records written per transaction
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// SQLite database path (defaults to FUEL_DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,
}

#[derive(Debug, Default)]
struct ImportStats {
    processed: usize,
    created: usize,
    updated: usize,
    skipped: usize,
    errors: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("load_fuel_prices=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }
    let database = args.database.unwrap_or_else(|| Config::from_env().database_path);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&args.csv_file)
        .with_context(|| format!("CSV file not found: {}", args.csv_file.display()))?;
    check_headers(reader.headers()?.iter())?;

    let db = persistence::init_database(&database, 1).await?;
    let pool = db.pool();

    if args.clear {
        println!("Clearing existing fuel station data...");
        let deleted = persistence::stations::clear_stations(pool).await?;
        println!("Deleted {} existing fuel stations", deleted);
    }

    println!("Starting CSV import...");
    let mut known = persistence::stations::existing_opis_ids(pool).await?;
    let mut stats = ImportStats::default();
    let mut batch: Vec<StationRecord> = Vec::with_capacity(args.batch_size);

    for (idx, result) in reader.deserialize::<PriceRow>().enumerate() {
        let row_num = idx + 2;
        stats.processed += 1;

        let row = match result {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(row = row_num, "unreadable row: {}", err);
                stats.errors += 1;
                continue;
            }
        };

        match parse_price_row(&row) {
            RowOutcome::Station(record) => {
                if let Some(id) = record.opis_id {
                    if known.insert(id) {
                        stats.created += 1;
                    } else {
                        stats.updated += 1;
                    }
                }
                batch.push(record);
            }
            RowOutcome::Skipped(reason) => {
                tracing::debug!(row = row_num, "skipped: {}", reason);
                stats.skipped += 1;
            }
            RowOutcome::Error(reason) => {
                tracing::warn!(row = row_num, "{}", reason);
                stats.errors += 1;
            }
        }

        if batch.len() >= args.batch_size {
            flush(&db, &mut batch).await?;
            println!("Processed {} rows...", stats.processed);
        }
    }
    flush(&db, &mut batch).await?;

    let stations = persistence::stations::load_all_stations(pool).await?;
    let without_coords = stations.iter().filter(|s| !s.location_known()).count();

    println!("\nImport completed!");
    println!("  Total rows processed: {}", stats.processed);
    println!("  Stations created: {}", stats.created);
    println!("  Stations updated: {}", stats.updated);
    println!("  Rows skipped: {}", stats.skipped);
    println!("  Errors: {}", stats.errors);
    println!("  Total stations in database: {}", stations.len());
    if without_coords > 0 {
        println!("  Stations without coordinates: {}", without_coords);
    }

    let by_region = persistence::stations::count_by_region(pool).await?;
    if !by_region.is_empty() {
        println!("\n  Stations by region:");
        for (region, n) in by_region.iter().take(10) {
            println!("    {}: {}", region, n);
        }
    }
    Ok(())
}

async fn flush(db: &Database, batch: &mut Vec<StationRecord>) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    persistence::stations::upsert_stations(db.pool(), batch).await?;
    batch.clear();
    Ok(())
}
