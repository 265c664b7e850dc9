//! Geocode station addresses so the corridor price strategy has located
//! stations. Census batch geocoding first, then per-station free-text
//! fallbacks for whatever failed.
//!
//! Usage:
//!   cargo run -p fuel-cli --bin geocode_stations -- --state OK --limit 500

use anyhow::Result;
use clap::Parser;
use fuel_cli::geocode::{Geocoder, CENSUS_BATCH_URL, CENSUS_MAX_BATCH, NOMINATIM_URL};
use fuel_server::config::Config;
use fuel_server::persistence::geocoding::{self, GeocodeOutcome, GeocodeSelection, GeocodeTarget};
use fuel_server::persistence::{self, Database};
use std::time::Duration;
use tokio::time::sleep;

const CENSUS_PAUSE: Duration = Duration::from_secs(1);
const NOMINATIM_PAUSE: Duration = Duration::from_millis(1100);

#[derive(Parser, Debug)]
#[command(author, version, about = "Geocode fuel station addresses", long_about = None)]
struct Args {
    /// Stations per Census batch request (capped at 10,000)
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Only geocode stations in this state
    #[arg(long)]
    state: Option<String>,

    /// Stop after this many stations
    #[arg(long)]
    limit: Option<i64>,

    /// Retry stations that previously failed instead of pending ones
    #[arg(long)]
    retry_failed: bool,

    /// Attempts after which a failed station is left alone
    #[arg(long, default_value_t = 3)]
    max_attempts: i64,

    /// Skip the Census batch phase
    #[arg(long)]
    fallback_only: bool,

    #[arg(long, default_value = CENSUS_BATCH_URL)]
    census_url: String,

    #[arg(long, default_value = NOMINATIM_URL)]
    nominatim_url: String,

    /// SQLite database path (defaults to FUEL_DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("geocode_stations=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }
    let batch_size = args.batch_size.min(CENSUS_MAX_BATCH);
    let database = args
        .database
        .clone()
        .unwrap_or_else(|| Config::from_env().database_path);

    let db = persistence::init_database(&database, 1).await?;
    let geocoder = Geocoder::new(&args.census_url, &args.nominatim_url)?;

    let selection = GeocodeSelection {
        retry_failed: args.retry_failed,
        max_attempts: args.max_attempts,
        region: args.state.clone(),
        limit: args.limit,
    };
    let targets = geocoding::stations_to_geocode(db.pool(), &selection).await?;
    if targets.is_empty() {
        println!("No stations to geocode");
        return Ok(());
    }
    println!("Found {} stations to geocode", targets.len());

    let retry: Vec<GeocodeTarget> = if args.fallback_only {
        targets
            .into_iter()
            .filter(|t| t.geocode_attempts < args.max_attempts)
            .collect()
    } else {
        println!("\nPhase 1: Census batch geocoding");
        census_phase(&db, &geocoder, targets, batch_size, args.max_attempts).await?
    };

    if !retry.is_empty() {
        println!("\nPhase 2: fallback geocoding ({} stations)", retry.len());
        fallback_phase(&db, &geocoder, &retry).await?;
    }

    print_summary(&db).await
}

/// Run the batch phase; returns the stations that failed but may be retried.
async fn census_phase(
    db: &Database,
    geocoder: &Geocoder,
    targets: Vec<GeocodeTarget>,
    batch_size: usize,
    max_attempts: i64,
) -> Result<Vec<GeocodeTarget>> {
    println!(
        "Processing {} stations in batches of {}...",
        targets.len(),
        batch_size
    );

    let mut retry = Vec::new();
    let batches: Vec<&[GeocodeTarget]> = targets.chunks(batch_size).collect();
    for (n, batch) in batches.iter().enumerate() {
        let outcomes: Vec<GeocodeOutcome> = match geocoder.census_batch(batch).await {
            Ok(located) => batch
                .iter()
                .map(|t| match located.get(&t.id) {
                    Some(&(lat, lng)) => GeocodeOutcome::Located { id: t.id, lat, lng },
                    None => GeocodeOutcome::Failed {
                        id: t.id,
                        error: "No match from Census Geocoder".to_string(),
                    },
                })
                .collect(),
            Err(err) => {
                tracing::warn!(batch = n + 1, "census batch failed: {:#}", err);
                batch
                    .iter()
                    .map(|t| GeocodeOutcome::Failed {
                        id: t.id,
                        error: format!("Batch API error: {}", err),
                    })
                    .collect()
            }
        };
        geocoding::record_outcomes(db.pool(), &outcomes).await?;

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, GeocodeOutcome::Failed { .. }))
            .count();
        println!(
            "Batch {}: {} stations, located {}, failed {}",
            n + 1,
            batch.len(),
            batch.len() - failed,
            failed
        );

        for (target, outcome) in batch.iter().zip(&outcomes) {
            let attempts = target.geocode_attempts + 1;
            if matches!(outcome, GeocodeOutcome::Failed { .. }) && attempts < max_attempts {
                retry.push(GeocodeTarget {
                    geocode_attempts: attempts,
                    ..target.clone()
                });
            }
        }

        if n + 1 < batches.len() {
            sleep(CENSUS_PAUSE).await;
        }
    }
    Ok(retry)
}

async fn fallback_phase(db: &Database, geocoder: &Geocoder, targets: &[GeocodeTarget]) -> Result<()> {
    let (mut located, mut failed) = (0usize, 0usize);
    for (idx, target) in targets.iter().enumerate() {
        if (idx + 1) % 10 == 0 {
            println!(
                "Progress: {}/{} (located {} | failed {})",
                idx + 1,
                targets.len(),
                located,
                failed
            );
        }

        let outcome = match geocoder.fallback(target).await {
            Ok(Some(((lat, lng), strategy))) => {
                located += 1;
                tracing::debug!(station = target.id, strategy, "located by fallback");
                if located <= 5 {
                    println!(
                        "  located {}, {}, {} ({})",
                        target.name, target.city, target.region, strategy
                    );
                }
                GeocodeOutcome::Located { id: target.id, lat, lng }
            }
            Ok(None) => {
                failed += 1;
                GeocodeOutcome::Failed {
                    id: target.id,
                    error: "All fallback strategies failed".to_string(),
                }
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(station = target.id, "fallback geocoding error: {:#}", err);
                GeocodeOutcome::Failed {
                    id: target.id,
                    error: err.to_string(),
                }
            }
        };
        geocoding::record_outcomes(db.pool(), &[outcome]).await?;
        sleep(NOMINATIM_PAUSE).await;
    }

    println!("\nFallback complete: located {} | failed {}", located, failed);
    Ok(())
}

async fn print_summary(db: &Database) -> Result<()> {
    let counts = geocoding::status_counts(db.pool()).await?;
    let pct = |n: i64| {
        if counts.total == 0 {
            0.0
        } else {
            n as f64 * 100.0 / counts.total as f64
        }
    };

    println!("\n{}", "=".repeat(60));
    println!("GEOCODING STATUS SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total stations: {}", counts.total);
    println!("Success: {} ({:.1}%)", counts.success, pct(counts.success));

    if counts.failed > 0 {
        println!("Failed: {} ({:.1}%)", counts.failed, pct(counts.failed));
        println!("\n  Failed stations by attempts:");
        for (attempts, n) in geocoding::failed_by_attempts(db.pool()).await? {
            println!("    {} attempts: {} stations", attempts, n);
        }
    }
    if counts.pending > 0 {
        println!("Pending: {} ({:.1}%)", counts.pending, pct(counts.pending));
    }

    let errors = geocoding::common_errors(db.pool(), 50, 5).await?;
    if !errors.is_empty() {
        println!("\n  Common errors:");
        for (error, n) in errors {
            println!("    \"{}...\" ({}x)", error, n);
        }
    }
    Ok(())
}
