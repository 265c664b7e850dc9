//! Station geocoding state: which stations still need coordinates, and the
//! outcome of each attempt.

use anyhow::{bail, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodeStatus {
    Pending,
    Success,
    Failed,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeStatus::Pending => "pending",
            GeocodeStatus::Success => "success",
            GeocodeStatus::Failed => "failed",
        }
    }
}

impl FromStr for GeocodeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(GeocodeStatus::Pending),
            "success" => Ok(GeocodeStatus::Success),
            "failed" => Ok(GeocodeStatus::Failed),
            other => bail!("unknown geocode status '{}'", other),
        }
    }
}

/// A station awaiting coordinates.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GeocodeTarget {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub geocode_attempts: i64,
}

/// Which stations a geocoding run picks up.
#[derive(Debug, Clone, Default)]
pub struct GeocodeSelection {
    /// Previously failed stations instead of pending ones
    pub retry_failed: bool,
    /// Failed stations with this many attempts are left alone
    pub max_attempts: i64,
    pub region: Option<String>,
    pub limit: Option<i64>,
}

/// Result of one geocoding attempt for one station.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Located { id: i64, lat: f64, lng: f64 },
    Failed { id: i64, error: String },
}

/// Station counts per geocode status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeCounts {
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub pending: i64,
}

pub async fn stations_to_geocode(
    pool: &SqlitePool,
    selection: &GeocodeSelection,
) -> Result<Vec<GeocodeTarget>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, name, address, city, region, geocode_attempts FROM stations WHERE ",
    );
    if selection.retry_failed {
        query
            .push("geocode_status = 'failed' AND geocode_attempts < ")
            .push_bind(selection.max_attempts);
    } else {
        query.push("geocode_status = 'pending'");
    }
    if let Some(region) = &selection.region {
        query
            .push(" AND region = ")
            .push_bind(region.trim().to_uppercase());
    }
    query.push(" ORDER BY id");
    if let Some(limit) = selection.limit {
        query.push(" LIMIT ").push_bind(limit);
    }

    let targets = query
        .build_query_as::<GeocodeTarget>()
        .fetch_all(pool)
        .await?;
    Ok(targets)
}

/// Apply attempt outcomes in one transaction. Every outcome counts as an attempt.
pub async fn record_outcomes(pool: &SqlitePool, outcomes: &[GeocodeOutcome]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for outcome in outcomes {
        match outcome {
            GeocodeOutcome::Located { id, lat, lng } => {
                sqlx::query(
                    r#"
                    UPDATE stations SET
                        lat = ?2, lng = ?3,
                        geocode_status = 'success',
                        geocode_attempts = geocode_attempts + 1,
                        geocode_last_error = NULL,
                        geocoded_at = CURRENT_TIMESTAMP
                    WHERE id = ?1
                    "#,
                )
                .bind(id)
                .bind(lat)
                .bind(lng)
                .execute(&mut *tx)
                .await?;
            }
            GeocodeOutcome::Failed { id, error } => {
                sqlx::query(
                    r#"
                    UPDATE stations SET
                        geocode_status = 'failed',
                        geocode_attempts = geocode_attempts + 1,
                        geocode_last_error = ?2
                    WHERE id = ?1
                    "#,
                )
                .bind(id)
                .bind(error)
                .execute(&mut *tx)
                .await?;
            }
        }
    }
    tx.commit().await?;
    Ok(())
}

pub async fn status_counts(pool: &SqlitePool) -> Result<GeocodeCounts> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT geocode_status, COUNT(*) FROM stations GROUP BY geocode_status")
            .fetch_all(pool)
            .await?;

    let mut counts = GeocodeCounts::default();
    for (status, n) in rows {
        counts.total += n;
        match status.parse::<GeocodeStatus>() {
            Ok(GeocodeStatus::Success) => counts.success += n,
            Ok(GeocodeStatus::Failed) => counts.failed += n,
            Ok(GeocodeStatus::Pending) => counts.pending += n,
            Err(err) => tracing::warn!("{}", err),
        }
    }
    Ok(counts)
}

/// Failed stations per attempt count, fewest attempts first.
pub async fn failed_by_attempts(pool: &SqlitePool) -> Result<Vec<(i64, i64)>> {
    let rows = sqlx::query_as(
        "SELECT geocode_attempts, COUNT(*) FROM stations WHERE geocode_status = 'failed' \
         GROUP BY geocode_attempts ORDER BY geocode_attempts",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Most frequent failure messages, truncated to `width` characters.
pub async fn common_errors(pool: &SqlitePool, width: i64, limit: i64) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as(
        "SELECT substr(geocode_last_error, 1, ?1) AS error, COUNT(*) AS n FROM stations \
         WHERE geocode_status = 'failed' AND geocode_last_error IS NOT NULL \
         GROUP BY error ORDER BY n DESC, error ASC LIMIT ?2",
    )
    .bind(width)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::stations::{load_all_stations, upsert_stations};
    use crate::persistence::{init_database, StationRecord};
    use rust_decimal_macros::dec;

    fn record(opis_id: i64, region: &str) -> StationRecord {
        StationRecord {
            opis_id: Some(opis_id),
            name: format!("Stop {}", opis_id),
            address: "I-44, EXIT 283 & US-69".to_string(),
            city: "Big Cabin".to_string(),
            region: region.to_string(),
            price_per_unit: dec!(3.00),
            lat: None,
            lng: None,
        }
    }

    async fn seeded() -> crate::persistence::Database {
        let db = init_database(":memory:", 1).await.unwrap();
        upsert_stations(
            db.pool(),
            &[record(1, "OK"), record(2, "OK"), record(3, "KS")],
        )
        .await
        .unwrap();
        db
    }

    fn pending() -> GeocodeSelection {
        GeocodeSelection {
            max_attempts: 3,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn imported_stations_start_pending() {
        let db = seeded().await;
        let targets = stations_to_geocode(db.pool(), &pending()).await.unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].geocode_attempts, 0);

        let only_ks = GeocodeSelection {
            region: Some("ks".to_string()),
            ..pending()
        };
        let targets = stations_to_geocode(db.pool(), &only_ks).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].region, "KS");

        let limited = GeocodeSelection {
            limit: Some(2),
            ..pending()
        };
        assert_eq!(stations_to_geocode(db.pool(), &limited).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn located_stations_gain_coordinates() {
        let db = seeded().await;
        let ids: Vec<i64> = stations_to_geocode(db.pool(), &pending())
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();

        record_outcomes(
            db.pool(),
            &[
                GeocodeOutcome::Located { id: ids[0], lat: 36.54, lng: -95.22 },
                GeocodeOutcome::Failed { id: ids[1], error: "No match from Census Geocoder".into() },
            ],
        )
        .await
        .unwrap();

        let stations = load_all_stations(db.pool()).await.unwrap();
        assert_eq!(stations[0].location(), Some((36.54, -95.22)));
        assert!(!stations[1].location_known());

        let counts = status_counts(db.pool()).await.unwrap();
        assert_eq!(
            counts,
            GeocodeCounts { total: 3, success: 1, failed: 1, pending: 1 }
        );
        assert_eq!(failed_by_attempts(db.pool()).await.unwrap(), vec![(1, 1)]);
        assert_eq!(
            common_errors(db.pool(), 8, 5).await.unwrap(),
            vec![("No match".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let db = seeded().await;
        let id = stations_to_geocode(db.pool(), &pending()).await.unwrap()[0].id;
        let retry = GeocodeSelection {
            retry_failed: true,
            max_attempts: 2,
            ..Default::default()
        };

        let failure = [GeocodeOutcome::Failed { id, error: "timeout".into() }];
        record_outcomes(db.pool(), &failure).await.unwrap();
        assert_eq!(stations_to_geocode(db.pool(), &retry).await.unwrap().len(), 1);

        record_outcomes(db.pool(), &failure).await.unwrap();
        assert!(stations_to_geocode(db.pool(), &retry).await.unwrap().is_empty());
        assert_eq!(stations_to_geocode(db.pool(), &pending()).await.unwrap().len(), 2);
    }

    #[test]
    fn statuses_parse_from_storage_text() {
        for status in [GeocodeStatus::Pending, GeocodeStatus::Success, GeocodeStatus::Failed] {
            assert_eq!(status.as_str().parse::<GeocodeStatus>().unwrap(), status);
        }
        assert!("done".parse::<GeocodeStatus>().is_err());
    }
}
