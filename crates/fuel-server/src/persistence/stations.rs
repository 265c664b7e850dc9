//! Station price persistence.

use crate::persistence::geocoding::GeocodeStatus;
use anyhow::{Context, Result};
use fuel_core::Station;
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use std::str::FromStr;

/// A station as delivered by a price feed, before it has a database id.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub opis_id: Option<i64>,
    pub name: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub price_per_unit: Decimal,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

const UPSERT_STATION: &str = r#"
    INSERT INTO stations (opis_id, name, address, city, region, price_per_unit, lat, lng,
                          geocode_status, geocoded_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
            CASE WHEN ?9 = 'success' THEN CURRENT_TIMESTAMP END, CURRENT_TIMESTAMP)
    ON CONFLICT(opis_id) DO UPDATE SET
        name = ?2, address = ?3, city = ?4, region = ?5, price_per_unit = ?6,
        lat = COALESCE(?7, lat), lng = COALESCE(?8, lng),
        geocode_status = CASE WHEN ?9 = 'success' THEN 'success' ELSE geocode_status END,
        geocoded_at = CASE WHEN ?9 = 'success' THEN CURRENT_TIMESTAMP ELSE geocoded_at END,
        updated_at = CURRENT_TIMESTAMP
"#;

async fn upsert_in_tx(tx: &mut Transaction<'_, Sqlite>, record: &StationRecord) -> Result<()> {
    // Feed rows that already carry coordinates need no geocoding.
    let status = if record.lat.is_some() && record.lng.is_some() {
        GeocodeStatus::Success
    } else {
        GeocodeStatus::Pending
    };
    sqlx::query(UPSERT_STATION)
        .bind(record.opis_id)
        .bind(&record.name)
        .bind(&record.address)
        .bind(&record.city)
        .bind(record.region.trim().to_uppercase())
        .bind(record.price_per_unit.to_string())
        .bind(record.lat)
        .bind(record.lng)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Insert or update one station, matched on its feed id.
pub async fn upsert_station(pool: &SqlitePool, record: &StationRecord) -> Result<()> {
    let mut tx = pool.begin().await?;
    upsert_in_tx(&mut tx, record).await?;
    tx.commit().await?;
    Ok(())
}

/// Upsert a batch of stations in a single transaction.
pub async fn upsert_stations(pool: &SqlitePool, records: &[StationRecord]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    for record in records {
        upsert_in_tx(&mut tx, record)
            .await
            .with_context(|| format!("upserting station '{}'", record.name))?;
    }
    tx.commit().await?;
    Ok(records.len())
}

/// Load all stations from the database.
pub async fn load_all_stations(pool: &SqlitePool) -> Result<Vec<Station>> {
    let rows = sqlx::query_as::<_, StationRow>(
        "SELECT id, opis_id, name, address, city, region, price_per_unit, lat, lng FROM stations ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Station count per region, largest first.
pub async fn count_by_region(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT region, COUNT(*) AS n FROM stations GROUP BY region ORDER BY n DESC, region ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Feed ids already stored, used by loaders to tell inserts from updates.
pub async fn existing_opis_ids(pool: &SqlitePool) -> Result<HashSet<i64>> {
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT opis_id FROM stations WHERE opis_id IS NOT NULL")
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn clear_stations(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM stations").execute(pool).await?;
    Ok(result.rows_affected())
}

#[derive(sqlx::FromRow)]
struct StationRow {
    id: i64,
    opis_id: Option<i64>,
    name: String,
    address: String,
    city: String,
    region: String,
    price_per_unit: String,
    lat: Option<f64>,
    lng: Option<f64>,
}

impl TryFrom<StationRow> for Station {
    type Error = anyhow::Error;

    fn try_from(row: StationRow) -> Result<Self> {
        let price_per_unit = Decimal::from_str(&row.price_per_unit)
            .with_context(|| format!("station {} has bad price '{}'", row.id, row.price_per_unit))?;

        Ok(Station {
            id: row.id,
            opis_id: row.opis_id,
            name: row.name,
            address: row.address,
            city: row.city,
            region: row.region,
            price_per_unit,
            lat: row.lat,
            lng: row.lng,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use rust_decimal_macros::dec;

    fn record(opis_id: i64, region: &str, price: Decimal) -> StationRecord {
        StationRecord {
            opis_id: Some(opis_id),
            name: format!("Stop {}", opis_id),
            address: "I-70, EXIT 1".to_string(),
            city: "Limon".to_string(),
            region: region.to_string(),
            price_per_unit: price,
            lat: None,
            lng: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_price_by_feed_id() {
        let db = init_database(":memory:", 1).await.unwrap();
        upsert_station(db.pool(), &record(7, "co", dec!(3.459))).await.unwrap();
        upsert_station(db.pool(), &record(7, "CO", dec!(3.19900))).await.unwrap();

        let stations = load_all_stations(db.pool()).await.unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].region, "CO");
        assert_eq!(stations[0].price_per_unit, dec!(3.199));
        assert_eq!(stations[0].opis_id, Some(7));
    }

    #[tokio::test]
    async fn update_keeps_known_coordinates() {
        let db = init_database(":memory:", 1).await.unwrap();
        let mut located = record(1, "KS", dec!(3.00));
        located.lat = Some(38.9);
        located.lng = Some(-99.3);
        upsert_station(db.pool(), &located).await.unwrap();
        upsert_station(db.pool(), &record(1, "KS", dec!(2.90))).await.unwrap();

        let stations = load_all_stations(db.pool()).await.unwrap();
        assert_eq!(stations[0].location(), Some((38.9, -99.3)));
        assert_eq!(stations[0].price_per_unit, dec!(2.90));

        let (status,): (String,) = sqlx::query_as("SELECT geocode_status FROM stations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(status, "success");
    }

    #[tokio::test]
    async fn batch_upsert_and_count() {
        let db = init_database(":memory:", 1).await.unwrap();
        let records = vec![
            record(1, "KS", dec!(3.00)),
            record(2, "KS", dec!(3.10)),
            record(3, "CO", dec!(3.20)),
        ];
        assert_eq!(upsert_stations(db.pool(), &records).await.unwrap(), 3);

        let counts = count_by_region(db.pool()).await.unwrap();
        assert_eq!(counts, vec![("KS".to_string(), 2), ("CO".to_string(), 1)]);
        assert_eq!(existing_opis_ids(db.pool()).await.unwrap(), HashSet::from([1, 2, 3]));

        assert_eq!(clear_stations(db.pool()).await.unwrap(), 3);
        assert!(load_all_stations(db.pool()).await.unwrap().is_empty());
    }
}
