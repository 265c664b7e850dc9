//! Region boundary persistence.

use anyhow::{Context, Result};
use fuel_core::regions::Polygon;
use fuel_core::Region;
use sqlx::SqlitePool;

/// Insert or replace a region's boundary, keyed by code.
pub async fn upsert_region(pool: &SqlitePool, region: &Region) -> Result<()> {
    let polygons_json = serde_json::to_string(region.polygons())?;

    sqlx::query(
        r#"
        INSERT INTO regions (code, name, polygons)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(code) DO UPDATE SET name = ?2, polygons = ?3
        "#,
    )
    .bind(&region.code)
    .bind(&region.name)
    .bind(&polygons_json)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_all_regions(pool: &SqlitePool) -> Result<Vec<Region>> {
    let rows = sqlx::query_as::<_, RegionRow>("SELECT code, name, polygons FROM regions ORDER BY code")
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

pub async fn clear_regions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM regions").execute(pool).await?;
    Ok(result.rows_affected())
}

#[derive(sqlx::FromRow)]
struct RegionRow {
    code: String,
    name: String,
    polygons: String,
}

impl TryFrom<RegionRow> for Region {
    type Error = anyhow::Error;

    fn try_from(row: RegionRow) -> Result<Self> {
        let polygons: Vec<Polygon> = serde_json::from_str(&row.polygons)
            .with_context(|| format!("region {} has malformed polygons", row.code))?;
        Ok(Region::new(row.code, row.name, polygons))
    }
}
