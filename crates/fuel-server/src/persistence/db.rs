//! Database connection and schema setup.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

const INIT_MIGRATION: &str = include_str!("../../migrations/001_init.sql");

/// Database connection wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Clear all persisted state (cached routes, stations, regions).
pub async fn clear_all(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for table in ["route_cache", "stations", "regions"] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Open (creating if needed) the SQLite database at `db_path` and apply the schema.
///
/// `":memory:"` gives a private in-memory database per connection, so callers
/// should pair it with `max_connections = 1`.
pub async fn init_database(db_path: &str, max_connections: u32) -> Result<Database> {
    let db_url = if db_path == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
        format!("sqlite:{}?mode=rwc", db_path)
    };

    info!(path = db_path, max_connections, "opening station database");
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(&db_url)
        .await
        .with_context(|| format!("connecting to {}", db_url))?;

    run_migrations(&pool).await?;
    Ok(Database { pool })
}

/// Statements of a migration script, comments stripped.
fn migration_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let statements = migration_statements(INIT_MIGRATION);
    for statement in &statements {
        if let Err(e) = sqlx::query(statement).execute(pool).await {
            if e.to_string().contains("already exists") {
                continue;
            }
            if statement.to_uppercase().starts_with("CREATE") {
                anyhow::bail!("Migration failed on CREATE statement: {}", e);
            }
            warn!("Migration statement failed: {}", e);
        }
    }

    ensure_station_geocode_columns(pool).await?;

    info!(statements = statements.len(), "database schema ready");
    Ok(())
}

/// Bring a `stations` table created before geocoding tracking up to date.
async fn ensure_station_geocode_columns(pool: &SqlitePool) -> Result<()> {
    let rows = sqlx::query("PRAGMA table_info(stations)")
        .fetch_all(pool)
        .await?;
    if rows.is_empty() {
        return Ok(());
    }

    let mut columns = HashSet::new();
    for row in rows {
        let name: String = row.try_get("name")?;
        columns.insert(name);
    }

    let wanted = [
        ("geocode_status", "TEXT NOT NULL DEFAULT 'pending'"),
        ("geocode_attempts", "INTEGER NOT NULL DEFAULT 0"),
        ("geocode_last_error", "TEXT"),
        ("geocoded_at", "TEXT"),
    ];
    for (name, definition) in wanted {
        if columns.contains(name) {
            continue;
        }
        let statement = format!("ALTER TABLE stations ADD COLUMN {} {}", name, definition);
        if let Err(err) = sqlx::query(&statement).execute(pool).await {
            if err.to_string().contains("duplicate column") {
                continue;
            }
            return Err(err.into());
        }
        info!(column = name, "added stations column");
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stations_geocode_status ON stations(geocode_status)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_script_splits_into_statements() {
        let statements = migration_statements(INIT_MIGRATION);
        assert!(statements.iter().all(|s| !s.starts_with("--")));
        assert!(statements
            .iter()
            .any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS route_cache")));
    }

    #[tokio::test]
    async fn init_creates_tables() {
        let db = init_database(":memory:", 1).await.unwrap();

        for table in ["stations", "regions", "route_cache"] {
            let result: (i32,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            )
            .bind(table)
            .fetch_one(db.pool())
            .await
            .unwrap();
            assert_eq!(result.0, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn older_stations_table_gains_geocode_columns() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE stations (id INTEGER PRIMARY KEY AUTOINCREMENT, opis_id INTEGER UNIQUE, \
             name TEXT NOT NULL, address TEXT NOT NULL DEFAULT '', city TEXT NOT NULL DEFAULT '', \
             region TEXT NOT NULL, price_per_unit TEXT NOT NULL, lat REAL, lng REAL, \
             updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO stations (name, region, price_per_unit) VALUES ('Old Stop', 'KS', '3.1')")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let (status, attempts): (String, i64) =
            sqlx::query_as("SELECT geocode_status, geocode_attempts FROM stations")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "pending");
        assert_eq!(attempts, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = init_database(":memory:", 1).await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        clear_all(db.pool()).await.unwrap();
    }
}
