//! Persistent cache of resolved routes.

use crate::routing::FetchedRoute;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use fuel_core::RouteGeometry;
use sqlx::SqlitePool;
use tracing::debug;

/// A cached route with the time it was first stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRoute {
    pub route: FetchedRoute,
    pub created_at: DateTime<Utc>,
}

impl StoredRoute {
    /// Lifetime left under `ttl`; zero once expired.
    pub fn remaining(&self, ttl: Duration) -> std::time::Duration {
        (self.created_at + ttl - Utc::now())
            .to_std()
            .unwrap_or_default()
    }
}

/// A cached route if one exists and is younger than `ttl`. Expired rows are deleted.
pub async fn get_cached_route(
    pool: &SqlitePool,
    route_hash: &str,
    ttl: Duration,
) -> Result<Option<StoredRoute>> {
    let row = sqlx::query_as::<_, RouteCacheRow>(
        "SELECT route_hash, geometry, total_distance, created_at FROM route_cache WHERE route_hash = ?1",
    )
    .bind(route_hash)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .ok();
    let Some(created_at) = created_at.filter(|created| Utc::now() - *created < ttl) else {
        debug!(route_hash, "dropping expired cached route");
        delete_route(pool, route_hash).await?;
        return Ok(None);
    };

    let geometry: RouteGeometry = serde_json::from_str(&row.geometry)?;
    Ok(Some(StoredRoute {
        route: FetchedRoute {
            geometry,
            total_distance_miles: row.total_distance,
        },
        created_at,
    }))
}

/// Store a resolved route, replacing any previous entry for the same key.
pub async fn save_route(
    pool: &SqlitePool,
    route_hash: &str,
    start: &str,
    end: &str,
    route: &FetchedRoute,
) -> Result<()> {
    save_route_at(pool, route_hash, start, end, route, Utc::now()).await
}

pub(crate) async fn save_route_at(
    pool: &SqlitePool,
    route_hash: &str,
    start: &str,
    end: &str,
    route: &FetchedRoute,
    created_at: DateTime<Utc>,
) -> Result<()> {
    let geometry_json = serde_json::to_string(&route.geometry)?;

    sqlx::query(
        r#"
        INSERT INTO route_cache (route_hash, start_location, end_location, geometry, total_distance, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(route_hash) DO UPDATE SET
            start_location = ?2, end_location = ?3, geometry = ?4,
            total_distance = ?5, created_at = ?6
        "#,
    )
    .bind(route_hash)
    .bind(start)
    .bind(end)
    .bind(&geometry_json)
    .bind(route.total_distance_miles)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_route(pool: &SqlitePool, route_hash: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM route_cache WHERE route_hash = ?1")
        .bind(route_hash)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct RouteCacheRow {
    #[allow(dead_code)]
    route_hash: String,
    geometry: String,
    total_distance: f64,
    created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    fn route() -> FetchedRoute {
        FetchedRoute {
            geometry: RouteGeometry::new(vec![[-104.99, 39.74], [-97.34, 37.69]]),
            total_distance_miles: 521.4,
        }
    }

    #[tokio::test]
    async fn fresh_routes_are_returned() {
        let db = init_database(":memory:", 1).await.unwrap();
        save_route(db.pool(), "abc", "Denver, CO", "Wichita, KS", &route())
            .await
            .unwrap();

        let cached = get_cached_route(db.pool(), "abc", Duration::days(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.route, route());
        assert!(get_cached_route(db.pool(), "missing", Duration::days(7))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn remaining_lifetime_counts_from_first_store() {
        let db = init_database(":memory:", 1).await.unwrap();
        let created = Utc::now() - Duration::days(6);
        save_route_at(db.pool(), "abc", "a", "b", &route(), created)
            .await
            .unwrap();

        let cached = get_cached_route(db.pool(), "abc", Duration::days(7))
            .await
            .unwrap()
            .unwrap();
        assert!((cached.created_at - created).num_milliseconds().abs() < 1);
        let left = cached.remaining(Duration::days(7));
        assert!(left <= std::time::Duration::from_secs(86_400));
        assert!(left > std::time::Duration::from_secs(86_000));
        assert_eq!(cached.remaining(Duration::days(5)), std::time::Duration::ZERO);
    }

    #[tokio::test]
    async fn expired_routes_are_deleted_on_read() {
        let db = init_database(":memory:", 1).await.unwrap();
        let old = Utc::now() - Duration::days(8);
        save_route_at(db.pool(), "abc", "a", "b", &route(), old)
            .await
            .unwrap();

        assert!(get_cached_route(db.pool(), "abc", Duration::days(7))
            .await
            .unwrap()
            .is_none());
        assert!(!delete_route(db.pool(), "abc").await.unwrap());
    }
}
