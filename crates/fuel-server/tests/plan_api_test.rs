//! Live API tests against a running server.
//!
//! Run with: cargo test --test plan_api_test -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("FUEL_TEST_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

#[tokio::test]
#[ignore]
async fn test_health() {
    let resp = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("server reachable");
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
#[ignore]
async fn test_plan_geometry() {
    let body = json!({
        "geometry": {
            "type": "LineString",
            "coordinates": [[-104.99, 39.74], [-101.0, 39.3], [-97.34, 37.69], [-94.58, 39.10]]
        },
        "reserveMiles": 120.0
    });

    let resp = Client::new()
        .post(format!("{}/api/v1/plan", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "plan should succeed");

    let plan: Value = resp.json().await.unwrap();
    assert!(plan["plan"]["regionsTraversed"].is_array());
    assert!(plan["plan"]["assumptions"]["tankCapacityUnits"].is_number());
    assert!(plan["waypointsSampled"].as_u64().unwrap() >= 2);
}

/// Needs OPEN_ROUTE_API_KEY on the server.
#[tokio::test]
#[ignore]
async fn test_optimize_route_and_cache() {
    let client = Client::new();
    let body = json!({ "start": "Denver, CO", "end": "Kansas City, MO" });

    let first: Value = client
        .post(format!("{}/api/v1/route/optimize", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first["summary"]["totalDistanceMiles"].as_f64().unwrap() > 500.0);

    let second: Value = client
        .post(format!("{}/api/v1/route/optimize", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["cacheHit"], true);
    assert_eq!(first["summary"], second["summary"]);
}

#[tokio::test]
#[ignore]
async fn test_station_summary() {
    let summary: Value = Client::new()
        .get(format!("{}/api/v1/stations/summary", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(summary["totalStations"].is_number());
    assert!(summary["byRegion"].is_array());
}
