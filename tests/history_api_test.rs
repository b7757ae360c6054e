// Integration tests for the history and latest-reading endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pulsesim::api::{create_history_router, AuthContext, HistoryAppState};
use pulsesim::auth::{Identity, IdentityRegistry};
use pulsesim::storage::ReadingStore;
use pulsesim::vitals::Reading;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const FAMILY_1: &str = "family-token-1";

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn reading(entity_id: u64, at: DateTime<Utc>, heart_rate: i64, is_anomaly: bool) -> Reading {
    Reading {
        entity_id,
        heart_rate,
        bp_systolic: 128,
        bp_diastolic: 78,
        spo2: 96.5,
        temperature: 36.7,
        is_anomaly,
        recorded_at: at,
    }
}

/// Entity 1 gets a reading every 5 minutes for 8 hours; every 10th is anomalous
fn seeded_store(dir: &TempDir) -> Arc<ReadingStore> {
    let store = ReadingStore::open(dir.path().join("readings.db")).unwrap();
    for i in 0..96 {
        let at = origin() + Duration::minutes(5 * i);
        store
            .append(&reading(1, at, 60 + i % 20, i % 10 == 0))
            .unwrap();
    }
    Arc::new(store)
}

fn make_router(store: Arc<ReadingStore>, auth_enabled: bool) -> Router {
    let registry = Arc::new(IdentityRegistry::new());
    registry.register(FAMILY_1, Identity::restricted(1));
    create_history_router(Arc::new(HistoryAppState {
        store,
        auth: AuthContext::new(registry, auth_enabled),
        default_window_hours: 24,
    }))
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn get_json(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(get_request(uri, token)).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_short_window_returns_raw_readings() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    let (status, body) = get_json(
        &app,
        "/api/vitals/1/history?start=2026-03-01T00:00:00Z&end=2026-03-01T01:00:00Z",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolution"], "raw");
    assert_eq!(body["aggregated"], false);
    assert!(body.get("truncated").is_none());

    // half-open window: the 01:00 reading is excluded
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 12);
    assert_eq!(points[0]["heart_rate"], 60.0);
    assert_eq!(points[0]["is_anomaly"], true);
    assert!(points[0].get("count").is_none());
}

#[tokio::test]
async fn test_long_window_is_bucketed() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    let (status, body) = get_json(
        &app,
        "/api/vitals/1/history?start=2026-03-01T00:00:00Z&end=2026-03-01T08:00:00Z&bucket=30m",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolution"], "30m");
    assert_eq!(body["aggregated"], true);

    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 16);
    let total: i64 = points.iter().map(|p| p["count"].as_i64().unwrap()).sum();
    assert_eq!(total, 96);

    let first = &points[0];
    assert_eq!(first["count"], 6);
    assert_eq!(first["heart_rate_min"], 60.0);
    assert_eq!(first["heart_rate_max"], 65.0);
    assert_eq!(first["anomaly_count"], 1);
}

#[tokio::test]
async fn test_empty_buckets_are_filled() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    // 8h of data inside a 12h window: the trailing buckets have no readings
    let (status, body) = get_json(
        &app,
        "/api/vitals/1/history?start=2026-03-01T00:00:00Z&end=2026-03-01T12:00:00Z",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolution"], "5m");
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 144);
    assert_eq!(points[143]["count"], 0);
    assert!(points[143].get("heart_rate").is_none());
}

#[tokio::test]
async fn test_invalid_queries_are_400() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    for uri in [
        "/api/vitals/1/history?start=2026-03-01T02:00:00Z&end=2026-03-01T01:00:00Z",
        "/api/vitals/1/history?start=2026-03-01T00:00:00Z&end=2026-03-01T08:00:00Z&bucket=15m",
        "/api/vitals/1/history?start=not-a-date",
        // finer than the 30m the 3-day window implies
        "/api/vitals/1/history?start=2026-03-01T00:00:00Z&end=2026-03-04T00:00:00Z&bucket=5m",
        // raw readings past the 6h raw tier
        "/api/vitals/1/history?start=2026-03-01T00:00:00Z&end=2026-03-01T12:00:00Z&aggregate=false",
        "/api/vitals/1/recent?since=2026-03-01T00:00:00Z&limit=0",
        "/api/vitals/1/recent?since=last-week",
    ] {
        let (status, body) = get_json(&app, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_month_scale_windows_use_day_buckets() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    let (status, body) = get_json(
        &app,
        "/api/vitals/1/history?start=2026-02-01T00:00:00Z&end=2026-03-13T00:00:00Z",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolution"], "1d");
    assert!(body.get("truncated").is_none());
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 40);
    // all 8 hours of data land in the 2026-03-01 bucket
    assert_eq!(points[28]["timestamp"], "2026-03-01T00:00:00Z");
    assert_eq!(points[28]["count"], 96);
}

#[tokio::test]
async fn test_recent_backfill() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    let (status, body) = get_json(
        &app,
        "/api/vitals/1/recent?since=2026-03-01T07:30:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let readings = body.as_array().unwrap();
    // 07:30 through 07:55 inclusive
    assert_eq!(readings.len(), 6);
    assert_eq!(readings[0]["heart_rate"], 60 + 90 % 20);
    assert_eq!(readings[5]["heart_rate"], 60 + 95 % 20);

    let (status, body) = get_json(
        &app,
        "/api/vitals/1/recent?since=2026-03-01T00:00:00Z&limit=4",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);
    assert_eq!(body[0]["heart_rate"], 60);
}

#[tokio::test]
async fn test_latest_reading() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), false);

    let (status, body) = get_json(&app, "/api/vitals/1/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity_id"], 1);
    assert_eq!(body["heart_rate"], 60 + 95 % 20);

    let (status, body) = get_json(&app, "/api/vitals/2/latest", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("entity 2"));
}

#[tokio::test]
async fn test_restricted_identity_only_reads_own_entity() {
    let dir = TempDir::new().unwrap();
    let app = make_router(seeded_store(&dir), true);

    let (status, _) = get_json(&app, "/api/vitals/1/latest", Some(FAMILY_1)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&app, "/api/vitals/2/history", Some(FAMILY_1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_json(&app, "/api/vitals/2/recent", Some(FAMILY_1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_json(&app, "/api/vitals/1/history", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
