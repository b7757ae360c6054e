use crate::api::auth_middleware::{require_access, AuthContext};
use crate::api::ApiError;
use crate::error::ControlError;
use crate::history::{self, BucketSize, HistoryQuery, HistoryResponse};
use crate::storage::ReadingStore;
use crate::vitals::{EntityId, Reading};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Shared state for history API
pub struct HistoryAppState {
    pub store: Arc<ReadingStore>,
    pub auth: AuthContext,
    /// Window used when `start` is omitted
    pub default_window_hours: i64,
}

/// Query parameters for reading history
#[derive(Deserialize)]
pub struct HistoryParams {
    /// ISO 8601 window start (default: `end` minus the default window)
    pub start: Option<String>,
    /// ISO 8601 window end (default: now)
    pub end: Option<String>,
    pub aggregate: Option<bool>,
    /// 5m, 30m, 2h or 1d
    pub bucket: Option<String>,
}

/// Query parameters for a recent-readings backfill
#[derive(Deserialize)]
pub struct RecentParams {
    /// ISO 8601 lower bound (default: 30 minutes ago)
    pub since: Option<String>,
    pub limit: Option<usize>,
}

/// Create history API router
pub fn create_history_router(state: Arc<HistoryAppState>) -> Router {
    Router::new()
        .route("/api/vitals/:entity_id/history", get(get_history))
        .route("/api/vitals/:entity_id/recent", get(get_recent))
        .route("/api/vitals/:entity_id/latest", get(get_latest))
        .with_state(state)
}

/// GET /api/vitals/:entity_id/history?start=T&end=T&aggregate=B&bucket=S
async fn get_history(
    State(state): State<Arc<HistoryAppState>>,
    headers: HeaderMap,
    Path(entity_id): Path<EntityId>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    require_access(&identity, entity_id)?;

    let query = build_query(entity_id, &params, state.default_window_hours, Utc::now())?;
    let response = history::execute(&state.store, &query)?;
    Ok(Json(response))
}

/// GET /api/vitals/:entity_id/recent?since=T&limit=N
async fn get_recent(
    State(state): State<Arc<HistoryAppState>>,
    headers: HeaderMap,
    Path(entity_id): Path<EntityId>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    require_access(&identity, entity_id)?;

    let since = match params.since.as_deref() {
        Some(s) => parse_timestamp("since", s)?,
        None => Utc::now() - Duration::minutes(30),
    };
    let readings = history::recent(&state.store, entity_id, since, params.limit)?;
    Ok(Json(readings))
}

/// GET /api/vitals/:entity_id/latest
async fn get_latest(
    State(state): State<Arc<HistoryAppState>>,
    headers: HeaderMap,
    Path(entity_id): Path<EntityId>,
) -> Result<Json<Reading>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    require_access(&identity, entity_id)?;

    let latest = state
        .store
        .latest(entity_id)
        .map_err(ControlError::Storage)?;
    latest
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no readings for entity {}", entity_id)))
}

fn parse_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, ControlError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ControlError::InvalidQuery(format!("invalid `{}` timestamp (expected ISO 8601)", name))
        })
}

/// Turn request parameters into a query; defaults are resolved against `now`
pub fn build_query(
    entity_id: EntityId,
    params: &HistoryParams,
    default_window_hours: i64,
    now: DateTime<Utc>,
) -> Result<HistoryQuery, ControlError> {
    let end = match params.end.as_deref() {
        Some(s) => parse_timestamp("end", s)?,
        None => now,
    };
    let start = match params.start.as_deref() {
        Some(s) => parse_timestamp("start", s)?,
        None => end - Duration::hours(default_window_hours),
    };
    let bucket = params
        .bucket
        .as_deref()
        .map(str::parse::<BucketSize>)
        .transpose()?;

    Ok(HistoryQuery {
        entity_id,
        start,
        end,
        aggregate: params.aggregate,
        bucket,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params(start: Option<&str>, end: Option<&str>, bucket: Option<&str>) -> HistoryParams {
        HistoryParams {
            start: start.map(String::from),
            end: end.map(String::from),
            aggregate: None,
            bucket: bucket.map(String::from),
        }
    }

    #[test]
    fn test_defaults_to_trailing_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let q = build_query(1, &params(None, None, None), 24, now).unwrap();
        assert_eq!(q.end, now);
        assert_eq!(q.start, now - Duration::hours(24));
        assert!(q.bucket.is_none());
    }

    #[test]
    fn test_explicit_window_and_bucket() {
        let now = Utc::now();
        let q = build_query(
            3,
            &params(Some("2026-03-01T00:00:00Z"), Some("2026-03-01T12:00:00+00:00"), Some("30m")),
            24,
            now,
        )
        .unwrap();
        assert_eq!(q.start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(q.end, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(q.bucket, Some(BucketSize::ThirtyMinutes));
    }

    #[test]
    fn test_invalid_inputs() {
        let now = Utc::now();
        assert!(matches!(
            build_query(1, &params(Some("yesterday"), None, None), 24, now),
            Err(ControlError::InvalidQuery(_))
        ));
        assert!(matches!(
            build_query(1, &params(None, None, Some("15m")), 24, now),
            Err(ControlError::InvalidQuery(_))
        ));
    }
}
