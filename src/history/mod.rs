//! Historical reading queries.
//!
//! A query window is served either as raw readings (short windows) or as
//! fixed-size buckets with per-channel avg/min/max. The bucket size is a
//! function of window length so the response size stays bounded.

use crate::error::ControlError;
use crate::storage::{BucketRow, ChannelAggregate, ReadingStore};
use crate::vitals::{EntityId, Reading};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::str::FromStr;


/// Most rows returned by a raw query
pub const MAX_RAW_POINTS: usize = 5000;

/// Most buckets a bucketed query may produce
pub const MAX_BUCKETS: i64 = 400;

/// Default row count for a recent-readings backfill (30 minutes at 5s)
pub const DEFAULT_RECENT_LIMIT: usize = 360;

/// Hard ceiling on a recent-readings backfill
pub const MAX_RECENT_LIMIT: usize = 1000;

/// Supported bucket widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BucketSize {
    FiveMinutes,
    ThirtyMinutes,
    TwoHours,
    OneDay,
}

impl BucketSize {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketSize::FiveMinutes => "5m",
            BucketSize::ThirtyMinutes => "30m",
            BucketSize::TwoHours => "2h",
            BucketSize::OneDay => "1d",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            BucketSize::FiveMinutes => Duration::minutes(5),
            BucketSize::ThirtyMinutes => Duration::minutes(30),
            BucketSize::TwoHours => Duration::hours(2),
            BucketSize::OneDay => Duration::days(1),
        }
    }
}

impl FromStr for BucketSize {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5m" => Ok(BucketSize::FiveMinutes),
            "30m" => Ok(BucketSize::ThirtyMinutes),
            "2h" => Ok(BucketSize::TwoHours),
            "1d" => Ok(BucketSize::OneDay),
            other => Err(ControlError::InvalidQuery(format!(
                "unsupported bucket '{}' (expected one of 5m, 30m, 2h, 1d)",
                other
            ))),
        }
    }
}

/// How a window is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Raw,
    Bucketed(BucketSize),
}

impl Resolution {
    /// Resolution implied by window length alone
    pub fn for_window(window: Duration) -> Self {
        if window <= Duration::hours(6) {
            Resolution::Raw
        } else if window <= Duration::hours(24) {
            Resolution::Bucketed(BucketSize::FiveMinutes)
        } else if window <= Duration::days(7) {
            Resolution::Bucketed(BucketSize::ThirtyMinutes)
        } else if window <= Duration::days(30) {
            Resolution::Bucketed(BucketSize::TwoHours)
        } else {
            Resolution::Bucketed(BucketSize::OneDay)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resolution::Raw => "raw",
            Resolution::Bucketed(size) => size.as_str(),
        }
    }
}

/// A validated-on-plan history request
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub entity_id: EntityId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `None` lets the window length decide
    pub aggregate: Option<bool>,
    pub bucket: Option<BucketSize>,
}

/// Outcome of planning a query. `start` is later than the requested start
/// when the window held more than [`MAX_BUCKETS`] buckets and was clamped
/// to the most recent ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPlan {
    pub resolution: Resolution,
    pub start: DateTime<Utc>,
}

impl QueryPlan {
    pub fn clamped(&self, query: &HistoryQuery) -> bool {
        self.start > query.start
    }
}

impl HistoryQuery {
    /// Decide the resolution, rejecting requests that would be unbounded
    pub fn plan(&self) -> Result<QueryPlan, ControlError> {
        if self.end <= self.start {
            return Err(ControlError::InvalidQuery(
                "end must be after start".to_string(),
            ));
        }
        let window = self.end - self.start;
        let implied = Resolution::for_window(window);

        let resolution = match (self.aggregate, self.bucket) {
            (Some(true), None) => {
                return Err(ControlError::InvalidQuery(
                    "bucket is required when aggregate=true".to_string(),
                ))
            }
            (Some(false), Some(_)) => {
                return Err(ControlError::InvalidQuery(
                    "bucket is only valid with aggregate=true".to_string(),
                ))
            }
            (Some(false), None) => {
                if implied != Resolution::Raw {
                    return Err(ControlError::InvalidQuery(
                        "raw readings are limited to windows of 6h or less".to_string(),
                    ));
                }
                Resolution::Raw
            }
            (None, None) => implied,
            (_, Some(requested)) => {
                if let Resolution::Bucketed(minimum) = implied {
                    if requested < minimum {
                        return Err(ControlError::InvalidQuery(format!(
                            "bucket {} is too fine for this window (minimum {})",
                            requested.as_str(),
                            minimum.as_str()
                        )));
                    }
                }
                Resolution::Bucketed(requested)
            }
        };

        let mut start = self.start;
        if let Resolution::Bucketed(size) = resolution {
            if bucket_count(window, size) > MAX_BUCKETS {
                start = self.end - size.duration() * MAX_BUCKETS as i32;
            }
        }

        Ok(QueryPlan { resolution, start })
    }
}

fn bucket_count(window: Duration, size: BucketSize) -> i64 {
    let window_ms = window.num_milliseconds();
    let size_ms = size.duration().num_milliseconds();
    (window_ms + size_ms - 1) / size_ms
}

/// Per-channel minimum and maximum, present only on aggregated points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extrema {
    pub heart_rate_min: f64,
    pub heart_rate_max: f64,
    pub bp_systolic_min: f64,
    pub bp_systolic_max: f64,
    pub bp_diastolic_min: f64,
    pub bp_diastolic_max: f64,
    pub spo2_min: f64,
    pub spo2_max: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
}

/// One point of a history response. Raw points carry the reading values;
/// aggregated points carry the bucket average in the same fields, plus
/// bucket bounds, counts and extrema. Empty buckets carry no channel values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_systolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_diastolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spo2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_anomaly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_count: Option<i64>,
    #[serde(flatten)]
    pub extrema: Option<Extrema>,
}

impl HistoryPoint {
    fn raw(reading: &Reading) -> Self {
        Self {
            timestamp: reading.recorded_at,
            bucket_end: None,
            count: None,
            heart_rate: Some(reading.heart_rate as f64),
            bp_systolic: Some(reading.bp_systolic as f64),
            bp_diastolic: Some(reading.bp_diastolic as f64),
            spo2: Some(reading.spo2),
            temperature: Some(reading.temperature),
            is_anomaly: Some(reading.is_anomaly),
            anomaly_count: None,
            extrema: None,
        }
    }

    fn empty_bucket(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            timestamp: start,
            bucket_end: Some(end),
            count: Some(0),
            heart_rate: None,
            bp_systolic: None,
            bp_diastolic: None,
            spo2: None,
            temperature: None,
            is_anomaly: None,
            anomaly_count: Some(0),
            extrema: None,
        }
    }

    fn bucket(start: DateTime<Utc>, end: DateTime<Utc>, row: &BucketRow) -> Self {
        let avg = |a: &ChannelAggregate| Some(round2(a.avg));
        Self {
            timestamp: start,
            bucket_end: Some(end),
            count: Some(row.count),
            heart_rate: avg(&row.heart_rate),
            bp_systolic: avg(&row.bp_systolic),
            bp_diastolic: avg(&row.bp_diastolic),
            spo2: avg(&row.spo2),
            temperature: avg(&row.temperature),
            is_anomaly: None,
            anomaly_count: Some(row.anomaly_count),
            extrema: Some(Extrema {
                heart_rate_min: row.heart_rate.min,
                heart_rate_max: row.heart_rate.max,
                bp_systolic_min: row.bp_systolic.min,
                bp_systolic_max: row.bp_systolic.max,
                bp_diastolic_min: row.bp_diastolic.min,
                bp_diastolic_max: row.bp_diastolic.max,
                spo2_min: row.spo2.min,
                spo2_max: row.spo2.max,
                temperature_min: row.temperature.min,
                temperature_max: row.temperature.max,
            }),
        }
    }
}

/// Averages keep two decimals; extrema are stored values and need no rounding
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub entity_id: EntityId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: &'static str,
    pub aggregated: bool,
    /// Raw: more rows existed than were returned. Bucketed: `start` was
    /// moved forward to keep the bucket count bounded.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    pub points: Vec<HistoryPoint>,
}

/// Plan and run a history query against the store
pub fn execute(store: &ReadingStore, query: &HistoryQuery) -> Result<HistoryResponse, ControlError> {
    let plan = query.plan()?;
    let resolution = plan.resolution;

    let (points, truncated) = match resolution {
        Resolution::Raw => {
            let mut readings =
                store.range(query.entity_id, query.start, query.end, MAX_RAW_POINTS + 1)?;
            let truncated = readings.len() > MAX_RAW_POINTS;
            readings.truncate(MAX_RAW_POINTS);
            (readings.iter().map(HistoryPoint::raw).collect(), truncated)
        }
        Resolution::Bucketed(size) => {
            let size_ms = size.duration().num_milliseconds();
            let rows = store.bucket_stats(query.entity_id, plan.start, query.end, size_ms)?;
            (
                fill_buckets(plan.start, query.end, size, &rows),
                plan.clamped(query),
            )
        }
    };

    Ok(HistoryResponse {
        entity_id: query.entity_id,
        start: plan.start,
        end: query.end,
        resolution: resolution.label(),
        aggregated: matches!(resolution, Resolution::Bucketed(_)),
        truncated,
        points,
    })
}

/// Readings recorded at or after `since`, oldest first. Used to seed a chart
/// or to backfill after a reconnect. `limit` defaults to
/// [`DEFAULT_RECENT_LIMIT`] and is capped at [`MAX_RECENT_LIMIT`].
pub fn recent(
    store: &ReadingStore,
    entity_id: EntityId,
    since: DateTime<Utc>,
    limit: Option<usize>,
) -> Result<Vec<Reading>, ControlError> {
    let limit = match limit {
        Some(0) => {
            return Err(ControlError::InvalidQuery(
                "limit must be at least 1".to_string(),
            ))
        }
        Some(n) => n.min(MAX_RECENT_LIMIT),
        None => DEFAULT_RECENT_LIMIT,
    };
    Ok(store.since(entity_id, since, limit)?)
}

/// Contiguous buckets covering `[start, end)`; the last one is cut at `end`
pub fn fill_buckets(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    size: BucketSize,
    rows: &[BucketRow],
) -> Vec<HistoryPoint> {
    let n = bucket_count(end - start, size);
    let mut rows = rows.iter().peekable();
    let mut points = Vec::with_capacity(n.max(0) as usize);

    for index in 0..n {
        let bucket_start = start + size.duration() * index as i32;
        let bucket_end = (bucket_start + size.duration()).min(end);

        while rows.peek().is_some_and(|r| r.index < index) {
            rows.next();
        }
        match rows.peek() {
            Some(row) if row.index == index => {
                points.push(HistoryPoint::bucket(bucket_start, bucket_end, row));
                rows.next();
            }
            _ => points.push(HistoryPoint::empty_bucket(bucket_start, bucket_end)),
        }
    }
    points
}
