//! Durable reading sink backed by SQLite.
//!
//! Readings are append-only. Timestamps are stored as integer epoch
//! milliseconds so range scans and bucketing stay in SQL.

use crate::vitals::{EntityId, Reading};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Average, minimum and maximum of one channel within a bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelAggregate {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// One non-empty bucket as returned by SQL
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRow {
    /// Zero-based bucket index from the window start
    pub index: i64,
    pub count: i64,
    pub heart_rate: ChannelAggregate,
    pub bp_systolic: ChannelAggregate,
    pub bp_diastolic: ChannelAggregate,
    pub spo2: ChannelAggregate,
    pub temperature: ChannelAggregate,
    pub anomaly_count: i64,
}

/// SQLite reading store.
///
/// # Schema
/// ```sql
/// CREATE TABLE readings (
///     id INTEGER PRIMARY KEY,
///     entity_id INTEGER NOT NULL,
///     heart_rate INTEGER NOT NULL,
///     bp_systolic INTEGER NOT NULL,
///     bp_diastolic INTEGER NOT NULL,
///     spo2 REAL NOT NULL,
///     temperature REAL NOT NULL,
///     is_anomaly INTEGER NOT NULL,
///     recorded_at INTEGER NOT NULL   -- epoch millis, wall clock
/// );
/// ```
pub struct ReadingStore {
    conn: Mutex<Connection>,
}

impl ReadingStore {
    /// Creates or opens a store at `db_path`
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open reading database")?;
        Self::init(conn)
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY,
                entity_id INTEGER NOT NULL,
                heart_rate INTEGER NOT NULL,
                bp_systolic INTEGER NOT NULL,
                bp_diastolic INTEGER NOT NULL,
                spo2 REAL NOT NULL,
                temperature REAL NOT NULL,
                is_anomaly INTEGER NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_readings_entity_time
                ON readings(entity_id, recorded_at);
            CREATE INDEX IF NOT EXISTS idx_readings_time
                ON readings(recorded_at);
            "#,
        )
        .context("Failed to create readings schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, reading: &Reading) -> Result<()> {
        self.conn()
            .execute(
                r#"
                INSERT INTO readings (
                    entity_id, heart_rate, bp_systolic, bp_diastolic,
                    spo2, temperature, is_anomaly, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    reading.entity_id as i64,
                    reading.heart_rate,
                    reading.bp_systolic,
                    reading.bp_diastolic,
                    reading.spo2,
                    reading.temperature,
                    reading.is_anomaly,
                    reading.recorded_at.timestamp_millis(),
                ],
            )
            .with_context(|| format!("Failed to store reading for entity {}", reading.entity_id))?;
        Ok(())
    }

    /// Delete every reading recorded strictly before `cutoff`
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM readings WHERE recorded_at < ?1",
                params![cutoff.timestamp_millis()],
            )
            .context("Failed to delete expired readings")?;
        Ok(deleted)
    }

    /// Readings in `[from, to)`, oldest first, at most `limit` rows
    pub fn range(
        &self,
        entity_id: EntityId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reading>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT entity_id, heart_rate, bp_systolic, bp_diastolic,
                       spo2, temperature, is_anomaly, recorded_at
                FROM readings
                WHERE entity_id = ?1 AND recorded_at >= ?2 AND recorded_at < ?3
                ORDER BY recorded_at ASC, id ASC
                LIMIT ?4
                "#,
            )
            .context("Failed to prepare range query")?;

        let rows = stmt
            .query_map(
                params![
                    entity_id as i64,
                    from.timestamp_millis(),
                    to.timestamp_millis(),
                    limit as i64
                ],
                row_to_reading,
            )
            .context("Failed to execute range query")?;

        let readings = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read reading row")?;
        Ok(readings)
    }

    /// Readings at or after `from`, oldest first, with no upper bound
    pub fn since(
        &self,
        entity_id: EntityId,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reading>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT entity_id, heart_rate, bp_systolic, bp_diastolic,
                       spo2, temperature, is_anomaly, recorded_at
                FROM readings
                WHERE entity_id = ?1 AND recorded_at >= ?2
                ORDER BY recorded_at ASC, id ASC
                LIMIT ?3
                "#,
            )
            .context("Failed to prepare since query")?;

        let rows = stmt
            .query_map(
                params![entity_id as i64, from.timestamp_millis(), limit as i64],
                row_to_reading,
            )
            .context("Failed to execute since query")?;

        let readings = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read reading row")?;
        Ok(readings)
    }

    /// Most recent reading for an entity
    pub fn latest(&self, entity_id: EntityId) -> Result<Option<Reading>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT entity_id, heart_rate, bp_systolic, bp_diastolic,
                       spo2, temperature, is_anomaly, recorded_at
                FROM readings
                WHERE entity_id = ?1
                ORDER BY recorded_at DESC, id DESC
                LIMIT 1
                "#,
            )
            .context("Failed to prepare latest query")?;

        let mut rows = stmt
            .query_map(params![entity_id as i64], row_to_reading)
            .context("Failed to execute latest query")?;

        let latest = rows
            .next()
            .transpose()
            .context("Failed to read reading row")?;
        Ok(latest)
    }

    /// Per-bucket aggregates over `[from, to)`; only non-empty buckets are returned
    pub fn bucket_stats(
        &self,
        entity_id: EntityId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket_ms: i64,
    ) -> Result<Vec<BucketRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT (recorded_at - ?2) / ?4 AS bucket,
                       COUNT(*),
                       AVG(heart_rate), MIN(heart_rate), MAX(heart_rate),
                       AVG(bp_systolic), MIN(bp_systolic), MAX(bp_systolic),
                       AVG(bp_diastolic), MIN(bp_diastolic), MAX(bp_diastolic),
                       AVG(spo2), MIN(spo2), MAX(spo2),
                       AVG(temperature), MIN(temperature), MAX(temperature),
                       SUM(is_anomaly)
                FROM readings
                WHERE entity_id = ?1 AND recorded_at >= ?2 AND recorded_at < ?3
                GROUP BY bucket
                ORDER BY bucket ASC
                "#,
            )
            .context("Failed to prepare bucket query")?;

        let rows = stmt
            .query_map(
                params![
                    entity_id as i64,
                    from.timestamp_millis(),
                    to.timestamp_millis(),
                    bucket_ms
                ],
                |row| {
                    Ok(BucketRow {
                        index: row.get(0)?,
                        count: row.get(1)?,
                        heart_rate: aggregate_at(row, 2)?,
                        bp_systolic: aggregate_at(row, 5)?,
                        bp_diastolic: aggregate_at(row, 8)?,
                        spo2: aggregate_at(row, 11)?,
                        temperature: aggregate_at(row, 14)?,
                        anomaly_count: row.get(17)?,
                    })
                },
            )
            .context("Failed to execute bucket query")?;

        let buckets = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read bucket row")?;
        Ok(buckets)
    }

    pub fn count(&self, entity_id: EntityId) -> Result<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM readings WHERE entity_id = ?1",
                params![entity_id as i64],
                |row| row.get(0),
            )
            .context("Failed to count readings")
    }
}

fn aggregate_at(row: &Row<'_>, start: usize) -> rusqlite::Result<ChannelAggregate> {
    Ok(ChannelAggregate {
        avg: row.get(start)?,
        min: row.get(start + 1)?,
        max: row.get(start + 2)?,
    })
}

fn row_to_reading(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let entity_id: i64 = row.get(0)?;
    let recorded_ms: i64 = row.get(7)?;
    let recorded_at = DateTime::from_timestamp_millis(recorded_ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(7, recorded_ms))?;

    Ok(Reading {
        entity_id: entity_id as EntityId,
        heart_rate: row.get(1)?,
        bp_systolic: row.get(2)?,
        bp_diastolic: row.get(3)?,
        spo2: row.get(4)?,
        temperature: row.get(5)?,
        is_anomaly: row.get(6)?,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn reading(entity_id: EntityId, heart_rate: i64, at: DateTime<Utc>) -> Reading {
        Reading {
            entity_id,
            heart_rate,
            bp_systolic: 120 + heart_rate / 10,
            bp_diastolic: 80,
            spo2: 96.5,
            temperature: 36.6,
            is_anomaly: heart_rate > 100,
            recorded_at: at,
        }
    }

    #[test]
    fn test_append_and_range_roundtrip() {
        let store = ReadingStore::in_memory().unwrap();
        let r = reading(1, 72, t0() + Duration::milliseconds(1234));
        store.append(&r).unwrap();

        let rows = store.range(1, t0(), t0() + Duration::hours(1), 100).unwrap();
        assert_eq!(rows, vec![r]);
    }

    #[test]
    fn test_range_is_half_open_ordered_and_limited() {
        let store = ReadingStore::in_memory().unwrap();
        for i in (0..10).rev() {
            store.append(&reading(1, 60 + i, t0() + Duration::minutes(i))).unwrap();
        }
        store.append(&reading(2, 99, t0())).unwrap();

        let rows = store.range(1, t0(), t0() + Duration::minutes(5), 100).unwrap();
        let hrs: Vec<i64> = rows.iter().map(|r| r.heart_rate).collect();
        assert_eq!(hrs, vec![60, 61, 62, 63, 64]);

        let limited = store.range(1, t0(), t0() + Duration::hours(1), 3).unwrap();
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].heart_rate, 60);
    }

    #[test]
    fn test_since_includes_lower_bound_and_is_unbounded_above() {
        let store = ReadingStore::in_memory().unwrap();
        for i in 0..6 {
            store.append(&reading(1, 60 + i, t0() + Duration::minutes(i))).unwrap();
        }
        store.append(&reading(1, 99, t0() + Duration::days(2))).unwrap();

        let rows = store.since(1, t0() + Duration::minutes(4), 100).unwrap();
        let hrs: Vec<i64> = rows.iter().map(|r| r.heart_rate).collect();
        assert_eq!(hrs, vec![64, 65, 99]);

        let limited = store.since(1, t0(), 2).unwrap();
        assert_eq!(limited.iter().map(|r| r.heart_rate).collect::<Vec<_>>(), vec![60, 61]);
    }

    #[test]
    fn test_latest() {
        let store = ReadingStore::in_memory().unwrap();
        assert!(store.latest(3).unwrap().is_none());

        store.append(&reading(3, 70, t0())).unwrap();
        store.append(&reading(3, 75, t0() + Duration::seconds(5))).unwrap();
        store.append(&reading(4, 90, t0() + Duration::seconds(10))).unwrap();

        assert_eq!(store.latest(3).unwrap().unwrap().heart_rate, 75);
    }

    #[test]
    fn test_delete_older_than() {
        let store = ReadingStore::in_memory().unwrap();
        store.append(&reading(1, 70, t0() - Duration::days(31))).unwrap();
        store.append(&reading(1, 71, t0() - Duration::days(29))).unwrap();

        let deleted = store.delete_older_than(t0() - Duration::days(30)).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count(1).unwrap(), 1);
    }

    #[test]
    fn test_bucket_stats() {
        let store = ReadingStore::in_memory().unwrap();
        // two readings in bucket 0, one in bucket 2
        store.append(&reading(1, 60, t0())).unwrap();
        store.append(&reading(1, 80, t0() + Duration::minutes(3))).unwrap();
        store.append(&reading(1, 120, t0() + Duration::minutes(11))).unwrap();

        let rows = store
            .bucket_stats(1, t0(), t0() + Duration::minutes(15), 5 * 60 * 1000)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].heart_rate, ChannelAggregate { avg: 70.0, min: 60.0, max: 80.0 });
        assert_eq!(rows[0].anomaly_count, 0);
        assert_eq!(rows[1].index, 2);
        assert_eq!(rows[1].anomaly_count, 1);
    }

    #[test]
    fn test_reopen_file_keeps_readings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.db");

        {
            let store = ReadingStore::open(&path).unwrap();
            store.append(&reading(6, 66, t0())).unwrap();
        }

        let store = ReadingStore::open(&path).unwrap();
        assert_eq!(store.count(6).unwrap(), 1);
    }
}
