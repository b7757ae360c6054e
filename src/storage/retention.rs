use crate::storage::ReadingStore;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Delete readings older than `now - horizon`. Returns the number removed.
pub fn prune_once(store: &ReadingStore, horizon: ChronoDuration, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = now - horizon;
    let deleted = store.delete_older_than(cutoff)?;
    info!(deleted = deleted, cutoff = %cutoff, "Retention pass complete");
    Ok(deleted)
}

/// Prune immediately, then every `period`. Failures are logged and retried
/// on the next pass.
pub async fn run_retention_loop(store: Arc<ReadingStore>, horizon: ChronoDuration, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // First tick completes immediately
        ticker.tick().await;
        if let Err(e) = prune_once(&store, horizon, Utc::now()) {
            error!(error = %e, "Retention pass failed");
        }
    }
}
