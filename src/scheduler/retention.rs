//! Retention manager for cleaning up old health checks.

use crate::db::{DbError, Store};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Handle to a running retention loop.
struct Running {
    stop_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Manager for deleting records past the retention period.
pub struct RetentionManager {
    store: Arc<Store>,
    retention_days: i64,
    running: Mutex<Option<Running>>,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>, retention_days: i64) -> Self {
        Self {
            store,
            retention_days,
            running: Mutex::new(None),
        }
    }

    /// Start the retention manager background task. Does nothing if already running.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return;
        }

        // Subscribe before spawning so a stop sent right away is not lost.
        let (stop_tx, mut rx) = broadcast::channel(1);
        let store = self.store.clone();
        let retention_days = self.retention_days;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = process_retention(&store, retention_days, Utc::now()) {
                            tracing::error!("RetentionManager: Failed to delete old health checks: {}", e);
                        }
                    }
                }
            }
        });

        *running = Some(Running { stop_tx, handle });
    }

    /// Stop the retention manager and wait for its task to finish.
    pub async fn stop(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(Running { stop_tx, handle }) = running {
            let _ = stop_tx.send(());
            if let Err(e) = handle.await {
                tracing::error!("RetentionManager: task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

/// Delete every record older than `retention_days` before `now`.
pub fn process_retention(
    store: &Store,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<usize, DbError> {
    let cutoff = now - ChronoDuration::days(retention_days);
    let deleted = store.delete_health_checks_before(cutoff)?;
    if deleted > 0 {
        tracing::info!("RetentionManager: Deleted {} health checks before {}", deleted, cutoff);
    }
    Ok(deleted)
}
