//! Scheduler module for running health probes and pruning old records.

mod retention;

pub use retention::*;

use crate::db::{DbError, HealthCheckRecord, Store};
use crate::probe::{run_health_checks, Catalog};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};

/// Orchestrates periodic probe rounds and record persistence.
pub struct Scheduler {
    store: Arc<Store>,
    catalog: Arc<Catalog>,
    client: reqwest::Client,
    interval: Duration,
    stop: Mutex<Option<broadcast::Sender<()>>>,
    record_tx: mpsc::Sender<HealthCheckRecord>,
    retention_manager: Arc<RetentionManager>,
}

impl Scheduler {
    /// Create a new scheduler. Must be called inside a tokio runtime.
    pub fn new(
        store: Arc<Store>,
        catalog: Arc<Catalog>,
        client: reqwest::Client,
        interval: Duration,
        retention_days: i64,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1000);

        let retention_manager = Arc::new(RetentionManager::new(store.clone(), retention_days));

        tokio::spawn(run_batch_writer(rx, store.clone()));

        Self {
            store,
            catalog,
            client,
            interval,
            stop: Mutex::new(None),
            record_tx: tx,
            retention_manager,
        }
    }

    /// Start the probe loop and the retention manager.
    pub async fn start(&self) {
        let mut stop = self.stop.lock().await;
        if stop.is_some() {
            return; // Already running
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        *stop = Some(stop_tx);
        drop(stop);

        tracing::info!(
            "Starting scheduler for {} endpoints every {:?}",
            self.catalog.endpoints().len(),
            self.interval
        );

        tokio::spawn(run_probe_loop(
            self.client.clone(),
            self.catalog.clone(),
            self.interval,
            self.record_tx.clone(),
            stop_rx,
        ));

        self.retention_manager.start();
    }

    /// Stop probing and pruning.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.stop.lock().await.take() {
            let _ = stop_tx.send(());
            tracing::info!("Scheduler stopped");
        }
        self.retention_manager.stop().await;
    }

    /// Run one probe round now and persist it before returning.
    pub async fn run_once(&self) -> Result<Vec<HealthCheckRecord>, DbError> {
        let records = run_health_checks(&self.client, &self.catalog).await;
        self.store.add_health_checks(&records)?;
        tracing::info!("Saved {} health checks", records.len());
        Ok(records)
    }
}

/// Probe all endpoints on every tick until stopped.
async fn run_probe_loop(
    client: reqwest::Client,
    catalog: Arc<Catalog>,
    interval_duration: Duration,
    tx: mpsc::Sender<HealthCheckRecord>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(interval_duration);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                // Jitter to avoid probing in lockstep with other monitors
                let jitter = rand::random::<u64>() % 100;
                tokio::time::sleep(Duration::from_millis(jitter)).await;

                for record in run_health_checks(&client, &catalog).await {
                    if tx.send(record).await.is_err() {
                        tracing::error!("Record writer closed, stopping probe loop");
                        return;
                    }
                }
            }
        }
    }
}

/// Accumulate records and flush them to the store in batches.
async fn run_batch_writer(mut rx: mpsc::Receiver<HealthCheckRecord>, store: Arc<Store>) {
    let mut buffer: Vec<HealthCheckRecord> = Vec::with_capacity(100);
    let mut interval = tokio::time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Some(r) => {
                        buffer.push(r);
                        if buffer.len() >= 500 {
                            flush_buffer(&store, &mut buffer);
                        }
                    }
                    None => {
                        // Channel closed, flush remaining and exit
                        flush_buffer(&store, &mut buffer);
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush_buffer(&store, &mut buffer);
            }
        }
    }
}

fn flush_buffer(store: &Store, buffer: &mut Vec<HealthCheckRecord>) {
    if buffer.is_empty() {
        return;
    }

    match store.add_health_checks(buffer) {
        Ok(()) => tracing::debug!("Flushed {} health checks", buffer.len()),
        Err(e) => tracing::error!("Failed to save health checks: {}", e),
    }

    buffer.clear();
}
