//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

/// A row as read from SQLite, before validation.
struct RawRow {
    id: i64,
    endpoint: String,
    timestamp: String,
    is_healthy: bool,
    response_time: i64,
    status_code: i32,
    error_message: Option<String>,
    response_data: Option<String>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Create a store backed by a private in-memory database.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    // --- Health checks ---

    /// Add health check records in batch.
    pub fn add_health_checks(&self, records: &[HealthCheckRecord]) -> Result<(), DbError> {
        if records.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO health_checks (endpoint, timestamp, is_healthy, response_time, status_code, error_message, response_data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for r in records {
                let response_data = r
                    .response_data
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                stmt.execute(params![
                    r.endpoint,
                    r.timestamp.format(TIME_FORMAT).to_string(),
                    r.is_healthy,
                    r.response_time,
                    r.status_code,
                    r.error_message,
                    response_data,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get every health check at or after `start`, oldest first.
    ///
    /// Rows that cannot be decoded are logged and skipped.
    pub fn get_health_checks_since(
        &self,
        start: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, endpoint, timestamp, is_healthy, response_time, status_code, error_message, response_data
             FROM health_checks
             WHERE timestamp >= ?1
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt
            .query_map(params![start.format(TIME_FORMAT).to_string()], |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    endpoint: row.get(1)?,
                    timestamp: row.get(2)?,
                    is_healthy: row.get(3)?,
                    response_time: row.get(4)?,
                    status_code: row.get(5)?,
                    error_message: row.get(6)?,
                    response_data: row.get(7)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(rows.into_iter().filter_map(decode_row).collect())
    }

    /// Delete health checks before a cutoff time. Returns the number of rows removed.
    pub fn delete_health_checks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM health_checks WHERE timestamp < ?1",
            params![cutoff.format(TIME_FORMAT).to_string()],
        )?;
        Ok(deleted)
    }

    // --- Status Stats ---

    /// Get record count, database size and covered time span.
    pub fn get_stats(&self) -> Result<StoreStats, DbError> {
        let conn = self.conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        let (count, earliest, latest): (i64, Option<String>, Option<String>) = conn.query_row(
            "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM health_checks",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        Ok(StoreStats {
            count,
            db_size_bytes: page_count * page_size,
            earliest: earliest.and_then(|s| parse_db_time(&s)),
            latest: latest.and_then(|s| parse_db_time(&s)),
        })
    }
}

fn decode_row(row: RawRow) -> Option<HealthCheckRecord> {
    let Some(timestamp) = parse_db_time(&row.timestamp) else {
        tracing::warn!("Skipping health check {}: bad timestamp {:?}", row.id, row.timestamp);
        return None;
    };

    if row.response_time < FAILED_RESPONSE_TIME {
        tracing::warn!(
            "Skipping health check {}: invalid response time {}",
            row.id,
            row.response_time
        );
        return None;
    }

    let response_data = match row.response_data.as_deref().map(serde_json::from_str).transpose() {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Skipping health check {}: bad response data: {}", row.id, e);
            return None;
        }
    };

    Some(HealthCheckRecord {
        id: row.id,
        endpoint: row.endpoint,
        timestamp,
        is_healthy: row.is_healthy,
        response_time: row.response_time,
        status_code: row.status_code,
        error_message: row.error_message,
        response_data,
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
