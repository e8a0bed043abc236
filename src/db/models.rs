//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latency recorded when a probe failed before a timed response.
pub const FAILED_RESPONSE_TIME: i64 = -1;

/// Status code recorded when a probe timed out.
pub const TIMEOUT_STATUS_CODE: i32 = 408;

/// Status code recorded when a probe failed for any other reason.
pub const FAILURE_STATUS_CODE: i32 = 500;

/// A single health probe result for one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    /// Row id, 0 until stored.
    #[serde(default)]
    pub id: i64,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    pub is_healthy: bool,
    /// Latency in milliseconds, or -1 when the probe failed
    pub response_time: i64,
    pub status_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<serde_json::Value>,
}

/// Record store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub count: i64,
    pub db_size_bytes: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}
