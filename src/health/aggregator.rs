//! Health status aggregation.
//!
//! Turns an ascending list of health check records into per-endpoint status
//! summaries and fixed-length uptime timelines. Everything here is pure: the
//! same input always yields the same output.

use crate::db::HealthCheckRecord;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of most recent checks that decide the live status.
pub const RECENT_WINDOW: usize = 5;

/// Number of cells in an uptime timeline.
pub const DEFAULT_BUCKET_COUNT: usize = 90;

/// Number of failures shown in an endpoint's error list.
pub const DEFAULT_RECENT_FAILURES: usize = 5;

/// Live status of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every recent check succeeded.
    Operational,
    /// Some, but not all, recent checks failed.
    Degraded,
    /// Every recent check failed.
    Down,
}

impl Status {
    /// Status for `failures` failed checks out of `total` recent checks.
    pub fn from_failures(failures: usize, total: usize) -> Self {
        if failures == total {
            Status::Down
        } else if failures > 0 {
            Status::Degraded
        } else {
            Status::Operational
        }
    }
}

/// Derived summary for one endpoint over a queried range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub endpoint: String,
    pub status: Status,
    /// Healthy share of the whole range, in percent
    pub uptime: u8,
    /// Mean latency of the recent window in milliseconds
    #[serde(rename = "responseTime")]
    pub average_response_time: i64,
    #[serde(rename = "lastCheck")]
    pub last_check_time: DateTime<Utc>,
}

/// One cell of an uptime timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeInterval {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_healthy: bool,
}

/// Summarize one endpoint's ascending records.
///
/// Returns `None` for an empty slice, so callers never divide by zero.
pub fn compute_endpoint_status(records: &[HealthCheckRecord]) -> Option<EndpointStatus> {
    let last = records.last()?;
    let recent = &records[records.len().saturating_sub(RECENT_WINDOW)..];

    // Failed probes contribute their -1 sentinel to the mean.
    let latency_sum: i64 = recent.iter().map(|r| r.response_time).sum();
    let average_response_time = round_half_up_div(latency_sum, recent.len() as i64);

    let healthy = records.iter().filter(|r| r.is_healthy).count() as i64;
    let uptime = round_half_up_div(healthy * 100, records.len() as i64) as u8;

    let failures = recent.iter().filter(|r| !r.is_healthy).count();

    Some(EndpointStatus {
        endpoint: last.endpoint.clone(),
        status: Status::from_failures(failures, recent.len()),
        uptime,
        average_response_time,
        last_check_time: last.timestamp,
    })
}

/// Split ascending records into `bucket_count` positional buckets.
///
/// The result always has exactly `bucket_count` entries. Buckets past the end
/// of the data are reported healthy and stamped with `now`.
pub fn compute_uptime_timeline(
    records: &[HealthCheckRecord],
    bucket_count: usize,
    now: DateTime<Utc>,
) -> Vec<UptimeInterval> {
    if bucket_count == 0 {
        return Vec::new();
    }

    let bucket_size = records.len().div_ceil(bucket_count);

    (0..bucket_count)
        .map(|i| {
            let start = (i * bucket_size).min(records.len());
            let end = ((i + 1) * bucket_size).min(records.len());
            let bucket = &records[start..end];

            match (bucket.first(), bucket.last()) {
                (Some(first), Some(last)) => UptimeInterval {
                    start_time: first.timestamp,
                    end_time: last.timestamp,
                    is_healthy: bucket.iter().all(|r| r.is_healthy),
                },
                _ => UptimeInterval {
                    start_time: now,
                    end_time: now,
                    is_healthy: true,
                },
            }
        })
        .collect()
}

/// Summarize a mixed list of records, one status per endpoint.
///
/// Endpoints keep the order of their first appearance in `records`.
pub fn summarize(records: &[HealthCheckRecord]) -> Vec<EndpointStatus> {
    group_by_endpoint(records)
        .iter()
        .filter_map(|(_, checks)| compute_endpoint_status(checks))
        .collect()
}

/// The last `limit` unhealthy records, newest first.
pub fn recent_failures(records: &[HealthCheckRecord], limit: usize) -> Vec<HealthCheckRecord> {
    records
        .iter()
        .rev()
        .filter(|r| !r.is_healthy)
        .take(limit)
        .cloned()
        .collect()
}

/// Partition records by endpoint, preserving first-appearance order and the
/// relative order of records within each endpoint.
pub fn group_by_endpoint(records: &[HealthCheckRecord]) -> Vec<(String, Vec<HealthCheckRecord>)> {
    let mut groups: Vec<(String, Vec<HealthCheckRecord>)> = Vec::new();

    for record in records {
        match groups.iter_mut().find(|(endpoint, _)| *endpoint == record.endpoint) {
            Some((_, checks)) => checks.push(record.clone()),
            None => groups.push((record.endpoint.clone(), vec![record.clone()])),
        }
    }

    groups
}

/// Mean latency over every record in milliseconds, or 0 for no records.
pub fn mean_response_time(records: &[HealthCheckRecord]) -> i64 {
    if records.is_empty() {
        return 0;
    }
    let sum: i64 = records.iter().map(|r| r.response_time).sum();
    round_half_up_div(sum, records.len() as i64)
}

/// `round(numerator / denominator)` with halves rounded towards positive infinity.
fn round_half_up_div(numerator: i64, denominator: i64) -> i64 {
    (2 * numerator + denominator).div_euclid(2 * denominator)
}
