//! Loading and aggregating health data for the dashboard.

use super::aggregator::{
    compute_endpoint_status, compute_uptime_timeline, group_by_endpoint, mean_response_time,
    recent_failures, summarize, EndpointStatus, UptimeInterval, DEFAULT_RECENT_FAILURES,
};
use super::range::TimeRange;
use crate::db::{DbError, HealthCheckRecord, Store};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the dashboard.
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("failed to load health data: {0}")]
    Fetch(#[from] DbError),
}

/// Read access to stored health checks.
pub trait HealthCheckSource: Send + Sync {
    /// Every record at or after `start`, oldest first.
    fn fetch_health_checks(&self, start: DateTime<Utc>)
        -> Result<Vec<HealthCheckRecord>, DbError>;
}

impl HealthCheckSource for Store {
    fn fetch_health_checks(
        &self,
        start: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckRecord>, DbError> {
        self.get_health_checks_since(start)
    }
}

/// Timeline for a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTimeline {
    pub endpoint: String,
    pub intervals: Vec<UptimeInterval>,
}

/// Everything the status page shows for one time range.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub range: TimeRange,
    pub statuses: Vec<EndpointStatus>,
    pub timelines: Vec<EndpointTimeline>,
    pub records: Vec<HealthCheckRecord>,
}

/// Drill-down view of one endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDetail {
    pub range: TimeRange,
    pub endpoint: String,
    pub check_count: usize,
    /// Mean latency over every check in the range, unlike the recent-window value in `status`
    pub average_response_time: i64,
    pub status: Option<EndpointStatus>,
    pub timeline: Vec<UptimeInterval>,
    pub recent_errors: Vec<HealthCheckRecord>,
    pub checks: Vec<HealthCheckRecord>,
}

/// Fetch `range` from `source` and aggregate it.
///
/// A failed fetch yields an error and no partial dashboard.
pub fn load_dashboard(
    source: &dyn HealthCheckSource,
    range: TimeRange,
    bucket_count: usize,
    now: DateTime<Utc>,
) -> Result<Dashboard, HealthError> {
    let records = source.fetch_health_checks(range.start(now))?;

    let statuses = summarize(&records);
    let timelines = group_by_endpoint(&records)
        .into_iter()
        .map(|(endpoint, checks)| EndpointTimeline {
            intervals: compute_uptime_timeline(&checks, bucket_count, now),
            endpoint,
        })
        .collect();

    tracing::debug!(
        "Aggregated {} health checks into {} endpoint statuses for {}",
        records.len(),
        statuses.len(),
        range
    );

    Ok(Dashboard {
        range,
        statuses,
        timelines,
        records,
    })
}

/// Fetch `range` and aggregate the checks of a single endpoint.
pub fn load_endpoint_detail(
    source: &dyn HealthCheckSource,
    endpoint: &str,
    range: TimeRange,
    bucket_count: usize,
    now: DateTime<Utc>,
) -> Result<EndpointDetail, HealthError> {
    let checks: Vec<HealthCheckRecord> = source
        .fetch_health_checks(range.start(now))?
        .into_iter()
        .filter(|r| r.endpoint == endpoint)
        .collect();

    Ok(EndpointDetail {
        range,
        endpoint: endpoint.to_string(),
        check_count: checks.len(),
        average_response_time: mean_response_time(&checks),
        status: compute_endpoint_status(&checks),
        timeline: compute_uptime_timeline(&checks, bucket_count, now),
        recent_errors: recent_failures(&checks, DEFAULT_RECENT_FAILURES),
        checks,
    })
}
