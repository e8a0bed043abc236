//! Probe module for endpoint health checks.
//!
//! Issues HTTP requests against the catalogued endpoints and turns each
//! outcome into a `HealthCheckRecord`.

mod catalog;
mod http;

pub use catalog::*;
pub use http::*;

use crate::db::HealthCheckRecord;

use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Probe every catalogued endpoint in turn.
pub async fn run_health_checks(
    client: &reqwest::Client,
    catalog: &Catalog,
) -> Vec<HealthCheckRecord> {
    let endpoints = catalog.endpoints();
    tracing::info!("Checking {} endpoints", endpoints.len());

    let mut results = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        tracing::debug!("Checking endpoint: {}", endpoint.url);
        results.push(probe_endpoint(client, endpoint).await);
    }

    results
}

/// Base URL of a local port with nothing listening, for fast connection failures.
#[cfg(test)]
pub(crate) fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
