//! HTTP request handlers.

use super::AppState;
use crate::db::{HealthCheckRecord, StoreStats};
use crate::health::{
    load_dashboard, load_endpoint_detail, Direction, EndpointDetail, EndpointStatus,
    EndpointTimeline, Locale, TimeRange, Translations, DEFAULT_BUCKET_COUNT,
};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Upper bound for the `buckets` query parameter.
const MAX_BUCKETS: usize = 1000;

// ============================================================================
// API: Health status
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusQuery {
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub buckets: Option<usize>,
}

/// An endpoint status decorated with catalog metadata.
#[derive(Debug, Serialize)]
pub struct StatusView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<Translations>,
    #[serde(flatten)]
    pub status: EndpointStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusResponse {
    pub time_range: TimeRange,
    pub direction: Direction,
    pub statuses: Vec<StatusView>,
    pub timelines: Vec<EndpointTimeline>,
    pub health_data: Vec<HealthCheckRecord>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn bucket_count(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .map_or(DEFAULT_BUCKET_COUNT, |n| n.min(MAX_BUCKETS))
}

pub async fn handle_health_status(
    State(state): State<AppState>,
    Query(query): Query<HealthStatusQuery>,
) -> Response {
    let range = TimeRange::parse_or_default(query.time_range.as_deref());
    let locale = Locale::parse_or_default(query.lang.as_deref());

    let dashboard = match load_dashboard(
        state.store.as_ref(),
        range,
        bucket_count(query.buckets),
        Utc::now(),
    ) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("Error processing health data: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process health data");
        }
    };

    let statuses = dashboard
        .statuses
        .into_iter()
        .map(|status| match state.catalog.find_by_url(&status.endpoint) {
            Some(endpoint) => StatusView {
                id: Some(endpoint.id.clone()),
                name: endpoint.name(locale).to_string(),
                translations: Some(endpoint.translations.clone()),
                status,
            },
            None => StatusView {
                id: None,
                name: status.endpoint.clone(),
                translations: None,
                status,
            },
        })
        .collect();

    Json(HealthStatusResponse {
        time_range: range,
        direction: locale.direction(),
        statuses,
        timelines: dashboard.timelines,
        health_data: dashboard.records,
    })
    .into_response()
}

// ============================================================================
// API: Endpoint detail
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecksQuery {
    /// Endpoint URL or catalog id.
    pub endpoint: String,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub buckets: Option<usize>,
}

pub async fn handle_health_checks(
    State(state): State<AppState>,
    Query(query): Query<HealthChecksQuery>,
) -> Response {
    let range = TimeRange::parse_or_default(query.time_range.as_deref());
    let url = state
        .catalog
        .find_by_id(&query.endpoint)
        .map_or(query.endpoint.as_str(), |e| e.url.as_str());

    match load_endpoint_detail(
        state.store.as_ref(),
        url,
        range,
        bucket_count(query.buckets),
        Utc::now(),
    ) {
        Ok(detail) => Json::<EndpointDetail>(detail).into_response(),
        Err(e) => {
            tracing::error!("Error loading checks for {}: {}", url, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load health checks")
        }
    }
}

// ============================================================================
// API: Probing
// ============================================================================

pub async fn handle_run_health_checks(State(state): State<AppState>) -> Response {
    match state.scheduler.run_once().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            tracing::error!("Failed to save results: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Service status
// ============================================================================

pub async fn handle_store_stats(State(state): State<AppState>) -> Response {
    match state.store.get_stats() {
        Ok(stats) => Json::<StoreStats>(stats).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn handle_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
