//! HTTP health probe implementation.

use super::catalog::{Endpoint, EndpointKind};
use super::ProbeError;
use crate::db::{
    HealthCheckRecord, FAILED_RESPONSE_TIME, FAILURE_STATUS_CODE, TIMEOUT_STATUS_CODE,
};

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Build the client shared by all probes.
pub fn build_client(timeout: Duration, auth_token: &str) -> Result<reqwest::Client, ProbeError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static("HealthCheck/1.0"));
    let bearer = HeaderValue::from_str(&format!("Bearer {}", auth_token))
        .map_err(|e| ProbeError::Config(format!("invalid auth token: {}", e)))?;
    headers.insert(AUTHORIZATION, bearer);

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))
}

/// Probe one endpoint and record the outcome.
///
/// Transport failures are recorded as unhealthy checks, never returned as errors.
pub async fn probe_endpoint(client: &reqwest::Client, endpoint: &Endpoint) -> HealthCheckRecord {
    let timestamp = Utc::now();

    match fetch(client, endpoint).await {
        Ok((status, elapsed, response_data)) => {
            let is_healthy = status.is_success() && judge(endpoint.kind, response_data.as_ref());
            let error_message = (!status.is_success())
                .then(|| format!("HTTP error! status: {}", status.as_u16()));

            if let Some(message) = &error_message {
                tracing::error!("Error for {}: {}", endpoint.url, message);
            }

            HealthCheckRecord {
                id: 0,
                endpoint: endpoint.url.clone(),
                timestamp,
                is_healthy,
                response_time: elapsed.as_millis() as i64,
                status_code: i32::from(status.as_u16()),
                error_message,
                response_data,
            }
        }
        Err(e) => {
            tracing::error!("Failed to check {}: {}", endpoint.url, e);
            let (status_code, message) = match &e {
                ProbeError::Timeout => (TIMEOUT_STATUS_CODE, "Request timeout".to_string()),
                other => (FAILURE_STATUS_CODE, other.to_string()),
            };

            HealthCheckRecord {
                id: 0,
                endpoint: endpoint.url.clone(),
                timestamp,
                is_healthy: false,
                response_time: FAILED_RESPONSE_TIME,
                status_code,
                error_message: Some(message),
                response_data: None,
            }
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    endpoint: &Endpoint,
) -> Result<(reqwest::StatusCode, Duration, Option<Value>), ProbeError> {
    let start = Instant::now();

    let response = client.get(&endpoint.url).send().await.map_err(classify)?;
    let elapsed = start.elapsed();
    let status = response.status();

    tracing::debug!(
        "Response from {} in {}ms with status {}",
        endpoint.url,
        elapsed.as_millis(),
        status
    );

    let response_data = match endpoint.kind {
        EndpointKind::HomePage => Some(json!({ "status": "ok", "message": "Site is accessible" })),
        _ => match response.json::<Value>().await {
            Ok(data) => Some(data),
            // the status line already arrived, so a stalled or garbled body only loses the data
            Err(e) => {
                tracing::warn!("Failed to read response from {} as JSON: {}", endpoint.url, e);
                None
            }
        },
    };

    Ok((status, elapsed, response_data))
}

fn classify(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Network(e.to_string())
    }
}

/// Body-level verdict for a successful response.
fn judge(kind: EndpointKind, data: Option<&Value>) -> bool {
    match kind {
        EndpointKind::HomePage => true,
        EndpointKind::ServiceHealth => {
            data.and_then(|d| d.get("status")).and_then(Value::as_str) == Some("healthy")
        }
        EndpointKind::Freshness => {
            let flag = data.and_then(|d| d.get("is_updated"));
            // a missing or falsy flag passes; any truthy flag must be exactly `true`
            !flag.map_or(false, is_truthy) || flag == Some(&Value::Bool(true))
        }
    }
}

/// JavaScript truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Translations;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn endpoint(url: &str, kind: EndpointKind) -> Endpoint {
        Endpoint {
            id: "test".to_string(),
            url: url.to_string(),
            kind,
            translations: Translations::new("Test", "בדיקה"),
        }
    }

    /// Serve `router` on an ephemeral local port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn api() -> Router {
        Router::new()
            .route("/", get(|| async { "<html>supermarkets</html>" }))
            .route("/healthy", get(|| async { Json(json!({ "status": "healthy" })) }))
            .route("/degraded", get(|| async { Json(json!({ "status": "degraded" })) }))
            .route(
                "/unavailable",
                get(|| async {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "healthy" })))
                }),
            )
            .route("/text", get(|| async { "not json" }))
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_recorded_as_failure() {
        let client = build_client(Duration::from_millis(500), "token").unwrap();
        let url = format!("{}/api/service_health", crate::probe::refused_url());
        let record = probe_endpoint(&client, &endpoint(&url, EndpointKind::ServiceHealth)).await;

        assert!(!record.is_healthy);
        assert_eq!(record.response_time, FAILED_RESPONSE_TIME);
        assert_eq!(record.status_code, FAILURE_STATUS_CODE);
        assert!(record.error_message.is_some());
        assert!(record.response_data.is_none());
    }

    #[tokio::test]
    async fn test_healthy_service_response() {
        let base = serve(api()).await;
        let client = build_client(Duration::from_secs(5), "token").unwrap();

        let url = format!("{}/healthy", base);
        let record = probe_endpoint(&client, &endpoint(&url, EndpointKind::ServiceHealth)).await;

        assert!(record.is_healthy);
        assert_eq!(record.endpoint, url);
        assert_eq!(record.status_code, 200);
        assert!(record.response_time >= 0);
        assert!(record.error_message.is_none());
        assert_eq!(record.response_data, Some(json!({ "status": "healthy" })));
    }

    #[tokio::test]
    async fn test_degraded_body_is_unhealthy_without_error() {
        let base = serve(api()).await;
        let client = build_client(Duration::from_secs(5), "token").unwrap();

        let url = format!("{}/degraded", base);
        let record = probe_endpoint(&client, &endpoint(&url, EndpointKind::ServiceHealth)).await;

        assert!(!record.is_healthy);
        assert_eq!(record.status_code, 200);
        assert!(record.response_time >= 0);
        assert!(record.error_message.is_none());
        assert_eq!(record.response_data, Some(json!({ "status": "degraded" })));
    }

    #[tokio::test]
    async fn test_error_status_is_recorded() {
        let base = serve(api()).await;
        let client = build_client(Duration::from_secs(5), "token").unwrap();

        let url = format!("{}/unavailable", base);
        let record = probe_endpoint(&client, &endpoint(&url, EndpointKind::ServiceHealth)).await;

        // a healthy-looking body does not rescue a non-2xx status
        assert!(!record.is_healthy);
        assert_eq!(record.status_code, 503);
        assert!(record.response_time >= 0);
        assert_eq!(record.error_message.as_deref(), Some("HTTP error! status: 503"));
    }

    #[tokio::test]
    async fn test_non_json_body_leaves_data_empty() {
        let base = serve(api()).await;
        let client = build_client(Duration::from_secs(5), "token").unwrap();

        let url = format!("{}/text", base);
        let freshness = probe_endpoint(&client, &endpoint(&url, EndpointKind::Freshness)).await;
        assert!(freshness.is_healthy);
        assert_eq!(freshness.status_code, 200);
        assert!(freshness.response_data.is_none());

        let service = probe_endpoint(&client, &endpoint(&url, EndpointKind::ServiceHealth)).await;
        assert!(!service.is_healthy);
        assert!(service.error_message.is_none());
    }

    #[tokio::test]
    async fn test_home_page_gets_synthetic_data() {
        let base = serve(api()).await;
        let client = build_client(Duration::from_secs(5), "token").unwrap();

        let record = probe_endpoint(&client, &endpoint(&base, EndpointKind::HomePage)).await;

        assert!(record.is_healthy);
        assert_eq!(record.status_code, 200);
        assert_eq!(
            record.response_data,
            Some(json!({ "status": "ok", "message": "Site is accessible" }))
        );
    }

    #[tokio::test]
    async fn test_stalled_body_keeps_status_and_latency() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"is_up",
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = build_client(Duration::from_millis(300), "token").unwrap();
        let url = format!("http://{}/api/short_term_health", addr);
        let record = probe_endpoint(&client, &endpoint(&url, EndpointKind::Freshness)).await;

        assert_eq!(record.status_code, 200);
        assert!(record.response_time >= 0);
        assert!(record.response_data.is_none());
        assert!(record.error_message.is_none());
        assert!(record.is_healthy);
    }

    #[test]
    fn test_service_health_requires_healthy_status() {
        assert!(judge(EndpointKind::ServiceHealth, Some(&json!({ "status": "healthy" }))));
        assert!(!judge(EndpointKind::ServiceHealth, Some(&json!({ "status": "degraded" }))));
        assert!(!judge(EndpointKind::ServiceHealth, None));
    }

    #[test]
    fn test_home_page_needs_no_body() {
        assert!(judge(EndpointKind::HomePage, None));
    }

    #[test]
    fn test_freshness_flag() {
        assert!(judge(EndpointKind::Freshness, Some(&json!({ "is_updated": true }))));
        assert!(judge(EndpointKind::Freshness, Some(&json!({ "is_updated": false }))));
        assert!(judge(EndpointKind::Freshness, Some(&json!({}))));
        assert!(judge(EndpointKind::Freshness, None));
        assert!(!judge(EndpointKind::Freshness, Some(&json!({ "is_updated": "yes" }))));
        assert!(!judge(EndpointKind::Freshness, Some(&json!({ "is_updated": 1 }))));
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        assert!(build_client(Duration::from_secs(1), "bad\ntoken").is_err());
    }
}
