//! Configuration module for the health service.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Base URL of the supermarket pricing API when `API_URL` is unset.
pub const DEFAULT_API_URL: &str = "https://www.openisraelisupermarkets.co.il";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "supermarket-health.db")
    pub db_path: String,
    /// Base URL of the probed API
    pub api_url: String,
    /// Bearer token sent with every probe (default: empty)
    pub auth_token: String,
    /// Seconds between probe rounds (default: 300)
    pub probe_interval: f64,
    /// Per-request probe timeout in seconds (default: 30)
    pub probe_timeout: f64,
    /// Days of health checks kept in the store (default: 31)
    pub retention_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "supermarket-health.db".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: String::new(),
            probe_interval: 300.0,
            probe_timeout: 30.0,
            retention_days: 31,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SUPERMARKET_HEALTH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SUPERMARKET_HEALTH_DB_PATH`: Database file path (default: "supermarket-health.db")
    /// - `API_URL`: Base URL of the probed API
    /// - `AUTH_TOKEN`: Bearer token for probes
    /// - `SUPERMARKET_HEALTH_PROBE_INTERVAL`: Seconds between probe rounds (default: 300)
    /// - `SUPERMARKET_HEALTH_PROBE_TIMEOUT`: Probe timeout in seconds (default: 30)
    /// - `SUPERMARKET_HEALTH_RETENTION_DAYS`: Days of history to keep (default: 31)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        parse_into(&lookup, "SUPERMARKET_HEALTH_HTTP_PORT", &mut cfg.http_port);
        parse_into(&lookup, "SUPERMARKET_HEALTH_PROBE_INTERVAL", &mut cfg.probe_interval);
        parse_into(&lookup, "SUPERMARKET_HEALTH_PROBE_TIMEOUT", &mut cfg.probe_timeout);
        parse_into(&lookup, "SUPERMARKET_HEALTH_RETENTION_DAYS", &mut cfg.retention_days);

        if let Some(db_path) = lookup("SUPERMARKET_HEALTH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(api_url) = lookup("API_URL") {
            if !api_url.is_empty() {
                cfg.api_url = api_url.trim_end_matches('/').to_string();
            }
        }

        if let Some(token) = lookup("AUTH_TOKEN") {
            cfg.auth_token = token;
        }

        if !is_valid_period(cfg.probe_interval) {
            cfg.probe_interval = 300.0;
        }
        if !is_valid_period(cfg.probe_timeout) {
            cfg.probe_timeout = 30.0;
        }
        if cfg.retention_days <= 0 {
            cfg.retention_days = 31;
        }

        cfg
    }

    pub fn probe_interval(&self) -> Duration {
        to_period(self.probe_interval, Duration::from_secs(300))
    }

    pub fn probe_timeout(&self) -> Duration {
        to_period(self.probe_timeout, Duration::from_secs(30))
    }
}

/// Accepted range for intervals and timeouts, in seconds.
const MIN_PERIOD_SECS: f64 = 0.001;
const MAX_PERIOD_SECS: f64 = 365.0 * 24.0 * 3600.0;

fn is_valid_period(secs: f64) -> bool {
    secs.is_finite() && (MIN_PERIOD_SECS..=MAX_PERIOD_SECS).contains(&secs)
}

/// Convert seconds to a non-zero `Duration`, using `fallback` for values out of range.
fn to_period(secs: f64, fallback: Duration) -> Duration {
    if !is_valid_period(secs) {
        return fallback;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(fallback)
}

/// Overwrite `target` with the parsed variable, keeping the default on parse failure.
fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "supermarket-health.db");
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.retention_days, 31);
    }

    #[test]
    fn test_overrides_from_environment() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("SUPERMARKET_HEALTH_HTTP_PORT", "9090"),
            ("SUPERMARKET_HEALTH_DB_PATH", "/tmp/health.db"),
            ("API_URL", "https://api.example.com/"),
            ("AUTH_TOKEN", "secret"),
            ("SUPERMARKET_HEALTH_PROBE_INTERVAL", "60"),
        ]));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.db_path, "/tmp/health.db");
        assert_eq!(cfg.api_url, "https://api.example.com");
        assert_eq!(cfg.auth_token, "secret");
        assert_eq!(cfg.probe_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("SUPERMARKET_HEALTH_HTTP_PORT", "not-a-port"),
            ("SUPERMARKET_HEALTH_PROBE_TIMEOUT", "-5"),
            ("SUPERMARKET_HEALTH_RETENTION_DAYS", "0"),
        ]));
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.probe_timeout, 30.0);
        assert_eq!(cfg.retention_days, 31);
    }

    #[test]
    fn test_non_finite_and_tiny_periods_keep_defaults() {
        for value in ["NaN", "inf", "-inf", "1e-12", "1e300"] {
            let cfg = ServerConfig::from_lookup(lookup_from(&[
                ("SUPERMARKET_HEALTH_PROBE_INTERVAL", value),
                ("SUPERMARKET_HEALTH_PROBE_TIMEOUT", value),
            ]));
            assert_eq!(cfg.probe_interval(), Duration::from_secs(300), "value={}", value);
            assert_eq!(cfg.probe_timeout(), Duration::from_secs(30), "value={}", value);
        }
    }

    #[test]
    fn test_sub_second_periods_are_kept() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("SUPERMARKET_HEALTH_PROBE_INTERVAL", "0.5"),
        ]));
        assert_eq!(cfg.probe_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_out_of_range_fields_fall_back() {
        let cfg = ServerConfig {
            probe_interval: f64::NAN,
            probe_timeout: 1e300,
            ..Default::default()
        };
        assert_eq!(cfg.probe_interval(), Duration::from_secs(300));
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(30));
    }
}
