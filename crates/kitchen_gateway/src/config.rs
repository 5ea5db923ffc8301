//! Gateway configuration, read from the environment.

use crate::error::{GatewayError, Result};
use std::str::FromStr;
use std::time::Duration;

/// Six months, in seconds.
const DEFAULT_TOKEN_TTL_SECS: u64 = 6 * 30 * 24 * 60 * 60;

/// Runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port for HTTP routes and the `/ws` feed.
    pub http_port: u16,
    /// Port for the Prometheus exporter.
    pub metrics_port: u16,
    /// Redis backend. In-memory stores are used when unset.
    pub redis_url: Option<String>,
    /// Cadence of delta polling per connection.
    pub tick_interval: Duration,
    /// WebSocket keepalive ping cadence.
    pub ping_interval: Duration,
    /// Lifetime of newly issued session tokens.
    pub token_ttl: Duration,
    /// Cadence of the expired-token sweep.
    pub token_sweep_interval: Duration,
    /// Credential hash accepted by `/api/login`. Login is disabled when unset.
    pub credential_hash: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_port: 1248,
            metrics_port: 9094,
            redis_url: None,
            tick_interval: Duration::from_millis(5000),
            ping_interval: Duration::from_secs(30),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            token_sweep_interval: Duration::from_secs(3600),
            credential_hash: None,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tick_ms: u64 = parse_or(&lookup, "TICK_INTERVAL_MS", 5000)?;
        if tick_ms == 0 {
            return Err(GatewayError::Config(
                "TICK_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        let sweep_secs: u64 = parse_or(&lookup, "TOKEN_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_secs == 0 {
            return Err(GatewayError::Config(
                "TOKEN_SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or(&lookup, "HTTP_PORT", defaults.http_port)?,
            metrics_port: parse_or(&lookup, "METRICS_PORT", defaults.metrics_port)?,
            redis_url: non_empty(lookup("REDIS_URL")),
            tick_interval: Duration::from_millis(tick_ms),
            ping_interval: defaults.ping_interval,
            token_ttl: Duration::from_secs(parse_or(
                &lookup,
                "TOKEN_TTL_SECS",
                DEFAULT_TOKEN_TTL_SECS,
            )?),
            token_sweep_interval: Duration::from_secs(sweep_secs),
            credential_hash: non_empty(lookup("CREDENTIAL_HASH")).map(|h| h.to_lowercase()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .map_err(|_| GatewayError::Config(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_port, 1248);
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert_eq!(config.token_ttl, Duration::from_secs(15_552_000));
        assert!(config.redis_url.is_none());
        assert!(config.credential_hash.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_PORT", "9000"),
            ("TICK_INTERVAL_MS", "250"),
            ("REDIS_URL", "redis://cache:6379"),
            ("CREDENTIAL_HASH", "ABCDEF"),
        ])
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.credential_hash.as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("HTTP_PORT", "http")]).is_err());
        assert!(config_from(&[("TICK_INTERVAL_MS", "0")]).is_err());
        assert!(config_from(&[("REDIS_URL", "  ")]).unwrap().redis_url.is_none());
    }
}
