//! Service configuration from the environment.

use anyhow::{Context, Result};
use common::WsManagerConfig;
use scoreboard::protocol::endpoint_url;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Scoreboard WebSocket URL.
    pub scoreboard_url: String,
    /// Port for `/ws`, `/api` and `/health`.
    pub http_port: u16,
    /// Prometheus exporter port.
    pub metrics_port: u16,
    /// Initial reconnect delay.
    pub reconnect_delay: Duration,
    /// Backoff cap.
    pub max_reconnect_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            scoreboard_url: "ws://localhost:8000/WS/".to_string(),
            http_port: 8001,
            metrics_port: 9093,
            reconnect_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_millis(30000),
        }
    }
}

impl GatewayConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`; unset variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let scoreboard_url = lookup("SCOREBOARD_URL")
            .map(|url| endpoint_url(&url))
            .unwrap_or(defaults.scoreboard_url);
        let http_port = parse_var(&lookup, "HTTP_PORT")?.unwrap_or(defaults.http_port);
        let metrics_port = parse_var(&lookup, "METRICS_PORT")?.unwrap_or(defaults.metrics_port);
        let reconnect_delay = parse_var::<u64, _>(&lookup, "RECONNECT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.reconnect_delay);
        let max_reconnect_delay = parse_var::<u64, _>(&lookup, "MAX_RECONNECT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_reconnect_delay)
            .max(reconnect_delay);

        Ok(Self {
            scoreboard_url,
            http_port,
            metrics_port,
            reconnect_delay,
            max_reconnect_delay,
        })
    }

    /// Upstream connection settings.
    pub fn ws_manager_config(&self) -> WsManagerConfig {
        WsManagerConfig {
            reconnect_delay: self.reconnect_delay,
            max_reconnect_delay: self.max_reconnect_delay,
            label: "scoreboard".to_string(),
            ..WsManagerConfig::default()
        }
    }

    pub fn log(&self) {
        info!("Configuration:");
        info!("  SCOREBOARD_URL: {}", self.scoreboard_url);
        info!("  HTTP_PORT: {}", self.http_port);
        info!("  METRICS_PORT: {}", self.metrics_port);
        info!("  RECONNECT_DELAY_MS: {}", self.reconnect_delay.as_millis());
        info!("  MAX_RECONNECT_DELAY_MS: {}", self.max_reconnect_delay.as_millis());
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} must be a number, got '{}'", name, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_config(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(make_config(&[]).unwrap(), GatewayConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = make_config(&[
            ("SCOREBOARD_URL", "192.168.86.33:8000"),
            ("HTTP_PORT", "9000"),
            ("RECONNECT_DELAY_MS", "250"),
            ("MAX_RECONNECT_DELAY_MS", "4000"),
        ])
        .unwrap();

        assert_eq!(config.scoreboard_url, "ws://192.168.86.33:8000/WS/");
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.metrics_port, 9093);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));

        let ws = config.ws_manager_config();
        assert_eq!(ws.max_reconnect_delay, Duration::from_millis(4000));
        assert_eq!(ws.label, "scoreboard");
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = make_config(&[("HTTP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }

    #[test]
    fn test_cap_never_below_initial_delay() {
        let config = make_config(&[("RECONNECT_DELAY_MS", "5000"), ("MAX_RECONNECT_DELAY_MS", "10")]).unwrap();
        assert_eq!(config.max_reconnect_delay, Duration::from_millis(5000));
    }
}
