// Relay server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development.

use std::net::SocketAddr;
use std::time::Duration;

/// Core relay server configuration.
///
/// Constructed via [`RelayConfig::from_env`] which reads environment
/// variables and falls back to sensible development defaults.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Log filter directive (e.g. `info`, `coedit_relay=debug`).
    pub log_filter: String,
    /// How often the server pings each connection.
    pub ping_interval: Duration,
    /// How long after the last pong a connection is considered dead.
    pub ping_timeout: Duration,
}

impl RelayConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `COEDIT_RELAY_HOST` | `0.0.0.0` |
    /// | `COEDIT_RELAY_PORT` | `1234` |
    /// | `COEDIT_RELAY_LOG_FILTER` | `info` |
    /// | `COEDIT_RELAY_PING_INTERVAL_SECS` | `30` |
    /// | `COEDIT_RELAY_PING_TIMEOUT_SECS` | `10` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("COEDIT_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 =
            env("COEDIT_RELAY_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(1234);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let log_filter = env("COEDIT_RELAY_LOG_FILTER").unwrap_or_else(|_| "info".into());

        let ping_interval = env("COEDIT_RELAY_PING_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        let ping_timeout = env("COEDIT_RELAY_PING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self { listen_addr, log_filter, ping_interval, ping_timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key).map(|v| v.to_string()).ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let cfg = RelayConfig::from_env_fn(env_from_map(HashMap::new()));
        assert_eq!(cfg.listen_addr.port(), 1234);
        assert_eq!(cfg.listen_addr.ip().to_string(), "0.0.0.0");
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.ping_interval, Duration::from_secs(30));
        assert_eq!(cfg.ping_timeout, Duration::from_secs(10));
    }

    #[test]
    fn env_vars_override_defaults() {
        let cfg = RelayConfig::from_env_fn(env_from_map(HashMap::from([
            ("COEDIT_RELAY_HOST", "127.0.0.1"),
            ("COEDIT_RELAY_PORT", "4321"),
            ("COEDIT_RELAY_LOG_FILTER", "coedit_relay=debug"),
            ("COEDIT_RELAY_PING_INTERVAL_SECS", "5"),
            ("COEDIT_RELAY_PING_TIMEOUT_SECS", "2"),
        ])));
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:4321");
        assert_eq!(cfg.log_filter, "coedit_relay=debug");
        assert_eq!(cfg.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.ping_timeout, Duration::from_secs(2));
    }

    #[test]
    fn unparseable_port_falls_back_to_default() {
        let cfg = RelayConfig::from_env_fn(env_from_map(HashMap::from([(
            "COEDIT_RELAY_PORT",
            "not-a-port",
        )])));
        assert_eq!(cfg.listen_addr.port(), 1234);
    }
}
