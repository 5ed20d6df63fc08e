//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Credentials and address of one REST endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Runtime configuration for the SDC Fleet Controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub powerflex: EndpointConfig,
    pub gateway: EndpointConfig,
    /// Accept self-signed certificates on both endpoints
    pub insecure: bool,
    pub namespace: String,
    /// Installer status poll interval
    pub poll_interval: Duration,
    pub metrics_addr: SocketAddr,
    /// Emit JSON logs instead of the human-readable format
    pub json_logs: bool,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ControllerError::InvalidConfig(format!("{} environment variable is required", key)))
        };

        let powerflex = EndpointConfig {
            url: required("POWERFLEX_ENDPOINT")?,
            username: lookup("POWERFLEX_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password: required("POWERFLEX_PASSWORD")?,
        };
        let gateway = EndpointConfig {
            url: lookup("GATEWAY_ENDPOINT").unwrap_or_else(|| powerflex.url.clone()),
            username: lookup("GATEWAY_USERNAME").unwrap_or_else(|| powerflex.username.clone()),
            password: lookup("GATEWAY_PASSWORD").unwrap_or_else(|| powerflex.password.clone()),
        };

        let insecure = lookup("POWERFLEX_INSECURE")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let poll_secs = match lookup("INSTALL_POLL_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("INSTALL_POLL_INTERVAL_SECS must be a positive integer, got {:?}", raw))
            })?,
            None => 60,
        };

        let metrics_addr = lookup("METRICS_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_ADDR is not a socket address: {}", e)))?;

        Ok(Self {
            powerflex,
            gateway,
            insecure,
            namespace: lookup("WATCH_NAMESPACE").unwrap_or_else(|| "default".to_string()),
            poll_interval: Duration::from_secs(poll_secs),
            metrics_addr,
            json_logs: lookup("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_fall_back_to_array_settings() {
        let config = load(&[
            ("POWERFLEX_ENDPOINT", "https://pflex"),
            ("POWERFLEX_PASSWORD", "secret"),
        ])
        .unwrap();

        assert_eq!(config.powerflex.username, "admin");
        assert_eq!(config.gateway, config.powerflex);
        assert_eq!(config.namespace, "default");
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.metrics_addr.port(), 8080);
        assert!(!config.insecure);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_missing_password_is_rejected() {
        let err = load(&[("POWERFLEX_ENDPOINT", "https://pflex")]).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("POWERFLEX_PASSWORD")));
    }

    #[test]
    fn test_gateway_overrides_and_flags() {
        let config = load(&[
            ("POWERFLEX_ENDPOINT", "https://pflex"),
            ("POWERFLEX_PASSWORD", "secret"),
            ("GATEWAY_ENDPOINT", "https://gw"),
            ("GATEWAY_PASSWORD", "gw-secret"),
            ("POWERFLEX_INSECURE", "TRUE"),
            ("INSTALL_POLL_INTERVAL_SECS", "15"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.gateway.url, "https://gw");
        assert_eq!(config.gateway.username, "admin");
        assert_eq!(config.gateway.password, "gw-secret");
        assert!(config.insecure);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert!(config.json_logs);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = load(&[
            ("POWERFLEX_ENDPOINT", "https://pflex"),
            ("POWERFLEX_PASSWORD", "secret"),
            ("INSTALL_POLL_INTERVAL_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
