//! Configuration Builder
//!
//! Fluent builder for session configuration.

use std::time::Duration;

use crate::error::{ConfigurationError, SessionError};
use crate::types::{
    SessionConfig, DEFAULT_LOGOUT_MARKER_KEY, DEFAULT_REFRESH_CHECK_INTERVAL,
    DEFAULT_REFRESH_DELAY_INTERVAL,
};

/// Environment variable overriding the proactive check period (milliseconds).
pub const ENV_REFRESH_CHECK_INTERVAL_MS: &str = "JWT_CONNECT_REFRESH_CHECK_INTERVAL_MS";
/// Environment variable overriding the request gate re-check period (milliseconds).
pub const ENV_REFRESH_DELAY_INTERVAL_MS: &str = "JWT_CONNECT_REFRESH_DELAY_INTERVAL_MS";
/// Environment variable overriding the logout marker key.
pub const ENV_LOGOUT_KEY: &str = "JWT_CONNECT_LOGOUT_KEY";
/// Environment variable setting a request gate timeout (milliseconds).
pub const ENV_GATE_TIMEOUT_MS: &str = "JWT_CONNECT_GATE_TIMEOUT_MS";

/// Session configuration builder.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    refresh_check_interval: Duration,
    refresh_delay_interval: Duration,
    logout_marker_key: String,
    request_gate_timeout: Option<Duration>,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SessionConfig> for SessionConfigBuilder {
    fn from(config: SessionConfig) -> Self {
        Self {
            refresh_check_interval: config.refresh_check_interval,
            refresh_delay_interval: config.refresh_delay_interval,
            logout_marker_key: config.logout_marker_key,
            request_gate_timeout: config.request_gate_timeout,
        }
    }
}

impl SessionConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            refresh_check_interval: DEFAULT_REFRESH_CHECK_INTERVAL,
            refresh_delay_interval: DEFAULT_REFRESH_DELAY_INTERVAL,
            logout_marker_key: DEFAULT_LOGOUT_MARKER_KEY.to_string(),
            request_gate_timeout: None,
        }
    }

    /// Create a builder seeded from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `JWT_CONNECT_REFRESH_CHECK_INTERVAL_MS` (optional)
    /// - `JWT_CONNECT_REFRESH_DELAY_INTERVAL_MS` (optional)
    /// - `JWT_CONNECT_LOGOUT_KEY` (optional)
    /// - `JWT_CONNECT_GATE_TIMEOUT_MS` (optional)
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let mut builder = Self::new();

        if let Some(ms) = parse_millis(&lookup, ENV_REFRESH_CHECK_INTERVAL_MS)? {
            builder = builder.refresh_check_interval(ms);
        }
        if let Some(ms) = parse_millis(&lookup, ENV_REFRESH_DELAY_INTERVAL_MS)? {
            builder = builder.refresh_delay_interval(ms);
        }
        if let Some(key) = lookup(ENV_LOGOUT_KEY) {
            builder = builder.logout_marker_key(key);
        }
        if let Some(ms) = parse_millis(&lookup, ENV_GATE_TIMEOUT_MS)? {
            builder = builder.request_gate_timeout(ms);
        }

        Ok(builder)
    }

    /// Set proactive expiry check period.
    pub fn refresh_check_interval(mut self, interval: Duration) -> Self {
        self.refresh_check_interval = interval;
        self
    }

    /// Set request gate re-check period.
    pub fn refresh_delay_interval(mut self, interval: Duration) -> Self {
        self.refresh_delay_interval = interval;
        self
    }

    /// Set the shared-store key used for the logout marker.
    pub fn logout_marker_key(mut self, key: impl Into<String>) -> Self {
        self.logout_marker_key = key.into();
        self
    }

    /// Fail gated requests that wait longer than `timeout`.
    pub fn request_gate_timeout(mut self, timeout: Duration) -> Self {
        self.request_gate_timeout = Some(timeout);
        self
    }

    /// Build the session configuration.
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        if self.refresh_check_interval.is_zero() {
            return Err(ConfigurationError::ZeroInterval {
                field: "refresh_check_interval".to_string(),
            }
            .into());
        }

        if self.refresh_delay_interval.is_zero() {
            return Err(ConfigurationError::ZeroInterval {
                field: "refresh_delay_interval".to_string(),
            }
            .into());
        }

        if self.logout_marker_key.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfig {
                message: "logout_marker_key must not be empty".to_string(),
            }
            .into());
        }

        Ok(SessionConfig {
            refresh_check_interval: self.refresh_check_interval,
            refresh_delay_interval: self.refresh_delay_interval,
            logout_marker_key: self.logout_marker_key,
            request_gate_timeout: self.request_gate_timeout,
        })
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<Duration>, SessionError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    let ms = value.trim().parse::<u64>().map_err(|_| {
        SessionError::from(ConfigurationError::InvalidEnvValue {
            name: name.to_string(),
            value: value.clone(),
        })
    })?;

    Ok(Some(Duration::from_millis(ms)))
}

/// Create a new session configuration builder.
pub fn session_config() -> SessionConfigBuilder {
    SessionConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builder_defaults() {
        let config = session_config().build().unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = session_config()
            .refresh_check_interval(Duration::from_secs(30))
            .refresh_delay_interval(Duration::from_millis(10))
            .logout_marker_key("app-logout")
            .request_gate_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.refresh_check_interval, Duration::from_secs(30));
        assert_eq!(config.refresh_delay_interval, Duration::from_millis(10));
        assert_eq!(config.logout_marker_key, "app-logout");
        assert_eq!(config.request_gate_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = session_config()
            .refresh_check_interval(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(SessionError::Configuration(ConfigurationError::ZeroInterval { .. }))
        ));
    }

    #[test]
    fn test_builder_rejects_empty_key() {
        let result = session_config().logout_marker_key("  ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_REFRESH_CHECK_INTERVAL_MS, "30000"),
            (ENV_LOGOUT_KEY, "tab-logout"),
        ]
        .into_iter()
        .collect();

        let config = SessionConfigBuilder::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.refresh_check_interval, Duration::from_millis(30_000));
        assert_eq!(config.refresh_delay_interval, DEFAULT_REFRESH_DELAY_INTERVAL);
        assert_eq!(config.logout_marker_key, "tab-logout");
        assert!(config.request_gate_timeout.is_none());
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let result = SessionConfigBuilder::from_lookup(|name| {
            (name == ENV_GATE_TIMEOUT_MS).then(|| "soon".to_string())
        });
        assert!(matches!(
            result,
            Err(SessionError::Configuration(ConfigurationError::InvalidEnvValue { .. }))
        ));
    }
}
