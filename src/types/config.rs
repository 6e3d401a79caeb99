//! Configuration Types
//!
//! Session timing and cross-instance configuration.

use std::time::Duration;

/// Default proactive expiry check period (60 seconds).
pub const DEFAULT_REFRESH_CHECK_INTERVAL: Duration = Duration::from_millis(60_000);

/// Default request gate re-check period (100 milliseconds).
pub const DEFAULT_REFRESH_DELAY_INTERVAL: Duration = Duration::from_millis(100);

/// Default shared-store key of the logout marker.
pub const DEFAULT_LOGOUT_MARKER_KEY: &str = "logout";

/// Session configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period of the proactive expiry check. A token is refreshed once its
    /// remaining lifetime drops below this value.
    pub refresh_check_interval: Duration,
    /// How often a gated request re-checks whether the refresh finished.
    pub refresh_delay_interval: Duration,
    /// Shared-store key written on logout.
    pub logout_marker_key: String,
    /// Upper bound on how long a gated request waits. `None` waits forever.
    pub request_gate_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_check_interval: DEFAULT_REFRESH_CHECK_INTERVAL,
            refresh_delay_interval: DEFAULT_REFRESH_DELAY_INTERVAL,
            logout_marker_key: DEFAULT_LOGOUT_MARKER_KEY.to_string(),
            request_gate_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.refresh_check_interval, Duration::from_secs(60));
        assert_eq!(config.refresh_delay_interval, Duration::from_millis(100));
        assert_eq!(config.logout_marker_key, "logout");
        assert!(config.request_gate_timeout.is_none());
    }
}
