//! Metrics
//!
//! Session metrics collection interfaces and implementations.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Metric names recorded by [`InMemoryMetrics`].
pub mod metric_names {
    pub const LOGINS: &str = "jwt_session_logins_total";
    pub const LOGOUTS: &str = "jwt_session_logouts_total";
    pub const REFRESHES_STARTED: &str = "jwt_session_refreshes_started_total";
    pub const REFRESHES_COALESCED: &str = "jwt_session_refreshes_coalesced_total";
    pub const REFRESHES: &str = "jwt_session_refreshes_total";
    pub const BINDINGS_INSTALLED: &str = "jwt_session_bindings_installed_total";
    pub const BINDINGS_RELEASED: &str = "jwt_session_bindings_released_total";
}

/// Session metrics interface.
pub trait SessionMetrics: Send + Sync {
    /// Record login attempt.
    fn record_login(&self, success: bool);

    /// Record logout, `remote` when triggered by another instance.
    fn record_logout(&self, remote: bool);

    /// Record a refresh that reached the backend.
    fn record_refresh_started(&self);

    /// Record a refresh trigger that joined one already in flight.
    fn record_refresh_coalesced(&self);

    /// Record refresh result.
    fn record_refresh_result(&self, success: bool);

    /// Record a binding set installed over `apis` clients.
    fn record_bind(&self, apis: usize);

    /// Record a binding set released over `apis` clients.
    fn record_unbind(&self, apis: usize);
}

/// No-op metrics implementation.
pub struct NoOpMetrics;

impl SessionMetrics for NoOpMetrics {
    fn record_login(&self, _success: bool) {}
    fn record_logout(&self, _remote: bool) {}
    fn record_refresh_started(&self) {}
    fn record_refresh_coalesced(&self) {}
    fn record_refresh_result(&self, _success: bool) {}
    fn record_bind(&self, _apis: usize) {}
    fn record_unbind(&self, _apis: usize) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpMetrics {
    NoOpMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
    pub timestamp: i64,
}

/// In-memory metrics for testing.
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries.lock().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Number of entries recorded under `name`.
    pub fn count(&self, name: &str) -> u64 {
        self.entries.lock().iter().filter(|e| e.name == name).count() as u64
    }

    /// Number of entries recorded under `name` with `label` set to `value`.
    pub fn count_labeled(&self, name: &str, label: &str, value: &str) -> u64 {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name && e.labels.get(label).map(String::as_str) == Some(value))
            .count() as u64
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn record(&self, name: &str, value: f64, labels: MetricLabels) {
        self.entries.lock().push(MetricEntry {
            name: name.to_string(),
            value,
            labels,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    fn record_flag(&self, name: &str, label: &str, flag: bool) {
        let mut labels = MetricLabels::new();
        labels.insert(label.to_string(), flag.to_string());
        self.record(name, 1.0, labels);
    }
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics for InMemoryMetrics {
    fn record_login(&self, success: bool) {
        self.record_flag(metric_names::LOGINS, "success", success);
    }

    fn record_logout(&self, remote: bool) {
        self.record_flag(metric_names::LOGOUTS, "remote", remote);
    }

    fn record_refresh_started(&self) {
        self.record(metric_names::REFRESHES_STARTED, 1.0, MetricLabels::new());
    }

    fn record_refresh_coalesced(&self) {
        self.record(metric_names::REFRESHES_COALESCED, 1.0, MetricLabels::new());
    }

    fn record_refresh_result(&self, success: bool) {
        self.record_flag(metric_names::REFRESHES, "success", success);
    }

    fn record_bind(&self, apis: usize) {
        self.record(metric_names::BINDINGS_INSTALLED, apis as f64, MetricLabels::new());
    }

    fn record_unbind(&self, apis: usize) {
        self.record(metric_names::BINDINGS_RELEASED, apis as f64, MetricLabels::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_op_metrics() {
        let metrics = no_op_metrics();
        // Should not panic
        metrics.record_login(true);
        metrics.record_refresh_result(false);
        metrics.record_unbind(3);
    }

    #[test]
    fn test_in_memory_metrics() {
        let metrics = InMemoryMetrics::new();

        metrics.record_refresh_started();
        metrics.record_refresh_coalesced();
        metrics.record_refresh_coalesced();
        metrics.record_refresh_result(true);

        assert_eq!(metrics.get_entries().len(), 4);
        assert_eq!(metrics.count(metric_names::REFRESHES_COALESCED), 2);
        assert_eq!(
            metrics.count_labeled(metric_names::REFRESHES, "success", "true"),
            1
        );
        assert_eq!(
            metrics.count_labeled(metric_names::REFRESHES, "success", "false"),
            0
        );
    }

    #[test]
    fn test_bind_value_is_api_count() {
        let metrics = InMemoryMetrics::new();
        metrics.record_bind(3);

        let entries = metrics.get_entries_by_name(metric_names::BINDINGS_INSTALLED);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, 3.0);
    }

    #[test]
    fn test_clear_entries() {
        let metrics = InMemoryMetrics::new();
        metrics.record_logout(false);

        assert!(!metrics.get_entries().is_empty());
        metrics.clear();
        assert!(metrics.get_entries().is_empty());
    }
}
