//! Telemetry
//!
//! Metrics for session operations. Logging goes through `tracing` events
//! emitted where the work happens.

pub mod metrics;

pub use metrics::{
    metric_names, no_op_metrics, InMemoryMetrics, MetricEntry, MetricLabels, NoOpMetrics,
    SessionMetrics,
};
