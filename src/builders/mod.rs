//! Builders
//!
//! Fluent builder patterns for session configuration.

pub mod config;

pub use config::{session_config, SessionConfigBuilder};
