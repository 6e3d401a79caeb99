//! JWT Connect
//!
//! Token lifecycle coordination for JWT-authenticated applications.
//!
//! # Features
//!
//! - Login, signup and logout against a pluggable authentication backend
//! - Auth header and interceptor binding for any number of API clients
//! - Single-flight token refresh, triggered proactively or by unauthorized responses
//! - Request gating while a refresh is in flight
//! - Logout propagation across instances sharing a store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jwt_connect::{session_config, JwtSession, SecretString};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = session_config()
//!         .refresh_check_interval(std::time::Duration::from_secs(60))
//!         .build()?;
//!
//!     let session = JwtSession::builder()
//!         .backend(Arc::new(MyBackend::new()))
//!         .notifier(Arc::new(|| println!("please sign in again")))
//!         .protected_api(Arc::new(MyUsersApi::new()))
//!         .config(config)
//!         .build()?;
//!
//!     session
//!         .login("user@example.com", &SecretString::new("password".into()))
//!         .await?;
//!
//!     if let Some(tokens) = session.get_token() {
//!         println!("token expires at {}", tokens.expires_at());
//!     }
//!
//!     session.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: token set and configuration types
//! - `error`: error hierarchy
//! - `builders`: fluent configuration builder
//! - `core`: collaborator interfaces (backend, protected APIs, notifier, shared store)
//! - `token`: token store, refresh state, request gate and refresh coordinator
//! - `binding`: per-API bindings and the proactive expiry check
//! - `signal`: cross-instance logout
//! - `telemetry`: metrics
//! - `client`: the session combining all of the above

pub mod binding;
pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod signal;
pub mod telemetry;
pub mod token;
pub mod types;

pub use secrecy::SecretString;

// Re-export main client
pub use client::{JwtSession, JwtSessionBuilder};

// Re-export builders
pub use builders::{session_config, SessionConfigBuilder};

// Re-export errors
pub use error::{
    get_user_message, BackendError, BindingError, ConfigurationError, GateError, SessionError,
    SessionResult, SignalError, TokenError,
};

// Re-export types
pub use types::{
    SessionConfig, TokenSet, DEFAULT_LOGOUT_MARKER_KEY, DEFAULT_REFRESH_CHECK_INTERVAL,
    DEFAULT_REFRESH_DELAY_INTERVAL,
};

// Re-export collaborators
pub use crate::core::{
    AuthBackend, InMemorySharedStore, MockAuthBackend, MockProtectedApi, MockReauthNotifier,
    ProtectedApi, ReauthNotifier, SharedStore, StorageEvent,
};

// Re-export token lifecycle
pub use token::{
    RefreshCoordinator, RefreshOutcome, RefreshState, RefreshStateCell, RequestGate, TokenStore,
    UnauthorizedHook,
};

// Re-export bindings
pub use binding::{needs_refresh, BindingHandle, BindingManager, BindingSet, ReleaseHandle};

// Re-export signalling
pub use signal::LogoutSignal;

// Re-export telemetry
pub use telemetry::{
    metric_names, no_op_metrics, InMemoryMetrics, MetricEntry, MetricLabels, NoOpMetrics,
    SessionMetrics,
};
