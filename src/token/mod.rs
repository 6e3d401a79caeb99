//! Token Lifecycle
//!
//! Token storage, refresh coordination and request gating.
//!
//! This module provides:
//!
//! - **Token Store**: the session's current token set
//! - **Refresh State**: the single-flight refresh flag
//! - **Request Gate**: holds requests back while a refresh runs
//! - **Refresh Coordinator**: runs refreshes and rebinds protected APIs

pub mod gate;
pub mod refresh;
pub mod state;
pub mod store;

pub use gate::RequestGate;
pub use refresh::{RefreshCoordinator, RefreshOutcome, UnauthorizedHook};
pub use state::{RefreshGuard, RefreshState, RefreshStateCell};
pub use store::TokenStore;
