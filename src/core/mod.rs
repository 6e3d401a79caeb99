//! Collaborators
//!
//! Interfaces the session drives but does not implement: the authentication
//! backend, the protected API clients, the re-authentication notifier and the
//! cross-instance shared store.

pub mod api;
pub mod backend;
pub mod notifier;
pub mod shared_store;

pub use api::*;
pub use backend::*;
pub use notifier::*;
pub use shared_store::*;
