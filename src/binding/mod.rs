//! Bindings
//!
//! Per-API wiring (auth header, request gate, unauthorized hook) and the
//! periodic expiry check that lives alongside it.

pub mod expiry;
pub mod handle;
pub mod manager;

pub use expiry::needs_refresh;
pub use handle::{BindingHandle, BindingSet, ReleaseHandle};
pub use manager::BindingManager;
