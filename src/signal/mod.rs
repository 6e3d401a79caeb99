//! Cross-Instance Signalling
//!
//! Logout propagation between session instances sharing one store.

pub mod logout;

pub use logout::LogoutSignal;
