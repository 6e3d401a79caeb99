//! Session Error Types
//!
//! Error hierarchy for the session coordinator and its collaborators.

use std::time::Duration;
use thiserror::Error;

/// Root error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Request gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl SessionError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "SESSION_CONFIG",
            Self::Backend(_) => "SESSION_BACKEND",
            Self::Binding(_) => "SESSION_BINDING",
            Self::Gate(_) => "SESSION_GATE",
            Self::Signal(_) => "SESSION_SIGNAL",
            Self::Token(_) => "SESSION_TOKEN",
        }
    }

    /// Check if error requires the user to sign in again.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Backend(BackendError::Unauthorized { .. }) => true,
            Self::Binding(BindingError::MissingToken) => true,
            _ => false,
        }
    }

    /// Check if this error is a programming error rather than a runtime failure.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::Binding(BindingError::MissingToken))
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required component: {field}")]
    MissingRequired { field: String },

    #[error("Interval must be non-zero: {field}")]
    ZeroInterval { field: String },

    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvValue { name: String, value: String },
}

/// Failure reported by an authentication backend collaborator.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

/// Binding precondition error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Binding was attempted with no token present.
    #[error("Missing token: cannot bind protected APIs without a token set")]
    MissingToken,
}

/// Request gate error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Refresh still in progress after {waited:?}")]
    Timeout { waited: Duration },
}

/// Cross-instance signalling error.
#[derive(Error, Debug, Clone)]
pub enum SignalError {
    #[error("Shared store write failed for key {key}: {message}")]
    WriteFailed { key: String, message: String },
}

/// Token-related error.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    #[error("Invalid token format: {message}")]
    InvalidToken { message: String },

    #[error("Token has no expiry claim")]
    MissingExpiry,
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Get user-friendly error message.
pub fn get_user_message(error: &SessionError) -> String {
    match error {
        SessionError::Backend(BackendError::Unauthorized { .. }) => {
            "Invalid email or password.".to_string()
        }
        SessionError::Backend(BackendError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        SessionError::Backend(BackendError::ConnectionFailed { .. }) => {
            "Could not reach the authentication service. Please try again later.".to_string()
        }
        SessionError::Binding(_) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}
