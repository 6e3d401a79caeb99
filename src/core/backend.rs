//! Authentication Backend
//!
//! Network collaborator performing signup, login, logout and refresh.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::BackendError;
use crate::types::TokenSet;

/// Authentication backend interface.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Register a new account.
    async fn signup(&self, email: &str, password: &SecretString) -> Result<(), BackendError>;

    /// Exchange credentials for a token set.
    async fn login(&self, email: &str, password: &SecretString) -> Result<TokenSet, BackendError>;

    /// End the session on the server.
    async fn logout(&self) -> Result<(), BackendError>;

    /// Obtain a new token set for the current session.
    async fn refresh_token(&self) -> Result<TokenSet, BackendError>;
}

/// Mock authentication backend for testing.
///
/// Without queued responses, login and refresh succeed with a token valid for
/// one hour.
#[derive(Default)]
pub struct MockAuthBackend {
    signup_history: Mutex<Vec<String>>,
    login_history: Mutex<Vec<(String, String)>>,
    logout_count: Mutex<usize>,
    refresh_count: Mutex<usize>,
    login_responses: Mutex<VecDeque<Result<TokenSet, BackendError>>>,
    refresh_responses: Mutex<VecDeque<Result<TokenSet, BackendError>>>,
    signup_error: Mutex<Option<BackendError>>,
    logout_error: Mutex<Option<BackendError>>,
    refresh_delay: Mutex<Option<Duration>>,
}

impl MockAuthBackend {
    /// Create new mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a login response.
    pub fn queue_login(&self, response: Result<TokenSet, BackendError>) -> &Self {
        self.login_responses.lock().push_back(response);
        self
    }

    /// Queue a refresh response.
    pub fn queue_refresh(&self, response: Result<TokenSet, BackendError>) -> &Self {
        self.refresh_responses.lock().push_back(response);
        self
    }

    /// Fail the next signup.
    pub fn set_signup_error(&self, error: BackendError) -> &Self {
        *self.signup_error.lock() = Some(error);
        self
    }

    /// Fail the next logout.
    pub fn set_logout_error(&self, error: BackendError) -> &Self {
        *self.logout_error.lock() = Some(error);
        self
    }

    /// Make every refresh take `delay` before answering.
    pub fn set_refresh_delay(&self, delay: Duration) -> &Self {
        *self.refresh_delay.lock() = Some(delay);
        self
    }

    /// Emails passed to signup.
    pub fn signup_history(&self) -> Vec<String> {
        self.signup_history.lock().clone()
    }

    /// Email and password pairs passed to login.
    pub fn login_history(&self) -> Vec<(String, String)> {
        self.login_history.lock().clone()
    }

    /// Number of logout calls.
    pub fn logout_count(&self) -> usize {
        *self.logout_count.lock()
    }

    /// Number of refresh calls.
    pub fn refresh_count(&self) -> usize {
        *self.refresh_count.lock()
    }

    fn default_token(prefix: &str, n: usize) -> TokenSet {
        TokenSet::new(
            format!("{}-token-{}", prefix, n),
            Utc::now() + ChronoDuration::hours(1),
        )
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn signup(&self, email: &str, _password: &SecretString) -> Result<(), BackendError> {
        self.signup_history.lock().push(email.to_string());
        match self.signup_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn login(&self, email: &str, password: &SecretString) -> Result<TokenSet, BackendError> {
        let n = {
            let mut history = self.login_history.lock();
            history.push((email.to_string(), password.expose_secret().to_string()));
            history.len()
        };

        let queued = self.login_responses.lock().pop_front();
        queued.unwrap_or_else(|| Ok(Self::default_token("login", n)))
    }

    async fn logout(&self) -> Result<(), BackendError> {
        *self.logout_count.lock() += 1;
        match self.logout_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn refresh_token(&self) -> Result<TokenSet, BackendError> {
        let n = {
            let mut count = self.refresh_count.lock();
            *count += 1;
            *count
        };

        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.refresh_responses.lock().pop_front();
        queued.unwrap_or_else(|| Ok(Self::default_token("refreshed", n)))
    }
}
