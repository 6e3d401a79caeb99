//! JWT Session
//!
//! Public surface combining the token store, refresh coordination, protected
//! API bindings and cross-instance logout.

use std::sync::Arc;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::binding::BindingManager;
use crate::builders::SessionConfigBuilder;
use crate::core::{AuthBackend, InMemorySharedStore, ProtectedApi, ReauthNotifier, SharedStore};
use crate::error::{ConfigurationError, SessionError, SessionResult};
use crate::signal::LogoutSignal;
use crate::telemetry::{NoOpMetrics, SessionMetrics};
use crate::token::{RefreshCoordinator, RefreshOutcome, RefreshStateCell, RequestGate, TokenStore};
use crate::types::{SessionConfig, TokenSet};

/// Session for a JWT-authenticated application.
///
/// Must be built inside a tokio runtime: the cross-instance logout listener
/// and the proactive expiry check run as tokio tasks.
pub struct JwtSession {
    config: SessionConfig,
    instance_id: Uuid,
    tokens: Arc<TokenStore>,
    bindings: Arc<BindingManager>,
    coordinator: Arc<RefreshCoordinator>,
    backend: Arc<dyn AuthBackend>,
    notifier: Arc<dyn ReauthNotifier>,
    metrics: Arc<dyn SessionMetrics>,
    signal: LogoutSignal,
    listener: CancellationToken,
}

impl JwtSession {
    /// Create a session builder.
    pub fn builder() -> JwtSessionBuilder {
        JwtSessionBuilder::new()
    }

    /// Register a new account, then send the user to the login page.
    pub async fn signup(&self, email: &str, password: &SecretString) -> SessionResult<()> {
        self.backend.signup(email, password).await?;
        info!("account created, redirecting to login");
        self.notifier.redirect_to_login();
        Ok(())
    }

    /// Sign in and bind every protected API to the issued token.
    ///
    /// On failure the session is left as it was.
    pub async fn login(&self, email: &str, password: &SecretString) -> SessionResult<()> {
        let token_set = match self.backend.login(email, password).await {
            Ok(token_set) => token_set,
            Err(e) => {
                self.metrics.record_login(false);
                warn!(error = %e, "login failed");
                return Err(e.into());
            }
        };

        self.coordinator.seed(token_set)?;
        self.metrics.record_login(true);
        Ok(())
    }

    /// Sign out of this instance and every other instance sharing the store.
    ///
    /// Local state is torn down first and the server is always notified; the
    /// first error encountered is returned.
    pub async fn logout(&self) -> SessionResult<()> {
        self.coordinator.teardown();

        let published = self.signal.publish().await;
        if let Err(e) = &published {
            warn!(error = %e, "failed to publish logout marker");
        }

        let result = self.backend.logout().await;
        self.metrics.record_logout(false);
        info!("logged out");

        published?;
        result?;
        Ok(())
    }

    /// Trigger a refresh by hand.
    ///
    /// Follows the same single-flight rules as the automatic triggers and
    /// never returns an error: a failed refresh tears the session down and
    /// redirects to login.
    pub async fn refresh_token(&self) -> RefreshOutcome {
        match Arc::clone(&self.coordinator).spawn_refresh().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "refresh task did not complete");
                RefreshOutcome::Failed
            }
        }
    }

    /// Current token set, if signed in.
    pub fn get_token(&self) -> Option<TokenSet> {
        self.tokens.get()
    }

    /// Check if a refresh is running.
    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    /// Check if the protected APIs are currently bound.
    pub fn has_active_bindings(&self) -> bool {
        self.bindings.is_bound()
    }

    /// Request gate for requests made outside the protected APIs.
    pub fn request_gate(&self) -> RequestGate {
        self.bindings.request_gate()
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Metrics sink.
    pub fn metrics(&self) -> Arc<dyn SessionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Identifier of this instance on the shared store.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Stop listening for remote logouts, release every binding and forget
    /// the token. Nothing is sent to the backend.
    pub fn shutdown(&self) {
        if self.listener.is_cancelled() {
            return;
        }
        self.listener.cancel();
        self.coordinator.teardown();
        debug!(instance = %self.instance_id, "session shut down");
    }
}

impl Drop for JwtSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`JwtSession`].
pub struct JwtSessionBuilder {
    backend: Option<Arc<dyn AuthBackend>>,
    notifier: Option<Arc<dyn ReauthNotifier>>,
    apis: Vec<Arc<dyn ProtectedApi>>,
    shared_store: Option<Arc<dyn SharedStore>>,
    metrics: Option<Arc<dyn SessionMetrics>>,
    config: SessionConfig,
}

impl Default for JwtSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtSessionBuilder {
    /// Create new session builder.
    pub fn new() -> Self {
        Self {
            backend: None,
            notifier: None,
            apis: Vec::new(),
            shared_store: None,
            metrics: None,
            config: SessionConfig::default(),
        }
    }

    /// Set authentication backend.
    pub fn backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set re-authentication notifier.
    pub fn notifier(mut self, notifier: Arc<dyn ReauthNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Add a protected API.
    pub fn protected_api(mut self, api: Arc<dyn ProtectedApi>) -> Self {
        self.apis.push(api);
        self
    }

    /// Add several protected APIs.
    pub fn protected_apis(mut self, apis: impl IntoIterator<Item = Arc<dyn ProtectedApi>>) -> Self {
        self.apis.extend(apis);
        self
    }

    /// Set the store shared with other instances. Defaults to a private
    /// in-memory store.
    pub fn shared_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.shared_store = Some(store);
        self
    }

    /// Set metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn SessionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the session and start listening for remote logouts.
    pub fn build(self) -> SessionResult<JwtSession> {
        let backend = self.backend.ok_or_else(|| missing("backend"))?;
        let notifier = self.notifier.ok_or_else(|| missing("notifier"))?;
        let config = SessionConfigBuilder::from(self.config).build()?;
        let store = self
            .shared_store
            .unwrap_or_else(|| Arc::new(InMemorySharedStore::new()) as Arc<dyn SharedStore>);
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(NoOpMetrics) as Arc<dyn SessionMetrics>);

        let instance_id = Uuid::new_v4();
        let tokens = Arc::new(TokenStore::new());
        let state = Arc::new(RefreshStateCell::new());
        let bindings = Arc::new(BindingManager::new(
            self.apis,
            Arc::clone(&tokens),
            Arc::clone(&state),
            config.clone(),
            Arc::clone(&metrics),
        ));
        let coordinator = RefreshCoordinator::new(
            state,
            Arc::clone(&tokens),
            Arc::clone(&bindings),
            Arc::clone(&backend),
            Arc::clone(&notifier),
            Arc::clone(&metrics),
        );

        let signal = LogoutSignal::new(store, config.logout_marker_key.clone(), instance_id);
        let listener = CancellationToken::new();
        spawn_remote_logout_listener(
            &signal,
            &coordinator,
            Arc::clone(&backend),
            Arc::clone(&metrics),
            listener.clone(),
        );

        debug!(
            instance = %instance_id,
            apis = bindings.apis().len(),
            "session created"
        );

        Ok(JwtSession {
            config,
            instance_id,
            tokens,
            bindings,
            coordinator,
            backend,
            notifier,
            metrics,
            signal,
            listener,
        })
    }
}

fn missing(field: &str) -> SessionError {
    ConfigurationError::MissingRequired {
        field: field.to_string(),
    }
    .into()
}

fn spawn_remote_logout_listener(
    signal: &LogoutSignal,
    coordinator: &Arc<RefreshCoordinator>,
    backend: Arc<dyn AuthBackend>,
    metrics: Arc<dyn SessionMetrics>,
    cancel: CancellationToken,
) {
    let coordinator = Arc::downgrade(coordinator);

    signal.listen(
        move || {
            let coordinator = coordinator.clone();
            let backend = Arc::clone(&backend);
            let metrics = Arc::clone(&metrics);
            async move {
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.teardown();
                }
                if let Err(e) = backend.logout().await {
                    warn!(error = %e, "backend logout after remote logout failed");
                }
                metrics.record_logout(true);
                info!("logged out by another instance");
            }
        },
        cancel,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MockAuthBackend, MockProtectedApi, MockReauthNotifier};
    use crate::error::BackendError;
    use crate::telemetry::{metric_names, InMemoryMetrics};

    fn password() -> SecretString {
        SecretString::new("hunter2".to_string())
    }

    #[tokio::test]
    async fn test_build_requires_backend() {
        let result = JwtSession::builder()
            .notifier(Arc::new(MockReauthNotifier::new()))
            .build();

        assert!(matches!(
            result,
            Err(SessionError::Configuration(ConfigurationError::MissingRequired { ref field }))
                if field == "backend"
        ));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_interval() {
        let config = SessionConfig {
            refresh_delay_interval: std::time::Duration::ZERO,
            ..SessionConfig::default()
        };

        let result = JwtSession::builder()
            .backend(Arc::new(MockAuthBackend::new()))
            .notifier(Arc::new(MockReauthNotifier::new()))
            .config(config)
            .build();

        assert!(matches!(
            result,
            Err(SessionError::Configuration(ConfigurationError::ZeroInterval { .. }))
        ));
    }

    #[tokio::test]
    async fn test_signup_redirects_to_login() {
        let backend = Arc::new(MockAuthBackend::new());
        let notifier = Arc::new(MockReauthNotifier::new());
        let session = JwtSession::builder()
            .backend(backend.clone())
            .notifier(notifier.clone())
            .build()
            .unwrap();

        session.signup("a@example.com", &password()).await.unwrap();

        assert_eq!(backend.signup_history(), vec!["a@example.com".to_string()]);
        assert_eq!(notifier.redirect_count(), 1);
        assert!(session.get_token().is_none());
    }

    #[tokio::test]
    async fn test_failed_signup_does_not_redirect() {
        let backend = Arc::new(MockAuthBackend::new());
        backend.set_signup_error(BackendError::Rejected {
            status: 409,
            message: "exists".to_string(),
        });
        let notifier = Arc::new(MockReauthNotifier::new());
        let session = JwtSession::builder()
            .backend(backend)
            .notifier(notifier.clone())
            .build()
            .unwrap();

        assert!(session.signup("a@example.com", &password()).await.is_err());
        assert_eq!(notifier.redirect_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_untouched() {
        let backend = Arc::new(MockAuthBackend::new());
        backend.queue_login(Err(BackendError::Unauthorized {
            message: "bad password".to_string(),
        }));
        let api = Arc::new(MockProtectedApi::new("users"));
        let metrics = Arc::new(InMemoryMetrics::new());
        let session = JwtSession::builder()
            .backend(backend)
            .notifier(Arc::new(MockReauthNotifier::new()))
            .protected_api(api.clone())
            .metrics(metrics.clone())
            .build()
            .unwrap();

        let err = session.login("a@example.com", &password()).await.unwrap_err();

        assert!(err.needs_reauth());
        assert!(session.get_token().is_none());
        assert!(!session.has_active_bindings());
        assert_eq!(api.auth_header(), None);
        assert_eq!(
            metrics.count_labeled(metric_names::LOGINS, "success", "false"),
            1
        );
    }

    #[tokio::test]
    async fn test_logout_returns_backend_error_after_teardown() {
        let backend = Arc::new(MockAuthBackend::new());
        let api = Arc::new(MockProtectedApi::new("users"));
        let session = JwtSession::builder()
            .backend(backend.clone())
            .notifier(Arc::new(MockReauthNotifier::new()))
            .protected_api(api.clone())
            .build()
            .unwrap();

        session.login("a@example.com", &password()).await.unwrap();
        backend.set_logout_error(BackendError::ConnectionFailed {
            message: "offline".to_string(),
        });

        assert!(matches!(
            session.logout().await,
            Err(SessionError::Backend(BackendError::ConnectionFailed { .. }))
        ));
        assert!(session.get_token().is_none());
        assert!(!session.has_active_bindings());
        assert_eq!(api.auth_header(), None);
        assert_eq!(backend.logout_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_bindings() {
        let api = Arc::new(MockProtectedApi::new("users"));
        let session = JwtSession::builder()
            .backend(Arc::new(MockAuthBackend::new()))
            .notifier(Arc::new(MockReauthNotifier::new()))
            .protected_api(api.clone())
            .build()
            .unwrap();

        session.login("a@example.com", &password()).await.unwrap();
        assert_eq!(api.active_interceptors(), 2);

        session.shutdown();
        session.shutdown();

        assert_eq!(api.active_interceptors(), 0);
        assert!(session.get_token().is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_bindings() {
        let api = Arc::new(MockProtectedApi::new("users"));
        {
            let session = JwtSession::builder()
                .backend(Arc::new(MockAuthBackend::new()))
                .notifier(Arc::new(MockReauthNotifier::new()))
                .protected_api(api.clone())
                .build()
                .unwrap();
            session.login("a@example.com", &password()).await.unwrap();
        }

        assert_eq!(api.active_interceptors(), 0);
        assert_eq!(api.auth_header(), None);
    }
}
