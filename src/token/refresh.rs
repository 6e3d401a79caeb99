//! Refresh Coordinator
//!
//! Single-flight token refresh. On success every protected API is rebound
//! with the new token; on failure all bindings are released and the user is
//! sent back to the login page.

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::binding::BindingManager;
use crate::core::{AuthBackend, ReauthNotifier};
use crate::error::BindingError;
use crate::telemetry::SessionMetrics;
use crate::token::{RefreshStateCell, TokenStore};
use crate::types::TokenSet;

/// Result of a refresh trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This trigger ran the refresh and all APIs were rebound.
    Refreshed,
    /// This trigger ran the refresh and it failed; bindings were released.
    Failed,
    /// Another refresh was already running; this trigger did nothing.
    AlreadyInProgress,
    /// The refresh finished after a login or logout and its result was dropped.
    Superseded,
    /// The session no longer exists.
    SessionClosed,
}

/// Coordinates refreshes for one session.
pub struct RefreshCoordinator {
    this: Weak<RefreshCoordinator>,
    state: Arc<RefreshStateCell>,
    tokens: Arc<TokenStore>,
    bindings: Arc<BindingManager>,
    backend: Arc<dyn AuthBackend>,
    notifier: Arc<dyn ReauthNotifier>,
    metrics: Arc<dyn SessionMetrics>,
}

impl RefreshCoordinator {
    /// Create new coordinator.
    pub fn new(
        state: Arc<RefreshStateCell>,
        tokens: Arc<TokenStore>,
        bindings: Arc<BindingManager>,
        backend: Arc<dyn AuthBackend>,
        notifier: Arc<dyn ReauthNotifier>,
        metrics: Arc<dyn SessionMetrics>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state,
            tokens,
            bindings,
            backend,
            notifier,
            metrics,
        })
    }

    /// Trigger a refresh.
    ///
    /// Safe to call at any time from any task. If a refresh is already running
    /// this returns [`RefreshOutcome::AlreadyInProgress`] without doing
    /// anything. Backend errors never escape: they turn into a full teardown
    /// plus a redirect to login.
    pub async fn trigger_refresh(&self) -> RefreshOutcome {
        let Some(_guard) = self.state.try_begin() else {
            debug!("refresh already in progress, ignoring trigger");
            self.metrics.record_refresh_coalesced();
            return RefreshOutcome::AlreadyInProgress;
        };

        let epoch = self.tokens.epoch();
        self.metrics.record_refresh_started();
        debug!(epoch, "refreshing token");

        match self.backend.refresh_token().await {
            Ok(token_set) => self.apply_refreshed(epoch, token_set),
            Err(e) => {
                self.metrics.record_refresh_result(false);
                if !self.bindings.unbind_where(|tokens| tokens.epoch() == epoch) {
                    debug!(error = %e, "refresh failed after session changed, ignoring");
                    return RefreshOutcome::Superseded;
                }
                warn!(error = %e, "token refresh failed, redirecting to login");
                self.notifier.redirect_to_login();
                RefreshOutcome::Failed
            }
        }
    }

    /// Run a refresh on its own task so that dropping the caller does not
    /// abandon it halfway.
    pub fn spawn_refresh(self: Arc<Self>) -> JoinHandle<RefreshOutcome> {
        tokio::spawn(async move { self.trigger_refresh().await })
    }

    /// Store a freshly issued token set and bind every protected API to it.
    pub fn seed(&self, token_set: TokenSet) -> Result<(), BindingError> {
        self.bindings.bind(&self.this, |tokens| {
            tokens.set(token_set);
            true
        })?;
        info!("session established");
        Ok(())
    }

    /// Release every binding and forget the token set.
    pub fn teardown(&self) -> bool {
        self.bindings.unbind_where(|tokens| {
            tokens.clear();
            true
        })
    }

    /// Check if a refresh is running.
    pub fn is_refreshing(&self) -> bool {
        self.state.is_refreshing()
    }

    /// Hook to install as a protected API's unauthorized-response interceptor.
    pub fn unauthorized_hook(&self) -> UnauthorizedHook {
        UnauthorizedHook::new(self.this.clone())
    }

    fn apply_refreshed(&self, epoch: u64, token_set: TokenSet) -> RefreshOutcome {
        let applied = self
            .bindings
            .bind(&self.this, |tokens| tokens.replace_if_current(epoch, token_set));

        match applied {
            Ok(true) => {
                self.metrics.record_refresh_result(true);
                info!("token refreshed, protected APIs rebound");
                RefreshOutcome::Refreshed
            }
            Ok(false) => {
                self.metrics.record_refresh_result(true);
                debug!("session changed during refresh, discarding refreshed token");
                RefreshOutcome::Superseded
            }
            Err(e) => {
                self.metrics.record_refresh_result(false);
                error!(error = %e, "rebinding after refresh failed");
                RefreshOutcome::Failed
            }
        }
    }
}

/// Handle given to each protected API's unauthorized-response interceptor.
///
/// Holds the coordinator weakly so an installed interceptor never keeps a
/// closed session alive.
#[derive(Clone)]
pub struct UnauthorizedHook {
    coordinator: Weak<RefreshCoordinator>,
}

impl UnauthorizedHook {
    pub(crate) fn new(coordinator: Weak<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Report an unauthorized response and trigger a refresh.
    pub async fn trigger(&self) -> RefreshOutcome {
        let Some(coordinator) = self.coordinator.upgrade() else {
            return RefreshOutcome::SessionClosed;
        };

        match coordinator.spawn_refresh().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "refresh task did not complete");
                RefreshOutcome::Failed
            }
        }
    }
}
