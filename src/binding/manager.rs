//! Binding Manager
//!
//! Attaches the auth header, the request gate and the unauthorized hook to
//! every protected API, and swaps the whole binding set atomically whenever
//! the token changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::binding::expiry::spawn_expiry_checker;
use crate::binding::{BindingHandle, BindingSet};
use crate::core::ProtectedApi;
use crate::error::BindingError;
use crate::telemetry::SessionMetrics;
use crate::token::{RefreshCoordinator, RefreshStateCell, RequestGate, TokenStore, UnauthorizedHook};
use crate::types::{SessionConfig, TokenSet};

/// Owner of the session's current binding set.
///
/// The binding set and the token store are only changed while holding this
/// manager's lock, so a rebind can never interleave with a logout.
pub struct BindingManager {
    apis: Vec<Arc<dyn ProtectedApi>>,
    tokens: Arc<TokenStore>,
    state: Arc<RefreshStateCell>,
    config: SessionConfig,
    metrics: Arc<dyn SessionMetrics>,
    current: Mutex<Option<BindingSet>>,
    next_id: AtomicU64,
}

impl BindingManager {
    /// Create new binding manager for `apis`.
    pub fn new(
        apis: Vec<Arc<dyn ProtectedApi>>,
        tokens: Arc<TokenStore>,
        state: Arc<RefreshStateCell>,
        config: SessionConfig,
        metrics: Arc<dyn SessionMetrics>,
    ) -> Self {
        Self {
            apis,
            tokens,
            state,
            config,
            metrics,
            current: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Update the token store with `update` and, if it agrees, rebind every
    /// protected API to the resulting token.
    ///
    /// The previous binding set is fully released before the new one is
    /// installed. Returns `Ok(false)` when `update` declined. Binding with no
    /// token present is a programming error and yields
    /// [`BindingError::MissingToken`], leaving the current bindings in place.
    pub fn bind(
        &self,
        coordinator: &Weak<RefreshCoordinator>,
        update: impl FnOnce(&TokenStore) -> bool,
    ) -> Result<bool, BindingError> {
        let mut current = self.current.lock();

        if !update(&self.tokens) {
            return Ok(false);
        }

        let Some(token_set) = self.tokens.get() else {
            error!("attempted to bind protected APIs without a token");
            return Err(BindingError::MissingToken);
        };

        if let Some(previous) = current.take() {
            self.release(&previous);
        }

        let set = self.install(&token_set, coordinator);
        self.metrics.record_bind(set.len());
        *current = Some(set);
        Ok(true)
    }

    /// Release the current binding set if `approve` agrees.
    ///
    /// `approve` runs under the manager's lock and may mutate the token store.
    /// Returns whether it approved; a missing binding set is not an error.
    pub fn unbind_where(&self, approve: impl FnOnce(&TokenStore) -> bool) -> bool {
        let mut current = self.current.lock();

        if !approve(&self.tokens) {
            return false;
        }

        if let Some(previous) = current.take() {
            self.release(&previous);
        }
        true
    }

    /// Release the current binding set. Returns `false` if nothing was bound.
    pub fn unbind(&self) -> bool {
        match self.current.lock().take() {
            Some(previous) => {
                self.release(&previous);
                true
            }
            None => false,
        }
    }

    /// Check if a binding set is installed.
    pub fn is_bound(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Sequence number of the installed binding set.
    pub fn current_id(&self) -> Option<u64> {
        self.current.lock().as_ref().map(BindingSet::id)
    }

    /// Protected APIs managed by this session.
    pub fn apis(&self) -> &[Arc<dyn ProtectedApi>] {
        &self.apis
    }

    /// New request gate over this session's token and refresh state.
    pub fn request_gate(&self) -> RequestGate {
        RequestGate::new(
            self.state.subscribe(),
            Arc::clone(&self.tokens),
            self.config.refresh_delay_interval,
            self.config.request_gate_timeout,
        )
    }

    fn install(&self, token_set: &TokenSet, coordinator: &Weak<RefreshCoordinator>) -> BindingSet {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let gate = self.request_gate();
        let hook = UnauthorizedHook::new(coordinator.clone());

        let handles = self
            .apis
            .iter()
            .map(|api| {
                api.set_auth_header(token_set.token());
                let gate_release = api.set_refreshing_interceptor(gate.clone());
                let hook_release = api.set_unauthorized_interceptor(hook.clone());
                debug!(api = api.name(), binding_set = id, "protected API bound");
                BindingHandle::new(Arc::clone(api), gate_release, hook_release)
            })
            .collect();

        let checker = CancellationToken::new();
        spawn_expiry_checker(
            coordinator.clone(),
            Arc::clone(&self.tokens),
            self.config.refresh_check_interval,
            checker.clone(),
        );

        BindingSet::new(id, handles, checker)
    }

    fn release(&self, set: &BindingSet) {
        if set.release() {
            self.metrics.record_unbind(set.len());
        }
    }
}

impl Drop for BindingManager {
    fn drop(&mut self) {
        self.unbind();
    }
}
