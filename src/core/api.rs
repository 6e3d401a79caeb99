//! Protected APIs
//!
//! Adapter interface over the API client instances a session protects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::ReleaseHandle;
use crate::error::GateError;
use crate::token::{RefreshOutcome, RequestGate, UnauthorizedHook};

/// An API client whose requests carry the session token.
///
/// Implement this for each client library (or a thin wrapper around a client
/// instance). The session sets and clears the auth header and installs two
/// interceptors; the returned [`ReleaseHandle`]s must remove them again.
///
/// These methods and the release actions run while the session holds its
/// binding lock. They may read the token ([`crate::TokenStore::get`],
/// `JwtSession::get_token`) but must not synchronously call session
/// operations that take the binding lock (`has_active_bindings`, `shutdown`,
/// dropping the session); doing so deadlocks. Hand such work, and any call
/// to `login`, `logout` or `refresh_token`, to a spawned task instead.
pub trait ProtectedApi: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Set the auth header value. An empty string clears it.
    fn set_auth_header(&self, value: &str);

    /// Install a before-request interceptor that awaits
    /// [`RequestGate::await_usable_token`] and applies the result.
    fn set_refreshing_interceptor(&self, gate: RequestGate) -> ReleaseHandle;

    /// Install an interceptor that calls [`UnauthorizedHook::trigger`] when a
    /// response comes back unauthorized.
    fn set_unauthorized_interceptor(&self, hook: UnauthorizedHook) -> ReleaseHandle;
}

/// Mock protected API for testing.
///
/// Records header changes and interceptor registrations, and can play the
/// part of a client sending requests through its installed interceptors.
pub struct MockProtectedApi {
    name: String,
    auth_header: Mutex<String>,
    header_history: Mutex<Vec<String>>,
    gate: Arc<Mutex<Option<RequestGate>>>,
    hook: Arc<Mutex<Option<UnauthorizedHook>>>,
    gate_installs: AtomicUsize,
    hook_installs: AtomicUsize,
    gate_releases: Arc<AtomicUsize>,
    hook_releases: Arc<AtomicUsize>,
}

impl MockProtectedApi {
    /// Create new mock API.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth_header: Mutex::new(String::new()),
            header_history: Mutex::new(Vec::new()),
            gate: Arc::new(Mutex::new(None)),
            hook: Arc::new(Mutex::new(None)),
            gate_installs: AtomicUsize::new(0),
            hook_installs: AtomicUsize::new(0),
            gate_releases: Arc::new(AtomicUsize::new(0)),
            hook_releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Current auth header, `None` when cleared.
    pub fn auth_header(&self) -> Option<String> {
        let header = self.auth_header.lock();
        (!header.is_empty()).then(|| header.clone())
    }

    /// Every value passed to `set_auth_header`, in order.
    pub fn header_history(&self) -> Vec<String> {
        self.header_history.lock().clone()
    }

    /// Number of interceptors currently installed (0 to 2).
    pub fn active_interceptors(&self) -> usize {
        usize::from(self.gate.lock().is_some()) + usize::from(self.hook.lock().is_some())
    }

    /// Number of request gate installs.
    pub fn gate_install_count(&self) -> usize {
        self.gate_installs.load(Ordering::SeqCst)
    }

    /// Number of request gate removals.
    pub fn gate_release_count(&self) -> usize {
        self.gate_releases.load(Ordering::SeqCst)
    }

    /// Number of unauthorized hook installs.
    pub fn hook_install_count(&self) -> usize {
        self.hook_installs.load(Ordering::SeqCst)
    }

    /// Number of unauthorized hook removals.
    pub fn hook_release_count(&self) -> usize {
        self.hook_releases.load(Ordering::SeqCst)
    }

    /// Send a request: pass the installed gate, then return the token the
    /// request would carry.
    pub async fn send_request(&self) -> Result<Option<String>, GateError> {
        let gate = self.gate.lock().clone();
        match gate {
            Some(gate) => Ok(gate
                .await_usable_token()
                .await?
                .map(|token_set| token_set.token().to_string())),
            None => Ok(self.auth_header()),
        }
    }

    /// Simulate an unauthorized response. Returns `None` if no hook is installed.
    pub async fn respond_unauthorized(&self) -> Option<RefreshOutcome> {
        let hook = self.hook.lock().clone();
        match hook {
            Some(hook) => Some(hook.trigger().await),
            None => None,
        }
    }
}

impl ProtectedApi for MockProtectedApi {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_auth_header(&self, value: &str) {
        *self.auth_header.lock() = value.to_string();
        self.header_history.lock().push(value.to_string());
    }

    fn set_refreshing_interceptor(&self, gate: RequestGate) -> ReleaseHandle {
        *self.gate.lock() = Some(gate);
        self.gate_installs.fetch_add(1, Ordering::SeqCst);

        let slot = Arc::clone(&self.gate);
        let releases = Arc::clone(&self.gate_releases);
        ReleaseHandle::new(move || {
            slot.lock().take();
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn set_unauthorized_interceptor(&self, hook: UnauthorizedHook) -> ReleaseHandle {
        *self.hook.lock() = Some(hook);
        self.hook_installs.fetch_add(1, Ordering::SeqCst);

        let slot = Arc::clone(&self.hook);
        let releases = Arc::clone(&self.hook_releases);
        ReleaseHandle::new(move || {
            slot.lock().take();
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }
}
