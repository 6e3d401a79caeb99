//! Release Handles
//!
//! Capabilities that undo a binding. Each releases at most once, no matter
//! how often it is invoked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::ProtectedApi;

type ReleaseAction = Box<dyn FnOnce() + Send>;

/// Undoes one interceptor registration.
pub struct ReleaseHandle {
    action: Mutex<Option<ReleaseAction>>,
}

impl ReleaseHandle {
    /// Create handle that runs `action` on first release.
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// Create handle with nothing to undo.
    pub fn noop() -> Self {
        Self {
            action: Mutex::new(None),
        }
    }

    /// Run the release action. Returns `false` if it already ran.
    pub fn release(&self) -> bool {
        let action = self.action.lock().take();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Check if nothing is left to release.
    pub fn is_released(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Wiring attached to one protected API for the lifetime of one token set.
pub struct BindingHandle {
    api: Arc<dyn ProtectedApi>,
    gate: ReleaseHandle,
    unauthorized: ReleaseHandle,
    released: AtomicBool,
}

impl BindingHandle {
    pub(crate) fn new(
        api: Arc<dyn ProtectedApi>,
        gate: ReleaseHandle,
        unauthorized: ReleaseHandle,
    ) -> Self {
        Self {
            api,
            gate,
            unauthorized,
            released: AtomicBool::new(false),
        }
    }

    /// Clear the auth header and remove both interceptors.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.api.set_auth_header("");
        self.gate.release();
        self.unauthorized.release();
        debug!(api = self.api.name(), "protected API unbound");
        true
    }

    /// Check if this binding was released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// All bindings of a session plus its expiry checker, released as one.
pub struct BindingSet {
    id: u64,
    handles: Vec<BindingHandle>,
    checker: CancellationToken,
    released: AtomicBool,
}

impl BindingSet {
    pub(crate) fn new(id: u64, handles: Vec<BindingHandle>, checker: CancellationToken) -> Self {
        Self {
            id,
            handles,
            checker,
            released: AtomicBool::new(false),
        }
    }

    /// Sequence number of this set within its session.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of bound APIs.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if no API is bound.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop the expiry checker and release every API binding.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.checker.cancel();
        for handle in &self.handles {
            handle.release();
        }
        debug!(binding_set = self.id, apis = self.handles.len(), "binding set released");
        true
    }

    /// Check if this set was released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for BindingSet {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_release_handle_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = {
            let calls = Arc::clone(&calls);
            ReleaseHandle::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(!handle.is_released());
        assert!(handle.release());
        assert!(!handle.release());
        assert!(handle.is_released());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_handle() {
        let handle = ReleaseHandle::noop();
        assert!(handle.is_released());
        assert!(!handle.release());
    }

    #[test]
    fn test_binding_set_cancels_checker_once() {
        let checker = CancellationToken::new();
        let set = BindingSet::new(1, Vec::new(), checker.clone());

        assert!(set.release());
        assert!(checker.is_cancelled());
        assert!(!set.release());
        assert!(set.is_released());
    }

    #[test]
    fn test_binding_set_released_on_drop() {
        let checker = CancellationToken::new();
        drop(BindingSet::new(7, Vec::new(), checker.clone()));
        assert!(checker.is_cancelled());
    }
}
