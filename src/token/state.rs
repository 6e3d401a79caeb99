//! Refresh State
//!
//! Process-wide refresh flag with an atomic check-and-set and change
//! notification for gated requests.

use tokio::sync::watch;

/// Whether a refresh is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// No refresh in progress.
    Idle,
    /// A refresh is in progress.
    Refreshing,
}

/// Holder of the session's refresh state.
pub struct RefreshStateCell {
    tx: watch::Sender<RefreshState>,
}

impl RefreshStateCell {
    /// Create new cell in the `Idle` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RefreshState::Idle);
        Self { tx }
    }

    /// Current state.
    pub fn current(&self) -> RefreshState {
        *self.tx.borrow()
    }

    /// Check if a refresh is running.
    pub fn is_refreshing(&self) -> bool {
        self.current() == RefreshState::Refreshing
    }

    /// Move from `Idle` to `Refreshing`.
    ///
    /// Returns `None` if a refresh is already running. The returned guard
    /// moves the state back to `Idle` when dropped.
    pub fn try_begin(&self) -> Option<RefreshGuard<'_>> {
        let began = self.tx.send_if_modified(|state| {
            if *state == RefreshState::Idle {
                *state = RefreshState::Refreshing;
                true
            } else {
                false
            }
        });

        began.then(|| RefreshGuard { tx: &self.tx })
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.tx.subscribe()
    }
}

impl Default for RefreshStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the state to `Idle` on drop, whatever the refresh outcome.
pub struct RefreshGuard<'a> {
    tx: &'a watch::Sender<RefreshState>,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_replace(RefreshState::Idle);
    }
}
