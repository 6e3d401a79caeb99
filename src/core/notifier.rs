//! Re-authentication Notifier
//!
//! Tells the application that the user has to sign in again.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Re-authentication notification interface.
pub trait ReauthNotifier: Send + Sync {
    /// Send the user to the login page.
    fn redirect_to_login(&self);
}

impl<F> ReauthNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}

/// Mock notifier for testing.
#[derive(Default)]
pub struct MockReauthNotifier {
    redirects: AtomicUsize,
}

impl MockReauthNotifier {
    /// Create new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of redirects requested.
    pub fn redirect_count(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl ReauthNotifier for MockReauthNotifier {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_notifier() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        };

        notifier.redirect_to_login();
        notifier.redirect_to_login();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
