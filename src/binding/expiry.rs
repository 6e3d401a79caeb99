//! Proactive Expiry Check
//!
//! Periodically refreshes the token before it runs out.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::token::{RefreshCoordinator, TokenStore};
use crate::types::TokenSet;

/// Check if the token is missing or expires within one check interval.
pub fn needs_refresh(
    token_set: Option<&TokenSet>,
    check_interval: Duration,
    now: DateTime<Utc>,
) -> bool {
    match token_set {
        Some(token_set) => token_set.expires_within(check_interval, now),
        None => true,
    }
}

/// Run the expiry check every `interval` until `cancel` fires.
///
/// The first check happens one interval after start. A refresh is spawned on
/// its own task so that the rebinding it performs, which cancels this
/// checker, cannot cut the refresh short.
pub(crate) fn spawn_expiry_checker(
    coordinator: Weak<RefreshCoordinator>,
    tokens: Arc<TokenStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !needs_refresh(tokens.get().as_ref(), interval, Utc::now()) {
                trace!("token not near expiry");
                continue;
            }

            let Some(coordinator) = coordinator.upgrade() else {
                break;
            };
            debug!("token near expiry, triggering refresh");
            drop(coordinator.spawn_refresh());
        }

        trace!("expiry checker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const CHECK_INTERVAL: Duration = Duration::from_millis(60_000);

    #[test]
    fn test_missing_token_needs_refresh() {
        assert!(needs_refresh(None, CHECK_INTERVAL, Utc::now()));
    }

    #[test]
    fn test_token_expiring_within_interval_needs_refresh() {
        let now = Utc::now();
        let token_set = TokenSet::new("t", now + ChronoDuration::milliseconds(30_000));
        assert!(needs_refresh(Some(&token_set), CHECK_INTERVAL, now));
    }

    #[test]
    fn test_token_expiring_later_does_not_need_refresh() {
        let now = Utc::now();
        let token_set = TokenSet::new("t", now + ChronoDuration::milliseconds(120_000));
        assert!(!needs_refresh(Some(&token_set), CHECK_INTERVAL, now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = spawn_expiry_checker(
            Weak::new(),
            Arc::new(TokenStore::new()),
            CHECK_INTERVAL,
            cancel.clone(),
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_exits_when_session_is_gone() {
        let handle = spawn_expiry_checker(
            Weak::new(),
            Arc::new(TokenStore::new()),
            CHECK_INTERVAL,
            CancellationToken::new(),
        );

        tokio::time::sleep(CHECK_INTERVAL + Duration::from_secs(1)).await;
        assert!(handle.is_finished());
    }
}
