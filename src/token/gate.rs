//! Request Gate
//!
//! Holds outgoing requests back while a refresh is running and releases them
//! with the token that refresh produced.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::GateError;
use crate::token::{RefreshState, TokenStore};
use crate::types::TokenSet;

/// Handle given to each protected API's before-request interceptor.
#[derive(Clone)]
pub struct RequestGate {
    state: watch::Receiver<RefreshState>,
    tokens: Arc<TokenStore>,
    recheck_interval: Duration,
    timeout: Option<Duration>,
}

impl RequestGate {
    pub(crate) fn new(
        state: watch::Receiver<RefreshState>,
        tokens: Arc<TokenStore>,
        recheck_interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            state,
            tokens,
            recheck_interval,
            timeout,
        }
    }

    /// Wait until no refresh is running, then return the current token set.
    ///
    /// Resolves immediately when idle, even if no token is present. Without a
    /// configured timeout this waits for as long as the refresh takes.
    pub async fn await_usable_token(&self) -> Result<Option<TokenSet>, GateError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_until_idle())
                .await
                .map_err(|_| {
                    warn!(waited_ms = limit.as_millis() as u64, "request gate timed out");
                    GateError::Timeout { waited: limit }
                })?,
            None => self.wait_until_idle().await,
        }

        Ok(self.tokens.get())
    }

    /// Check if requests are currently being held back.
    pub fn is_holding(&self) -> bool {
        *self.state.borrow() == RefreshState::Refreshing
    }

    async fn wait_until_idle(&self) {
        let mut state = self.state.clone();
        let mut announced = false;

        loop {
            if *state.borrow_and_update() == RefreshState::Idle {
                return;
            }

            if !announced {
                debug!("refresh in progress, holding request");
                announced = true;
            }

            tokio::select! {
                changed = state.changed() => {
                    // Sender gone: the state can no longer change.
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(self.recheck_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::RefreshStateCell;
    use chrono::{Duration as ChronoDuration, Utc};

    fn token(value: &str) -> TokenSet {
        TokenSet::new(value, Utc::now() + ChronoDuration::hours(1))
    }

    fn gate(cell: &RefreshStateCell, tokens: &Arc<TokenStore>, timeout: Option<Duration>) -> RequestGate {
        RequestGate::new(
            cell.subscribe(),
            Arc::clone(tokens),
            Duration::from_millis(100),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_idle_resolves_immediately() {
        let cell = RefreshStateCell::new();
        let tokens = Arc::new(TokenStore::new());
        tokens.set(token("t1"));

        let result = gate(&cell, &tokens, None).await_usable_token().await.unwrap();
        assert_eq!(result.unwrap().token(), "t1");
    }

    #[tokio::test]
    async fn test_idle_without_token_resolves_to_none() {
        let cell = RefreshStateCell::new();
        let tokens = Arc::new(TokenStore::new());

        let result = gate(&cell, &tokens, None).await_usable_token().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refresh_and_sees_new_token() {
        let cell = Arc::new(RefreshStateCell::new());
        let tokens = Arc::new(TokenStore::new());
        tokens.set(token("t1"));

        let request_gate = gate(&cell, &tokens, None);

        let refresher = {
            let cell = Arc::clone(&cell);
            let tokens = Arc::clone(&tokens);
            tokio::spawn(async move {
                let _guard = cell.try_begin().unwrap();
                tokio::time::sleep(Duration::from_secs(2)).await;
                let epoch = tokens.epoch();
                tokens.replace_if_current(epoch, token("t2"));
            })
        };

        tokio::task::yield_now().await;
        assert!(request_gate.is_holding());

        let result = request_gate.await_usable_token().await.unwrap();
        assert_eq!(result.unwrap().token(), "t2");
        refresher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_waiters() {
        let cell = RefreshStateCell::new();
        let tokens = Arc::new(TokenStore::new());
        let _guard = cell.try_begin().unwrap();

        let result = gate(&cell, &tokens, Some(Duration::from_secs(1)))
            .await_usable_token()
            .await;

        assert_eq!(
            result.unwrap_err(),
            GateError::Timeout {
                waited: Duration::from_secs(1)
            }
        );
    }
}
