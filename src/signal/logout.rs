//! Cross-Instance Logout Signal
//!
//! Publishes a logout marker to the shared store and reacts when another
//! instance publishes one.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::core::{SharedStore, StorageEvent};
use crate::error::SignalError;

/// Logout marker shared between session instances.
#[derive(Clone)]
pub struct LogoutSignal {
    store: Arc<dyn SharedStore>,
    key: String,
    instance_id: Uuid,
    last_published: Arc<Mutex<Option<String>>>,
}

impl LogoutSignal {
    /// Create new signal writing `key` on behalf of `instance_id`.
    pub fn new(store: Arc<dyn SharedStore>, key: impl Into<String>, instance_id: Uuid) -> Self {
        Self {
            store,
            key: key.into(),
            instance_id,
            last_published: Arc::new(Mutex::new(None)),
        }
    }

    /// Marker key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the marker with the current timestamp in milliseconds.
    pub async fn publish(&self) -> Result<(), SignalError> {
        let stamp = Utc::now().timestamp_millis().to_string();
        *self.last_published.lock() = Some(stamp.clone());
        self.store.set(&self.key, stamp, self.instance_id).await?;
        debug!(key = %self.key, "logout marker published");
        Ok(())
    }

    /// Check if `event` is a logout marker written by another instance.
    pub fn is_remote_logout(&self, event: &StorageEvent) -> bool {
        event.key == self.key && event.source != self.instance_id
    }

    /// Check if a marker value read back from the store is a logout that
    /// this listener has not handled yet.
    ///
    /// The value must differ from the last marker seen and from this
    /// instance's own last write, and must be stamped no earlier than
    /// `since` (milliseconds), so markers left over from before the
    /// listener started are ignored.
    fn is_unseen_remote_marker(&self, value: Option<&str>, last_seen: Option<&str>, since: i64) -> bool {
        let Some(value) = value else {
            return false;
        };
        if Some(value) == last_seen || Some(value) == self.last_published.lock().as_deref() {
            return false;
        }
        value
            .trim()
            .parse::<i64>()
            .is_ok_and(|stamp| stamp >= since)
    }

    /// Run `on_remote_logout` for every marker written by another instance
    /// until `cancel` fires or the store goes away.
    ///
    /// The subscription is taken before this returns, so markers written
    /// afterwards are never missed. If the listener falls behind and events
    /// are dropped, the marker is read back from the store instead.
    pub fn listen<F, Fut>(&self, mut on_remote_logout: F, cancel: CancellationToken) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut events = self.store.subscribe();
        let signal = self.clone();
        let since = Utc::now().timestamp_millis();

        tokio::spawn(async move {
            let mut last_seen: Option<String> = None;

            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(event) if event.key == signal.key => {
                        last_seen = event.value.clone();
                        if signal.is_remote_logout(&event) {
                            debug!(key = %signal.key, source = %event.source, "remote logout observed");
                            on_remote_logout().await;
                        }
                    }
                    Ok(event) => {
                        trace!(key = %event.key, "ignoring shared store event");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "shared store events dropped, re-reading logout marker");
                        let value = match signal.store.get(&signal.key).await {
                            Ok(value) => value,
                            Err(e) => {
                                warn!(error = %e, "failed to read logout marker");
                                continue;
                            }
                        };

                        let missed =
                            signal.is_unseen_remote_marker(value.as_deref(), last_seen.as_deref(), since);
                        last_seen = value;
                        if missed {
                            debug!(key = %signal.key, "remote logout recovered from store");
                            on_remote_logout().await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("logout listener stopped");
        })
    }
}
