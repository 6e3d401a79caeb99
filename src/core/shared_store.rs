//! Shared Store
//!
//! Key/value surface visible to every session instance of an application
//! (for example one per browser tab or per process), with change events.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::SignalError;

/// Capacity of the change event channel.
const EVENT_CAPACITY: usize = 64;

/// Change notification for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed.
    pub key: String,
    /// New value, `None` when removed.
    pub value: Option<String>,
    /// Instance that wrote the change.
    pub source: Uuid,
}

/// Shared key/value store interface.
///
/// Every subscriber, including the writer, receives an event for each write.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Write `value` under `key` on behalf of instance `source`.
    async fn set(&self, key: &str, value: String, source: Uuid) -> Result<(), SignalError>;

    /// Read the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, SignalError>;

    /// Subscribe to change events.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// In-process shared store. Share one instance via `Arc` between sessions.
pub struct InMemorySharedStore {
    values: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl InMemorySharedStore {
    /// Create new empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            events,
        }
    }
}

impl Default for InMemorySharedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for InMemorySharedStore {
    async fn set(&self, key: &str, value: String, source: Uuid) -> Result<(), SignalError> {
        self.values.write().insert(key.to_string(), value.clone());

        // No subscribers is not an error.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            value: Some(value),
            source,
        });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SignalError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_and_notify() {
        let store = InMemorySharedStore::new();
        let mut events = store.subscribe();
        let source = Uuid::new_v4();

        store.set("logout", "1700000000000".to_string(), source).await.unwrap();

        assert_eq!(
            store.get("logout").await.unwrap().as_deref(),
            Some("1700000000000")
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event.key, "logout");
        assert_eq!(event.value.as_deref(), Some("1700000000000"));
        assert_eq!(event.source, source);
    }

    #[tokio::test]
    async fn test_set_without_subscribers() {
        let store = InMemorySharedStore::new();
        assert!(store.set("k", "v".to_string(), Uuid::new_v4()).await.is_ok());
    }
}
