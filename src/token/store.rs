//! Token Store
//!
//! Holds the current token set of a session.

use parking_lot::RwLock;

use crate::types::TokenSet;

#[derive(Default)]
struct Slot {
    token_set: Option<TokenSet>,
    epoch: u64,
}

/// Single source of truth for the session's token set.
///
/// Every `set` or `clear` starts a new epoch. A refresh records the epoch it
/// started in and only lands its result if no login or logout happened since.
#[derive(Default)]
pub struct TokenStore {
    slot: RwLock<Slot>,
}

impl TokenStore {
    /// Create new empty token store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token set, starting a new epoch.
    pub fn set(&self, token_set: TokenSet) {
        let mut slot = self.slot.write();
        slot.token_set = Some(token_set);
        slot.epoch += 1;
    }

    /// Remove the token set, starting a new epoch.
    pub fn clear(&self) {
        let mut slot = self.slot.write();
        slot.token_set = None;
        slot.epoch += 1;
    }

    /// Get the current token set.
    pub fn get(&self) -> Option<TokenSet> {
        self.slot.read().token_set.clone()
    }

    /// Check if a token set is present.
    pub fn is_present(&self) -> bool {
        self.slot.read().token_set.is_some()
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.slot.read().epoch
    }

    /// Replace the token set if the store is still in `epoch`.
    ///
    /// Returns `false`, leaving the store untouched, when a login or logout
    /// happened in between.
    pub fn replace_if_current(&self, epoch: u64, token_set: TokenSet) -> bool {
        let mut slot = self.slot.write();
        if slot.epoch != epoch {
            return false;
        }
        slot.token_set = Some(token_set);
        true
    }
}
