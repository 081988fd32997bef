//! Single-flight registry for sync runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::model::{ProviderType, UserId};

/// What a sync run refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncTarget {
    /// The newest page of the mailbox.
    Mailbox,
    /// One message.
    Message(String),
}

/// Registry key: one in-flight run per user, provider and target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    /// Owning user.
    pub user_id: UserId,
    /// Provider being synced.
    pub provider: ProviderType,
    /// What is being refreshed.
    pub target: SyncTarget,
}

impl SyncKey {
    /// Key for a mailbox sync.
    #[must_use]
    pub const fn mailbox(user_id: UserId, provider: ProviderType) -> Self {
        Self {
            user_id,
            provider,
            target: SyncTarget::Mailbox,
        }
    }

    /// Key for a single-message refresh.
    #[must_use]
    pub fn message(user_id: UserId, provider: ProviderType, message_id: impl Into<String>) -> Self {
        Self {
            user_id,
            provider,
            target: SyncTarget::Message(message_id.into()),
        }
    }
}

/// Tracks which keys are Syncing; absent keys are Idle.
#[derive(Debug, Clone, Default)]
pub struct SyncRegistry {
    in_flight: Arc<Mutex<HashSet<SyncKey>>>,
}

impl SyncRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `key` from Idle to Syncing.
    ///
    /// Returns `None` if a run for the key is already in flight.
    #[must_use]
    pub fn try_begin(&self, key: SyncKey) -> Option<SyncPermit> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| SyncPermit {
            registry: Arc::clone(&self.in_flight),
            key,
        })
    }

    /// Returns true if a run for `key` is in flight.
    #[must_use]
    pub fn is_syncing(&self, key: &SyncKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Number of runs in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Proof that a key is Syncing. Dropping it returns the key to Idle.
#[derive(Debug)]
pub struct SyncPermit {
    registry: Arc<Mutex<HashSet<SyncKey>>>,
    key: SyncKey,
}

impl SyncPermit {
    /// Key held by this permit.
    #[must_use]
    pub const fn key(&self) -> &SyncKey {
        &self.key
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_coalesced() {
        let registry = SyncRegistry::new();
        let key = SyncKey::mailbox(UserId::from("u1"), ProviderType::Gmail);

        let permit = registry.try_begin(key.clone()).unwrap();
        assert!(registry.is_syncing(&key));
        assert!(registry.try_begin(key.clone()).is_none());

        drop(permit);
        assert!(!registry.is_syncing(&key));
        assert!(registry.try_begin(key).is_some());
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = SyncRegistry::new();
        let user = UserId::from("u1");

        let _gmail = registry
            .try_begin(SyncKey::mailbox(user.clone(), ProviderType::Gmail))
            .unwrap();
        let _outlook = registry
            .try_begin(SyncKey::mailbox(user.clone(), ProviderType::Outlook))
            .unwrap();
        let _message = registry
            .try_begin(SyncKey::message(user, ProviderType::Gmail, "m1"))
            .unwrap();
        assert_eq!(registry.in_flight(), 3);
    }

    #[test]
    fn test_permit_released_on_panic() {
        let registry = SyncRegistry::new();
        let key = SyncKey::mailbox(UserId::from("u1"), ProviderType::Gmail);

        let cloned = registry.clone();
        let inner = key.clone();
        let result = std::thread::spawn(move || {
            let _permit = cloned.try_begin(inner).unwrap();
            panic!("sync crashed");
        })
        .join();

        assert!(result.is_err());
        assert!(!registry.is_syncing(&key));
    }
}
