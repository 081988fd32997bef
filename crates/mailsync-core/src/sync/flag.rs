//! Per-user "new data available" hint.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::model::UserId;

/// One bit per user, raised by completed syncs.
///
/// Reading a flag clears it; there is no way to peek. A consumer may observe
/// a bit raised by an older or a newer sync than the one it expects.
#[derive(Debug, Default)]
pub struct SyncFlags {
    raised: Mutex<HashSet<UserId>>,
}

impl SyncFlags {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the user's flag.
    pub fn raise(&self, user_id: &UserId) {
        self.raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.clone());
    }

    /// Atomically reads and clears the user's flag.
    pub fn take(&self, user_id: &UserId) -> bool {
        self.raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears() {
        let flags = SyncFlags::new();
        let user = UserId::from("u1");

        assert!(!flags.take(&user));
        flags.raise(&user);
        flags.raise(&user);
        assert!(flags.take(&user));
        assert!(!flags.take(&user));
    }

    #[test]
    fn test_flags_are_per_user() {
        let flags = SyncFlags::new();
        flags.raise(&UserId::from("u1"));
        assert!(!flags.take(&UserId::from("u2")));
        assert!(flags.take(&UserId::from("u1")));
    }
}
