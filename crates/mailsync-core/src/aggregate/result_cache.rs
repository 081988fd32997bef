//! Short-lived memo of merged first pages.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::model::{SummaryPage, UserId};

/// Merged first pages keyed by `(user, limit)`.
///
/// Entries are overwritten by the next store, never evicted in the
/// background; a lookup older than the TTL is a miss.
#[derive(Debug)]
pub struct AggregateCache {
    ttl: Duration,
    entries: Mutex<HashMap<(UserId, usize), (Instant, SummaryPage)>>,
}

impl AggregateCache {
    /// Creates a cache; a zero `ttl` disables it.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if memoization is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Returns the memoized page if it is younger than the TTL.
    #[must_use]
    pub fn get(&self, user_id: &UserId, limit: usize) -> Option<SummaryPage> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(user_id.clone(), limit))
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, page)| page.clone())
    }

    /// Memoizes `page`, replacing any previous entry.
    pub fn put(&self, user_id: &UserId, limit: usize, page: SummaryPage) {
        if !self.is_enabled() {
            return;
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((user_id.clone(), limit), (Instant::now(), page));
    }

    /// Drops every entry of a user.
    pub fn invalidate_user(&self, user_id: &UserId) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(user, _), _| user != user_id);
    }
}
