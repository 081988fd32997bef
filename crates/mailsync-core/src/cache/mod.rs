//! Read-through message cache.
//!
//! This module provides the cache facade used by the read path and the sync
//! workers, the persistent-store contract behind it, and a SQLite
//! implementation of that contract.

mod sqlite;
mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use sqlite::SqliteStore;
pub use store::{LinkSource, MessageStore};

use crate::model::{CachedMessage, PaginationCursor, ProviderType, UserId};
use crate::pagination::{CursorPaginator, PageQuery};
use crate::{EngineConfig, Error, Result};

/// Cached messages keyed by `(user, provider, message id)`.
///
/// Freshness is a predicate for callers; rows never expire on their own.
/// Store errors are returned unchanged and never retried here.
#[derive(Clone)]
pub struct MessageCache {
    store: Arc<dyn MessageStore>,
    paginator: CursorPaginator,
    ttl: Duration,
}

impl MessageCache {
    /// Creates a cache over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            paginator: CursorPaginator::from_config(config),
            ttl: config.freshness_ttl(),
        }
    }

    /// Paginator used to normalize cursors.
    #[must_use]
    pub const fn paginator(&self) -> &CursorPaginator {
        &self.paginator
    }

    /// Fetches a message.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the message is not cached, or the store's error.
    pub async fn get(
        &self,
        user_id: &UserId,
        provider: ProviderType,
        message_id: &str,
    ) -> Result<CachedMessage> {
        self.find(user_id, provider, message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{provider} message {message_id}")))
    }

    /// Fetches a message, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn find(
        &self,
        user_id: &UserId,
        provider: ProviderType,
        message_id: &str,
    ) -> Result<Option<CachedMessage>> {
        self.store.get_message(user_id, provider, message_id).await
    }

    /// One page across all of the user's providers.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn get_page(
        &self,
        user_id: &UserId,
        cursor: &PaginationCursor,
    ) -> Result<Vec<CachedMessage>> {
        let query = self.paginator.query(user_id, None, cursor);
        self.store.get_page(&query).await
    }

    /// One page of a single provider's messages.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn get_provider_page(
        &self,
        user_id: &UserId,
        provider: ProviderType,
        cursor: &PaginationCursor,
    ) -> Result<Vec<CachedMessage>> {
        let query = self.paginator.query(user_id, Some(provider), cursor);
        self.page(&query).await
    }

    /// Runs an already-normalized query.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn page(&self, query: &PageQuery) -> Result<Vec<CachedMessage>> {
        self.store.get_page(query).await
    }

    /// Inserts or replaces a message.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn upsert(&self, message: &CachedMessage) -> Result<()> {
        self.store.upsert_message(message).await
    }

    /// Irreversibly deletes every cached message of a user.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn purge_user(&self, user_id: &UserId) -> Result<u64> {
        self.store.delete_all_for_user(user_id).await
    }

    /// Returns true if `message` is younger than the TTL at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, message: &CachedMessage, now: DateTime<Utc>) -> bool {
        message.is_fresh_at(now, self.ttl)
    }

    /// Returns true if `message` is younger than the TTL.
    #[must_use]
    pub fn is_fresh(&self, message: &CachedMessage) -> bool {
        self.is_fresh_at(message, Utc::now())
    }
}
