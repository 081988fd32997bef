//! Persistent-store contracts.

use async_trait::async_trait;

use crate::Result;
use crate::model::{CachedMessage, ProviderLink, ProviderType, UserId};
use crate::pagination::PageQuery;

/// Durable storage behind the message cache.
///
/// Implementations must make `upsert_message` a full replace keyed by
/// `(user_id, provider, message_id)` so that concurrent writers converge.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Inserts or replaces a message.
    async fn upsert_message(&self, message: &CachedMessage) -> Result<()>;

    /// Looks up a message by primary key.
    async fn get_message(
        &self,
        user_id: &UserId,
        provider: ProviderType,
        message_id: &str,
    ) -> Result<Option<CachedMessage>>;

    /// Returns one page in descending order-key order.
    async fn get_page(&self, query: &PageQuery) -> Result<Vec<CachedMessage>>;

    /// Deletes every cached message of a user, returning how many were removed.
    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64>;
}

/// Source of a user's provider links, in registration order.
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Lists the user's links, oldest registration first.
    async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<ProviderLink>>;
}
