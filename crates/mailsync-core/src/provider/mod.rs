//! Remote provider contract.
//!
//! One adapter per [`ProviderType`] implements [`RemoteProvider`]; adapters
//! are created through a [`ProviderRegistry`] keyed by type, so adding a
//! provider means registering a factory rather than branching on the type.

pub mod gmail;
mod registry;
mod translate;

use std::sync::Arc;

use async_trait::async_trait;
use mailsync_mime::TransferEncoding;

pub use registry::{ProviderFactory, ProviderRegistry};
pub use translate::to_cached_message;

use crate::model::ProviderType;

/// Errors reported by a remote provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider does not know the message.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// The provider rejected the credential.
    #[error("Credential rejected by provider")]
    Unauthorized,

    /// The provider answered with an error status.
    #[error("Provider returned status {status}: {message}")]
    Status {
        /// HTTP-like status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider's response could not be understood.
    #[error("Unexpected provider response: {0}")]
    Decode(String),

    /// No adapter is registered for the provider type.
    #[error("No adapter registered for provider {0}")]
    Unsupported(ProviderType),
}

impl ProviderError {
    /// Returns true if the provider reported the message as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Message identifiers returned by a list call, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    /// Provider-local identifiers.
    pub ids: Vec<String>,
    /// Provider-side continuation for the following list call.
    pub next_continuation: Option<String>,
}

/// One body part of a remote message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// MIME type, e.g. `text/plain`.
    pub mime_type: String,
    /// Encoding of `data`.
    pub transfer_encoding: TransferEncoding,
    /// Encoded part content.
    pub data: String,
}

/// Full message content as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMessage {
    /// Provider-local identifier.
    pub id: String,
    /// Provider-local thread identifier.
    pub thread_id: String,
    /// Header name/value pairs in provider order.
    pub headers: Vec<(String, String)>,
    /// Preview text.
    pub snippet: String,
    /// Body parts, flattened.
    pub parts: Vec<BodyPart>,
    /// Provider recency timestamp (epoch milliseconds).
    pub internal_date: i64,
    /// Provider version token.
    pub revision: String,
    /// The provider's payload, verbatim.
    pub raw_payload: serde_json::Value,
}

/// Minimal contract every remote mail source implements.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Provider type served by this adapter.
    fn provider_type(&self) -> ProviderType;

    /// Lists up to `page_size` identifiers, newest first.
    async fn list(
        &self,
        page_size: u32,
        continuation: Option<&str>,
    ) -> ProviderResult<RemoteListing>;

    /// Fetches one message.
    async fn get(&self, message_id: &str) -> ProviderResult<RemoteMessage>;
}

/// Shared handle to a connected adapter.
pub type SharedProvider = Arc<dyn RemoteProvider>;

