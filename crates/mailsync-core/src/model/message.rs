//! Cached message types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OrderKey, ProviderType};

/// Identifier of a mailbox user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Create a new user ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached copy of a remote message.
///
/// `(user_id, provider, message_id)` is the primary key. `message_id` is
/// provider-local and not unique across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMessage {
    /// Owning user.
    pub user_id: UserId,
    /// Provider the message came from.
    pub provider: ProviderType,
    /// Provider-local message identifier.
    pub message_id: String,
    /// Provider-local thread identifier.
    pub thread_id: String,
    /// Subject header.
    pub subject: String,
    /// From header.
    pub sender: String,
    /// To header.
    pub recipient: String,
    /// Short preview text.
    pub snippet: String,
    /// Plain text body.
    pub plain_body: Option<String>,
    /// HTML body.
    pub html_body: Option<String>,
    /// Provider-assigned recency timestamp (epoch milliseconds). Immutable once stored.
    pub internal_date: i64,
    /// Date as shown to the user.
    pub display_date: String,
    /// Opaque provider version token (e.g. a history id).
    pub provider_revision: String,
    /// When this copy was written locally.
    pub cached_at: DateTime<Utc>,
    /// When the provider was last asked for this message.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Classifier label.
    pub category: Option<String>,
    /// Classifier confidence in `[0, 1]`.
    pub category_confidence: Option<f64>,
    /// Provider payload kept verbatim.
    pub raw_payload: serde_json::Value,
}

impl CachedMessage {
    /// Creates a message with the given key and recency; other fields empty.
    #[must_use]
    pub fn new(
        user_id: UserId,
        provider: ProviderType,
        message_id: impl Into<String>,
        internal_date: i64,
    ) -> Self {
        Self {
            user_id,
            provider,
            message_id: message_id.into(),
            thread_id: String::new(),
            subject: String::new(),
            sender: String::new(),
            recipient: String::new(),
            snippet: String::new(),
            plain_body: None,
            html_body: None,
            internal_date,
            display_date: String::new(),
            provider_revision: String::new(),
            cached_at: Utc::now(),
            last_fetched_at: None,
            category: None,
            category_confidence: None,
            raw_payload: serde_json::Value::Null,
        }
    }

    /// Ordering key of this message.
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            internal_date: self.internal_date,
            message_id: self.message_id.clone(),
            provider: self.provider,
        }
    }

    /// Returns true if `now - cached_at < ttl`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        now.signed_duration_since(self.cached_at) < ttl
    }

    /// List-view projection.
    #[must_use]
    pub fn summary(&self) -> EmailSummary {
        EmailSummary {
            provider: self.provider,
            message_id: self.message_id.clone(),
            thread_id: self.thread_id.clone(),
            subject: self.subject.clone(),
            sender: self.sender.clone(),
            snippet: self.snippet.clone(),
            display_date: self.display_date.clone(),
            internal_date: self.internal_date,
            category: self.category.clone(),
        }
    }
}

/// Read projection of a cached message used by list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSummary {
    /// Provider the message came from.
    pub provider: ProviderType,
    /// Provider-local message identifier.
    pub message_id: String,
    /// Provider-local thread identifier.
    pub thread_id: String,
    /// Subject.
    pub subject: String,
    /// Sender.
    pub sender: String,
    /// Preview text.
    pub snippet: String,
    /// Date as shown to the user.
    pub display_date: String,
    /// Provider recency timestamp.
    pub internal_date: i64,
    /// Classifier label.
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_cached_at(cached_at: DateTime<Utc>) -> CachedMessage {
        let mut message = CachedMessage::new(UserId::from("u1"), ProviderType::Gmail, "m1", 100);
        message.cached_at = cached_at;
        message
    }

    #[test]
    fn test_freshness_boundary() {
        let written = Utc::now();
        let message = message_cached_at(written);
        let ttl = Duration::from_secs(60);

        assert!(message.is_fresh_at(written, ttl));
        assert!(message.is_fresh_at(written + chrono::Duration::milliseconds(59_999), ttl));
        assert!(!message.is_fresh_at(written + chrono::Duration::seconds(60), ttl));
        assert!(!message.is_fresh_at(written + chrono::Duration::seconds(61), ttl));
    }

    #[test]
    fn test_summary_projection() {
        let mut message = CachedMessage::new(UserId::from("u1"), ProviderType::Outlook, "m9", 42);
        message.subject = "Quarterly".into();
        message.sender = "boss@example.com".into();
        message.category = Some("work".into());

        let summary = message.summary();
        assert_eq!(summary.provider, ProviderType::Outlook);
        assert_eq!(summary.message_id, "m9");
        assert_eq!(summary.subject, "Quarterly");
        assert_eq!(summary.internal_date, 42);
        assert_eq!(summary.category.as_deref(), Some("work"));
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId::new("alice").to_string(), "alice");
        assert_eq!(UserId::from("bob").as_str(), "bob");
    }
}
