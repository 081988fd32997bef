//! Ordering keys and pagination cursors.

use std::cmp::Ordering;

use mailsync_mime::encoding::{decode_base64_url, encode_base64_url};
use serde::{Deserialize, Serialize};

use super::{EmailSummary, ProviderType};
use crate::{Error, Result};

/// Composite recency key `(internal_date, message_id, provider)`.
///
/// Pages are returned in descending key order. The provider component only
/// separates equal `(internal_date, message_id)` pairs coming from different
/// providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    /// Provider recency timestamp.
    pub internal_date: i64,
    /// Provider-local message identifier.
    pub message_id: String,
    /// Source provider.
    pub provider: ProviderType,
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.internal_date
            .cmp(&other.internal_date)
            .then_with(|| self.message_id.cmp(&other.message_id))
            .then_with(|| self.provider.cmp(&other.provider))
    }
}

/// Position a page continues after. Only items strictly below it are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    /// Recency timestamp of the last item seen.
    pub internal_date: i64,
    /// Message identifier of the last item seen.
    pub message_id: String,
    /// Provider of the last item seen; `None` excludes every provider's item
    /// at exactly `(internal_date, message_id)`.
    pub provider: Option<ProviderType>,
}

impl CursorPosition {
    /// Returns true if `key` sorts strictly below this position.
    #[must_use]
    pub fn admits(&self, key: &OrderKey) -> bool {
        let head = key
            .internal_date
            .cmp(&self.internal_date)
            .then_with(|| key.message_id.as_str().cmp(self.message_id.as_str()));
        match (head, self.provider) {
            (Ordering::Less, _) => true,
            (Ordering::Equal, Some(provider)) => key.provider < provider,
            _ => false,
        }
    }
}

/// Client-held continuation token.
///
/// A cursor with an empty `after_message_id` or a missing
/// `after_internal_date` is treated as no cursor at all: the next page starts
/// from the most recent item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationCursor {
    /// Message identifier of the last item seen.
    pub after_message_id: String,
    /// Recency timestamp of the last item seen.
    pub after_internal_date: Option<i64>,
    /// Provider of the last item seen.
    pub after_provider: Option<ProviderType>,
    /// Requested page size; `<= 0` selects the default.
    pub limit: i64,
}

impl PaginationCursor {
    /// First-page cursor with the given limit.
    #[must_use]
    pub fn first(limit: i64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Cursor continuing after `key`.
    #[must_use]
    pub fn after(key: &OrderKey, limit: i64) -> Self {
        Self {
            after_message_id: key.message_id.clone(),
            after_internal_date: Some(key.internal_date),
            after_provider: Some(key.provider),
            limit,
        }
    }

    /// The position to continue after, or `None` for a first page.
    #[must_use]
    pub fn position(&self) -> Option<CursorPosition> {
        if self.after_message_id.is_empty() {
            return None;
        }
        self.after_internal_date.map(|internal_date| CursorPosition {
            internal_date,
            message_id: self.after_message_id.clone(),
            provider: self.after_provider,
        })
    }

    /// Encodes the cursor as an opaque URL-safe token.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(encode_base64_url(&json))
    }

    /// Decodes a token produced by [`PaginationCursor::encode`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if the token is not a valid cursor.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = decode_base64_url(token)
            .map_err(|e| Error::Invalid(format!("cursor token: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Invalid(format!("cursor token: {e}")))
    }
}

/// One page of the merged list view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPage {
    /// Summaries in descending recency order.
    pub items: Vec<EmailSummary>,
    /// Cursor for the following page; absent when this page was not full.
    pub next_cursor: Option<PaginationCursor>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(internal_date: i64, message_id: &str, provider: ProviderType) -> OrderKey {
        OrderKey {
            internal_date,
            message_id: message_id.to_string(),
            provider,
        }
    }

    #[test]
    fn test_order_key_tie_breaks_by_message_id() {
        let a = key(100, "a", ProviderType::Gmail);
        let b = key(100, "b", ProviderType::Gmail);
        let newer = key(101, "a", ProviderType::Gmail);
        assert!(a < b);
        assert!(b < newer);
    }

    #[test]
    fn test_position_requires_both_fields() {
        assert!(PaginationCursor::first(10).position().is_none());

        let only_date = PaginationCursor {
            after_internal_date: Some(500),
            ..PaginationCursor::default()
        };
        assert!(only_date.position().is_none());

        let only_id = PaginationCursor {
            after_message_id: "m1".into(),
            ..PaginationCursor::default()
        };
        assert!(only_id.position().is_none());

        let full = PaginationCursor::after(&key(500, "m1", ProviderType::Gmail), 10);
        assert_eq!(full.position().unwrap().internal_date, 500);
    }

    #[test]
    fn test_admits_is_strict() {
        let at = key(200, "m", ProviderType::Imap);
        let position = PaginationCursor::after(&at, 10).position().unwrap();

        assert!(!position.admits(&at));
        assert!(!position.admits(&key(201, "a", ProviderType::Gmail)));
        assert!(position.admits(&key(200, "l", ProviderType::Outlook)));
        assert!(position.admits(&key(199, "z", ProviderType::Outlook)));
        // same (date, id) from a provider that sorts lower
        assert!(position.admits(&key(200, "m", ProviderType::Gmail)));
        assert!(!position.admits(&key(200, "m", ProviderType::Outlook)));
    }

    #[test]
    fn test_admits_without_provider_excludes_all_equal_pairs() {
        let position = CursorPosition {
            internal_date: 200,
            message_id: "m".into(),
            provider: None,
        };
        assert!(!position.admits(&key(200, "m", ProviderType::Gmail)));
        assert!(position.admits(&key(200, "l", ProviderType::Gmail)));
    }

    #[test]
    fn test_token_roundtrip() {
        let cursor = PaginationCursor::after(&key(1_700_000_000_000, "18c2f", ProviderType::Gmail), 25);
        let token = cursor.encode().unwrap();
        assert!(!token.contains('='));
        assert_eq!(PaginationCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(PaginationCursor::decode("%%%"), Err(Error::Invalid(_))));
        let not_json = encode_base64_url(b"hello");
        assert!(matches!(PaginationCursor::decode(&not_json), Err(Error::Invalid(_))));
    }
}
