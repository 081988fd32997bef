//! Explicit per-call parameters for the aggregator.

use tracing::warn;

use crate::model::{Credentials, PaginationCursor, UserId};

/// Parameters of a merged list read.
#[derive(Debug, Clone)]
pub struct SummariesRequest {
    /// Owning user.
    pub user_id: UserId,
    /// Continuation; `None` reads the newest page with the default limit.
    pub cursor: Option<PaginationCursor>,
    /// Credentials available for sync launches.
    pub credentials: Credentials,
}

impl SummariesRequest {
    /// Request for the user's newest page.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            cursor: None,
            credentials: Credentials::new(),
        }
    }

    /// Builds a request from an opaque cursor token.
    ///
    /// A token that does not decode is logged and treated as no cursor.
    #[must_use]
    pub fn from_token(user_id: UserId, token: Option<&str>) -> Self {
        let cursor = token
            .filter(|t| !t.trim().is_empty())
            .and_then(|t| match PaginationCursor::decode(t) {
                Ok(cursor) => Some(cursor),
                Err(e) => {
                    warn!(%user_id, error = %e, "Ignoring malformed cursor token");
                    None
                }
            });
        Self {
            user_id,
            cursor,
            credentials: Credentials::new(),
        }
    }

    /// Sets the cursor.
    #[must_use]
    pub fn with_cursor(mut self, cursor: PaginationCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Parameters of a single-message read.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    /// Owning user.
    pub user_id: UserId,
    /// Provider-local identifier to resolve.
    pub message_id: String,
    /// Credentials available for remote fetches.
    pub credentials: Credentials,
}

impl MessageRequest {
    /// Request without credentials (cache only).
    #[must_use]
    pub fn new(user_id: UserId, message_id: impl Into<String>) -> Self {
        Self {
            user_id,
            message_id: message_id.into(),
            credentials: Credentials::new(),
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}
