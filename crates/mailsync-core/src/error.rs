//! Error types for the core library.

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No linked provider, or no provider resolves the requested message.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote provider call failed.
    #[error("Upstream provider error: {0}")]
    Upstream(#[source] ProviderError),

    /// Malformed request input (cursor token, provider tag).
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request scope was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// The request scope deadline passed.
    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

/// Coarse error classification exposed to the calling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing to return; maps to an empty result or a not-found response.
    NotFound,
    /// Remote provider failure; retryable.
    Upstream,
    /// Malformed input.
    Invalid,
    /// Local failure (store, configuration, aborted request scope); retryable.
    Internal,
}

impl Error {
    /// Returns the taxonomy class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::Database(_)
            | Self::Serde(_)
            | Self::Io(_)
            | Self::Config(_)
            | Self::Cancelled
            | Self::DeadlineExceeded => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller should answer with a retryable server error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upstream | ErrorKind::Internal)
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(id) => Self::NotFound(format!("message {id}")),
            other => Self::Upstream(other),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
