//! Error types for payload decoding.

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Decoding error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
