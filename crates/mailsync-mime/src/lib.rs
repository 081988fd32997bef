//! # mailsync-mime
//!
//! Decoding helpers for message payloads handed back by remote mail providers.
//!
//! ## Features
//!
//! - **Transfer decoding**: Base64 (standard and URL-safe), Quoted-Printable
//! - **Header decoding**: RFC 2047 encoded-words in header values
//! - **Headers**: Case-insensitive, multi-valued header lookup
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsync_mime::{Headers, TransferEncoding};
//!
//! let headers = Headers::from_pairs([("Subject", "=?utf-8?B?SMOpbGxv?=")]);
//! assert_eq!(headers.decoded("subject").as_deref(), Some("Héllo"));
//!
//! let body = TransferEncoding::Base64Url.decode_text("SGVsbG8")?;
//! assert_eq!(body, "Hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;

pub mod encoding;

pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use header::Headers;
