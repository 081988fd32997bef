//! Domain model: cached messages, cursors, provider links and credentials.

mod credential;
mod cursor;
mod link;
mod message;

pub use credential::{Credential, Credentials};
pub use cursor::{CursorPosition, OrderKey, PaginationCursor, SummaryPage};
pub use link::{ProviderCapabilities, ProviderLink, ProviderType};
pub use message::{CachedMessage, EmailSummary, UserId};
