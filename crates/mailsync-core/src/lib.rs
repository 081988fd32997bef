//! # mailsync-core
//!
//! Message cache and multi-provider synchronization engine.
//!
//! This crate provides:
//! - **Message cache** - read-through store of provider messages (`SQLite`)
//! - **Cursor pagination** - stable keyset pages over `(internal_date, message_id)`
//! - **Background sync** - detached, coalesced refresh from remote providers
//! - **Aggregation** - one merged, ordered view across a user's linked providers
//! - **Providers** - the remote provider contract and a Gmail adapter
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailsync_core::{EngineConfig, ProviderAggregator, RequestContext, SqliteStore};
//! use mailsync_core::{ProviderRegistry, SummariesRequest, UserId};
//!
//! let config = EngineConfig::default();
//! let store = Arc::new(SqliteStore::in_memory().await?);
//! let aggregator = ProviderAggregator::new(
//!     store.clone(),
//!     store,
//!     ProviderRegistry::with_defaults(),
//!     &config,
//! )?;
//!
//! let ctx = RequestContext::new().with_timeout(std::time::Duration::from_secs(5));
//! let page = aggregator
//!     .fetch_summaries(&ctx, &SummariesRequest::new(UserId::from("alice")))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod context;
mod error;
pub mod model;
pub mod pagination;
pub mod provider;
pub mod sync;

pub use aggregate::{DedupPolicy, MessageRequest, ProviderAggregator, SummariesRequest};
pub use cache::{LinkSource, MessageCache, MessageStore, SqliteStore};
pub use config::EngineConfig;
pub use context::RequestContext;
pub use error::{Error, ErrorKind, Result};
pub use model::{
    CachedMessage, Credential, Credentials, EmailSummary, OrderKey, PaginationCursor,
    ProviderLink, ProviderType, SummaryPage, UserId,
};
pub use pagination::{CursorPaginator, PageQuery};
pub use provider::{ProviderError, ProviderRegistry, RemoteProvider};
pub use sync::{SyncFlags, SyncLauncher, SyncReport, SyncWorker};
