//! Background refresh of the message cache.
//!
//! A [`SyncWorker`] performs one list/fetch/upsert pass against a remote
//! provider. The [`SyncLauncher`] runs those passes as detached tasks:
//! overlapping launches for the same key coalesce through the
//! [`SyncRegistry`], and a semaphore caps how many run at once. Completed
//! runs raise the user's bit in [`SyncFlags`].

mod flag;
mod launcher;
mod registry;
mod worker;

pub use flag::SyncFlags;
pub use launcher::{LaunchOutcome, SyncLauncher};
pub use registry::{SyncKey, SyncPermit, SyncRegistry, SyncTarget};
pub use worker::{SyncJob, SyncReport, SyncWorker};
