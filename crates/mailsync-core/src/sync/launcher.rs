//! Detached, coalesced, capped sync launches.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{SyncJob, SyncKey, SyncRegistry, SyncReport, SyncWorker};
use crate::EngineConfig;
use crate::model::UserId;
use crate::provider::SharedProvider;

/// Result of a launch request.
#[derive(Debug)]
pub enum LaunchOutcome<T> {
    /// A new detached run was spawned.
    Started(JoinHandle<Option<T>>),
    /// A run for the same key is already in flight; nothing was spawned.
    Coalesced,
}

impl<T> LaunchOutcome<T> {
    /// Returns true if a run was spawned.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Spawns sync runs that outlive the request that triggered them.
///
/// At most one run per [`SyncKey`] is in flight and at most
/// `max_concurrent_syncs` runs execute at once; the rest wait for a slot.
#[derive(Clone)]
pub struct SyncLauncher {
    worker: SyncWorker,
    registry: SyncRegistry,
    slots: Arc<Semaphore>,
    page_size: u32,
}

impl SyncLauncher {
    /// Creates a launcher sized from `config`.
    #[must_use]
    pub fn new(worker: SyncWorker, config: &EngineConfig) -> Self {
        Self {
            worker,
            registry: SyncRegistry::new(),
            slots: Arc::new(Semaphore::new(config.max_concurrent_syncs.max(1))),
            page_size: config.sync_page_size,
        }
    }

    /// The worker runs are executed with.
    #[must_use]
    pub const fn worker(&self) -> &SyncWorker {
        &self.worker
    }

    /// Single-flight registry shared by every launch.
    #[must_use]
    pub const fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    /// Launches a mailbox sync unless one is in flight for the pair.
    ///
    /// `on_complete` runs inside the detached task after a successful run.
    pub fn launch<F>(
        &self,
        user_id: UserId,
        provider: SharedProvider,
        on_complete: F,
    ) -> LaunchOutcome<SyncReport>
    where
        F: FnOnce(&SyncReport) + Send + 'static,
    {
        let key = SyncKey::mailbox(user_id.clone(), provider.provider_type());
        let Some(permit) = self.registry.try_begin(key) else {
            debug!(%user_id, provider = %provider.provider_type(), "Sync already in flight, coalescing");
            return LaunchOutcome::Coalesced;
        };

        let job = SyncJob::new(user_id, provider, self.page_size);
        let worker = self.worker.clone();
        let slots = Arc::clone(&self.slots);

        LaunchOutcome::Started(tokio::spawn(async move {
            let _permit = permit;
            let _slot = slots.acquire_owned().await.ok()?;
            match worker.run(&job).await {
                Ok(report) => {
                    on_complete(&report);
                    Some(report)
                }
                Err(e) => {
                    warn!(user_id = %job.user_id, provider = %job.provider.provider_type(), error = %e, "Sync failed");
                    None
                }
            }
        }))
    }

    /// Launches a single-message refresh unless one is in flight.
    ///
    /// The user's flag is raised when the refresh succeeds.
    pub fn launch_refresh(
        &self,
        user_id: UserId,
        provider: SharedProvider,
        message_id: String,
    ) -> LaunchOutcome<()> {
        let key = SyncKey::message(user_id.clone(), provider.provider_type(), message_id.clone());
        let Some(permit) = self.registry.try_begin(key) else {
            debug!(%user_id, %message_id, "Refresh already in flight, coalescing");
            return LaunchOutcome::Coalesced;
        };

        let worker = self.worker.clone();
        let slots = Arc::clone(&self.slots);

        LaunchOutcome::Started(tokio::spawn(async move {
            let _permit = permit;
            let _slot = slots.acquire_owned().await.ok()?;
            match worker.refresh_message(&user_id, &provider, &message_id).await {
                Ok(_) => {
                    worker.notify(&user_id);
                    Some(())
                }
                Err(e) => {
                    warn!(%user_id, %message_id, error = %e, "Message refresh failed");
                    None
                }
            }
        }))
    }
}
