//! Refills the message cache from one remote provider.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::SyncFlags;
use crate::Result;
use crate::cache::MessageCache;
use crate::model::{CachedMessage, ProviderType, UserId};
use crate::provider::{SharedProvider, to_cached_message};

/// One sync run for a `(user, provider)` pair.
#[derive(Clone)]
pub struct SyncJob {
    /// Owning user.
    pub user_id: UserId,
    /// Connected adapter for the provider.
    pub provider: SharedProvider,
    /// Identifiers to list.
    pub page_size: u32,
    /// Provider-side continuation to start from.
    pub continuation: Option<String>,
}

impl SyncJob {
    /// Creates a job for the newest `page_size` messages.
    #[must_use]
    pub fn new(user_id: UserId, provider: SharedProvider, page_size: u32) -> Self {
        Self {
            user_id,
            provider,
            page_size,
            continuation: None,
        }
    }

    /// Starts listing after a provider-side continuation.
    #[must_use]
    pub fn with_continuation(mut self, continuation: impl Into<String>) -> Self {
        self.continuation = Some(continuation.into());
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Owning user.
    pub user_id: UserId,
    /// Provider that was synced.
    pub provider: ProviderType,
    /// Identifiers returned by the list call.
    pub listed: usize,
    /// Messages written to the cache.
    pub upserted: usize,
    /// Identifiers skipped because fetching or storing them failed.
    pub failed: usize,
    /// Continuation for the following run.
    pub next_continuation: Option<String>,
}

/// Lists, fetches, translates and upserts.
#[derive(Clone)]
pub struct SyncWorker {
    cache: Arc<MessageCache>,
    flags: Arc<SyncFlags>,
}

impl SyncWorker {
    /// Creates a worker writing into `cache` and raising `flags`.
    #[must_use]
    pub const fn new(cache: Arc<MessageCache>, flags: Arc<SyncFlags>) -> Self {
        Self { cache, flags }
    }

    /// The cache this worker writes into.
    #[must_use]
    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Runs one sync.
    ///
    /// A failure for a single identifier is logged and skipped. The user's
    /// flag is raised once the run completes, even if every item failed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` only if the list call itself fails; the flag
    /// is not raised in that case.
    pub async fn run(&self, job: &SyncJob) -> Result<SyncReport> {
        let provider = job.provider.provider_type();
        let listing = job
            .provider
            .list(job.page_size, job.continuation.as_deref())
            .await?;

        let mut report = SyncReport {
            user_id: job.user_id.clone(),
            provider,
            listed: listing.ids.len(),
            upserted: 0,
            failed: 0,
            next_continuation: listing.next_continuation,
        };

        for id in &listing.ids {
            let remote = match job.provider.get(id).await {
                Ok(remote) => remote,
                Err(e) => {
                    warn!(user_id = %job.user_id, %provider, message_id = %id, error = %e, "Skipping message that failed to fetch");
                    report.failed += 1;
                    continue;
                }
            };

            let message = to_cached_message(&job.user_id, provider, remote, Utc::now());
            match self.cache.upsert(&message).await {
                Ok(()) => report.upserted += 1,
                Err(e) => {
                    warn!(user_id = %job.user_id, %provider, message_id = %id, error = %e, "Skipping message that failed to store");
                    report.failed += 1;
                }
            }
        }

        self.flags.raise(&job.user_id);
        info!(
            user_id = %job.user_id,
            %provider,
            listed = report.listed,
            upserted = report.upserted,
            failed = report.failed,
            "Sync completed"
        );
        Ok(report)
    }

    /// Fetches one message from the provider and stores it.
    ///
    /// Does not raise the user's flag.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the provider does not know the message,
    /// `Error::Upstream` for other provider failures, or the store's error.
    pub async fn refresh_message(
        &self,
        user_id: &UserId,
        provider: &SharedProvider,
        message_id: &str,
    ) -> Result<CachedMessage> {
        let remote = provider.get(message_id).await?;
        let message = to_cached_message(user_id, provider.provider_type(), remote, Utc::now());
        self.cache.upsert(&message).await?;
        debug!(%user_id, provider = %message.provider, message_id, "Message refreshed");
        Ok(message)
    }

    /// Raises the user's flag.
    pub(crate) fn notify(&self, user_id: &UserId) {
        self.flags.raise(user_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::SqliteStore;
    use crate::provider::{ProviderError, ProviderResult, RemoteListing, RemoteMessage, RemoteProvider};
    use crate::{EngineConfig, Error, ErrorKind, RequestContext};
    use async_trait::async_trait;

    /// Provider with `count` messages whose fetches fail for ids in `broken`.
    struct FakeProvider {
        ids: Vec<String>,
        broken: Vec<String>,
        list_fails: bool,
        list_stalls: bool,
    }

    impl FakeProvider {
        fn new(count: usize) -> Self {
            Self {
                ids: (1..=count).map(|i| format!("m{i}")).collect(),
                broken: Vec::new(),
                list_fails: false,
                list_stalls: false,
            }
        }
    }

    #[async_trait]
    impl RemoteProvider for FakeProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Gmail
        }

        async fn list(&self, page_size: u32, _continuation: Option<&str>) -> ProviderResult<RemoteListing> {
            if self.list_stalls {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
            if self.list_fails {
                return Err(ProviderError::Status {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(RemoteListing {
                ids: self.ids.iter().take(page_size as usize).cloned().collect(),
                next_continuation: Some("next".into()),
            })
        }

        async fn get(&self, message_id: &str) -> ProviderResult<RemoteMessage> {
            if self.broken.iter().any(|b| b == message_id) {
                return Err(ProviderError::Status {
                    status: 500,
                    message: "boom".into(),
                });
            }
            let position = self
                .ids
                .iter()
                .position(|id| id == message_id)
                .ok_or_else(|| ProviderError::NotFound(message_id.into()))?;
            let internal_date = 1_000 - i64::try_from(position).unwrap();
            Ok(RemoteMessage {
                id: message_id.into(),
                thread_id: format!("t-{message_id}"),
                headers: vec![("Subject".into(), format!("Subject {message_id}"))],
                snippet: String::new(),
                parts: Vec::new(),
                internal_date,
                revision: "1".into(),
                raw_payload: serde_json::Value::Null,
            })
        }
    }

    async fn worker() -> (SyncWorker, Arc<SyncFlags>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let cache = Arc::new(MessageCache::new(store.clone(), &EngineConfig::default()));
        let flags = Arc::new(SyncFlags::new());
        (SyncWorker::new(cache, flags.clone()), flags, store)
    }

    #[tokio::test]
    async fn test_single_fetch_failure_is_isolated() {
        let (worker, flags, store) = worker().await;
        let user = UserId::from("u1");
        let mut provider = FakeProvider::new(5);
        provider.broken.push("m3".into());

        let job = SyncJob::new(user.clone(), Arc::new(provider), 50);
        let report = worker.run(&job).await.unwrap();

        assert_eq!(report.listed, 5);
        assert_eq!(report.upserted, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.next_continuation.as_deref(), Some("next"));
        assert_eq!(store.count_for_user(&user).await.unwrap(), 4);
        assert!(flags.take(&user));
    }

    #[tokio::test]
    async fn test_page_size_limits_listing() {
        let (worker, _, store) = worker().await;
        let user = UserId::from("u1");

        let job = SyncJob::new(user.clone(), Arc::new(FakeProvider::new(10)), 3);
        let report = worker.run(&job).await.unwrap();

        assert_eq!(report.upserted, 3);
        assert_eq!(store.count_for_user(&user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_failure_fails_run_without_flag() {
        let (worker, flags, _) = worker().await;
        let user = UserId::from("u1");
        let mut provider = FakeProvider::new(2);
        provider.list_fails = true;

        let err = worker
            .run(&SyncJob::new(user.clone(), Arc::new(provider), 50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(!flags.take(&user));
    }

    #[tokio::test]
    async fn test_deadline_bounds_run() {
        let (worker, flags, store) = worker().await;
        let user = UserId::from("u1");
        let mut provider = FakeProvider::new(2);
        provider.list_stalls = true;

        let ctx = RequestContext::new().with_timeout(std::time::Duration::from_millis(50));
        let job = SyncJob::new(user.clone(), Arc::new(provider), 50);
        let err = ctx.run(worker.run(&job)).await.unwrap_err();

        assert!(matches!(err, Error::DeadlineExceeded));
        assert!(!flags.take(&user));
        assert_eq!(store.count_for_user(&user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rerun_converges() {
        let (worker, _, store) = worker().await;
        let user = UserId::from("u1");
        let job = SyncJob::new(user.clone(), Arc::new(FakeProvider::new(4)), 50);

        worker.run(&job).await.unwrap();
        worker.run(&job).await.unwrap();
        assert_eq!(store.count_for_user(&user).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_refresh_message() {
        let (worker, flags, _) = worker().await;
        let user = UserId::from("u1");
        let provider: SharedProvider = Arc::new(FakeProvider::new(2));

        let message = worker.refresh_message(&user, &provider, "m2").await.unwrap();
        assert_eq!(message.subject, "Subject m2");
        assert!(message.last_fetched_at.is_some());
        assert_eq!(
            worker.cache().get(&user, ProviderType::Gmail, "m2").await.unwrap().thread_id,
            "t-m2"
        );
        assert!(!flags.take(&user));

        let err = worker.refresh_message(&user, &provider, "zz").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
