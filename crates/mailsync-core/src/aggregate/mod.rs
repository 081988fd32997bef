//! One paginated view across every provider linked to a user.
//!
//! Reads are served from the message cache only. Each read also launches a
//! background sync for every linked provider that has a usable credential;
//! those results land in later reads, never in the one that triggered them.

mod merge;
mod request;
mod result_cache;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub use merge::{DedupPolicy, merge_pages};
pub use request::{MessageRequest, SummariesRequest};
pub use result_cache::AggregateCache;

use crate::cache::{LinkSource, MessageCache, MessageStore};
use crate::context::RequestContext;
use crate::model::{CachedMessage, Credentials, ProviderLink, SummaryPage, UserId};
use crate::pagination::PageQuery;
use crate::provider::{ProviderError, ProviderRegistry, SharedProvider};
use crate::sync::{SyncFlags, SyncLauncher, SyncWorker};
use crate::{EngineConfig, Error, Result};

/// Merges per-provider cached pages and drives background syncs.
pub struct ProviderAggregator {
    cache: Arc<MessageCache>,
    links: Arc<dyn LinkSource>,
    providers: ProviderRegistry,
    launcher: SyncLauncher,
    flags: Arc<SyncFlags>,
    results: Arc<AggregateCache>,
    policy: DedupPolicy,
    invalidate_on_sync: bool,
}

impl ProviderAggregator {
    /// Creates an aggregator over a message store and a link source.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` does not validate.
    pub fn new(
        store: Arc<dyn MessageStore>,
        links: Arc<dyn LinkSource>,
        providers: ProviderRegistry,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(MessageCache::new(store, config));
        let flags = Arc::new(SyncFlags::new());
        let worker = SyncWorker::new(Arc::clone(&cache), Arc::clone(&flags));
        Ok(Self {
            launcher: SyncLauncher::new(worker, config),
            cache,
            links,
            providers,
            flags,
            results: Arc::new(AggregateCache::new(config.aggregate_cache_ttl())),
            policy: DedupPolicy::default(),
            invalidate_on_sync: config.invalidate_aggregate_on_sync,
        })
    }

    /// The underlying message cache.
    #[must_use]
    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// The launcher used for background syncs.
    #[must_use]
    pub const fn launcher(&self) -> &SyncLauncher {
        &self.launcher
    }

    /// Returns one merged page of summaries.
    ///
    /// Each linked provider's cached page is read with the request's cursor
    /// and limit, the pages are merged and re-sorted, and the cursor and
    /// limit are applied again over the merged sequence. First pages are
    /// memoized for a short time.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the user has no linked provider, the
    /// store's error if any provider's page cannot be read, or the scope's
    /// `Cancelled`/`DeadlineExceeded`.
    pub async fn fetch_summaries(
        &self,
        ctx: &RequestContext,
        request: &SummariesRequest,
    ) -> Result<SummaryPage> {
        let user_id = &request.user_id;
        let links = self.linked(ctx, user_id).await?;

        let cursor = request.cursor.clone().unwrap_or_default();
        let paginator = self.cache.paginator();
        let query = paginator.query(user_id, None, &cursor);
        let memoizable = query.after.is_none();

        if memoizable {
            if let Some(page) = self.results.get(user_id, query.limit) {
                debug!(%user_id, limit = query.limit, request_id = ctx.request_id(), "Serving memoized page");
                self.launch_syncs(&links, &request.credentials);
                return Ok(page);
            }
        }

        let mut pages = Vec::with_capacity(links.len());
        for link in &links {
            let provider_query = PageQuery {
                provider: Some(link.provider),
                ..query.clone()
            };
            pages.push(ctx.run(self.cache.page(&provider_query)).await?);
        }
        self.launch_syncs(&links, &request.credentials);

        let merged = merge_pages(pages, self.policy, paginator, &query);
        let page = SummaryPage {
            next_cursor: paginator.next_cursor(&merged, &query),
            items: merged.iter().map(CachedMessage::summary).collect(),
        };

        if memoizable {
            self.results.put(user_id, query.limit, page.clone());
        }
        debug!(%user_id, providers = links.len(), items = page.items.len(), "Merged summary page");
        Ok(page)
    }

    /// Resolves one message id against the user's providers.
    ///
    /// Providers are tried in link-registration order and the first success
    /// wins. A cached copy is returned as is; if it is stale a detached
    /// refresh is launched. A cache miss is fetched from the provider when a
    /// credential is available.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no provider resolves the id and none
    /// failed upstream, otherwise the last `Error::Upstream`. Store errors
    /// and scope errors are returned immediately.
    pub async fn fetch_message(
        &self,
        ctx: &RequestContext,
        request: &MessageRequest,
    ) -> Result<CachedMessage> {
        let user_id = &request.user_id;
        let message_id = request.message_id.as_str();
        let links = self.linked(ctx, user_id).await?;
        let now = Utc::now();
        let mut last_upstream: Option<ProviderError> = None;

        for link in &links {
            let cached = ctx
                .run(self.cache.find(user_id, link.provider, message_id))
                .await?;
            let remote = self.connect(link, &request.credentials, now);

            if let Some(message) = cached {
                if !self.cache.is_fresh_at(&message, now) {
                    if let Some(provider) = remote {
                        debug!(%user_id, provider = %link.provider, message_id, "Cached copy is stale, refreshing");
                        let _ = self.launcher.launch_refresh(
                            user_id.clone(),
                            provider,
                            message_id.to_string(),
                        );
                    }
                }
                return Ok(message);
            }

            let Some(provider) = remote else {
                continue;
            };
            let worker = self.launcher.worker();
            match ctx
                .run(worker.refresh_message(user_id, &provider, message_id))
                .await
            {
                Ok(message) => return Ok(message),
                Err(Error::NotFound(_)) => {}
                Err(Error::Upstream(e)) => {
                    warn!(%user_id, provider = %link.provider, message_id, error = %e, "Provider failed to resolve message");
                    last_upstream = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_upstream {
            Some(e) => Err(Error::Upstream(e)),
            None => Err(Error::NotFound(format!("message {message_id}"))),
        }
    }

    /// Reads and clears the user's "new data available" flag.
    #[must_use]
    pub fn take_sync_flag(&self, user_id: &UserId) -> bool {
        self.flags.take(user_id)
    }

    /// Deletes every cached message of a user and forgets memoized pages.
    ///
    /// # Errors
    ///
    /// Returns the store's error or the scope's error.
    pub async fn purge_user(&self, ctx: &RequestContext, user_id: &UserId) -> Result<u64> {
        let removed = ctx.run(self.cache.purge_user(user_id)).await?;
        self.results.invalidate_user(user_id);
        debug!(%user_id, removed, "Purged cached messages");
        Ok(removed)
    }

    async fn linked(&self, ctx: &RequestContext, user_id: &UserId) -> Result<Vec<ProviderLink>> {
        let links = ctx.run(self.links.links_for_user(user_id)).await?;
        if links.is_empty() {
            return Err(Error::NotFound(format!("no linked providers for user {user_id}")));
        }
        Ok(links)
    }

    fn launch_syncs(&self, links: &[ProviderLink], credentials: &Credentials) {
        let now = Utc::now();
        for link in links {
            let Some(provider) = self.connect(link, credentials, now) else {
                continue;
            };
            let results = Arc::clone(&self.results);
            let invalidate = self.invalidate_on_sync;
            let _ = self
                .launcher
                .launch(link.user_id.clone(), provider, move |report| {
                    if invalidate {
                        results.invalidate_user(&report.user_id);
                    }
                });
        }
    }

    /// Adapter for `link`, or `None` if the link is cache-only for now.
    fn connect(
        &self,
        link: &ProviderLink,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Option<SharedProvider> {
        let credential = credentials.valid_for(link.provider, now)?;
        if !self.providers.supports(link.provider) {
            debug!(user_id = %link.user_id, provider = %link.provider, "No adapter registered, serving cache only");
            return None;
        }
        match self.providers.connect(link, credential) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(user_id = %link.user_id, provider = %link.provider, error = %e, "Could not connect provider");
                None
            }
        }
    }
}
