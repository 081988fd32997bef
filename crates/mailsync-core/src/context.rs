//! Request scope for read-path operations.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Cancellable, deadline-bearing scope of a single read request.
///
/// Background sync tasks never inherit this scope: cancelling a read does not
/// stop a refresh it triggered.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Creates a scope with no deadline.
    #[must_use]
    pub fn new() -> Self {
        let n = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        Self {
            request_id: format!("req-{n}"),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Overrides the generated request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Request identifier used in log fields.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Token that cancels this scope.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the scope.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs `fut` inside the scope.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` or `Error::DeadlineExceeded` if the scope
    /// ends first, otherwise the future's own result.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(Error::DeadlineExceeded);
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = deadline => Err(Error::DeadlineExceeded),
            result = fut => result,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = RequestContext::new();
        let value = ctx.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let err = ctx.run(async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_slow_call() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
    }

    #[test]
    fn test_request_ids_are_distinct() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.with_request_id("abc").request_id(), "abc");
    }
}
