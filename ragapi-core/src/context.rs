//! Per-request deadline and cancellation.
//!
//! A [`RequestContext`] is created by the caller for one ingest or query and
//! passed by reference through every stage. Each remote call is wrapped in
//! [`RequestContext::run`], which races the call against the deadline and the
//! cancellation token. The losing future is dropped on the spot, so an
//! abandoned HTTP request or SQL statement releases its connection instead of
//! running on in the background.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{RagError, Result, Stage};

/// Deadline and cancellation signal shared by the stages of one request.
///
/// Cloning yields a handle to the same token and deadline.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use ragapi_core::RequestContext;
///
/// let ctx = RequestContext::with_timeout(Duration::from_secs(30));
/// let answer = pipeline.query(&ctx, "Where is the Eiffel Tower?", "docs").await?;
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// A context with no deadline that is only ended by [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self { cancel: CancellationToken::new(), deadline: None }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { cancel: CancellationToken::new(), deadline: Some((Instant::now() + timeout, timeout)) }
    }

    /// Use `token` as the cancellation signal, e.g. a child of a server-wide
    /// shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancel the request. In-flight and future stages fail with
    /// [`RagError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `call` to completion unless the request is cancelled or its
    /// deadline passes first.
    ///
    /// An already-cancelled or already-expired context returns without
    /// polling `call` at all.
    pub async fn run<T, F>(&self, stage: Stage, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(RagError::Cancelled { stage });
        }
        if let Some((at, timeout)) = self.deadline {
            if Instant::now() >= at {
                return Err(RagError::Timeout { stage, timeout });
            }
        }

        let expired = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(%stage, "request cancelled");
                Err(RagError::Cancelled { stage })
            }
            _ = expired => {
                let timeout = self.deadline.map(|(_, t)| t).unwrap_or_default();
                warn!(%stage, ?timeout, "request deadline exceeded");
                Err(RagError::Timeout { stage, timeout })
            }
            result = call => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelling_the_parent_token_ends_derived_contexts() {
        let shutdown = CancellationToken::new();
        let ctx = RequestContext::with_timeout(Duration::from_secs(30))
            .with_cancellation(shutdown.child_token());
        assert!(!ctx.is_cancelled());

        shutdown.cancel();
        assert!(ctx.is_cancelled());
        let err = ctx.run(Stage::Generation, async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, RagError::Cancelled { stage: Stage::Generation }));
    }

    #[tokio::test]
    async fn cancelling_one_request_leaves_the_parent_running() {
        let shutdown = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(shutdown.child_token());
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(!shutdown.is_cancelled());
    }
}
