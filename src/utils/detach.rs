//! Detached background work.
//!
//! Tagging, typing indicators, mark-seen, and notification dispatch run
//! after the HTTP response with no ordering guarantee. Every detached task
//! goes through [`spawn_detached`] so its error is always caught and logged
//! instead of becoming an unobserved task failure.

use std::future::Future;

use crate::middleware::error_handling::Result;

/// Spawn a fire-and-forget task. The task's error never reaches the caller;
/// it is logged at debug level (these are cosmetic or enrichment side
/// effects, not deliverables).
pub fn spawn_detached<F>(task: &'static str, fut: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::debug!(task, error = %e, "Detached task failed");
        }
    });
}
