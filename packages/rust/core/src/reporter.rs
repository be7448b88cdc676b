//! Run progress reporting.
//!
//! Reporters observe a run; they never influence it. Every method is
//! fire-and-forget and must be safe to call from concurrent child tasks.

use tracing::{info, warn};

use urlharvest_shared::HarvestError;

use crate::pipeline::RunSummary;

/// A progress/outcome signal emitted during a run.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    /// About to GET `url` (the index or a child sitemap).
    Requesting { url: &'a str },
    /// The index was decoded and lists `sitemaps` children.
    IndexLoaded { url: &'a str, sitemaps: usize },
    /// `count` records from `sitemap` were handed to the store.
    Persisted { sitemap: &'a str, count: usize },
    /// A child failed and the run moved on (continue policy only).
    ChildFailed {
        sitemap: &'a str,
        error: &'a HarvestError,
    },
    /// The run completed.
    Finished { summary: &'a RunSummary },
    /// The run aborted.
    Failed { error: &'a HarvestError },
}

/// Receives [`RunEvent`]s.
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>);
}

/// No-op reporter for headless/test usage.
pub struct SilentReporter;

impl RunReporter for SilentReporter {
    fn report(&self, _event: RunEvent<'_>) {}
}

/// Reporter that forwards every event to `tracing`.
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Requesting { url } => info!(%url, "requesting"),
            RunEvent::IndexLoaded { url, sitemaps } => {
                info!(%url, sitemaps, "sitemap index loaded")
            }
            RunEvent::Persisted { sitemap, count } => info!(%sitemap, count, "persisted"),
            RunEvent::ChildFailed { sitemap, error } => {
                warn!(%sitemap, %error, "child sitemap failed, continuing")
            }
            RunEvent::Finished { summary } => info!(
                namespace = %summary.namespace,
                sitemaps = summary.sitemaps_persisted,
                documents = summary.documents,
                failures = summary.failures.len(),
                "run finished"
            ),
            RunEvent::Failed { error } => warn!(%error, "run failed"),
        }
    }
}
