//! Traversal pipeline: sitemap index → child sitemaps → store.
//!
//! 1. Fetch and decode `base_url + sitemap_path` as a sitemap index
//! 2. For each child location, in index order: fetch, decode, bulk insert
//! 3. Report per-child counts
//!
//! The first error aborts the run unless [`FailurePolicy::Continue`] is set,
//! in which case failing children are collected in the [`RunSummary`]. The
//! index fetch is always fatal.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{info, instrument};

use urlharvest_shared::{CrawlTarget, FailurePolicy, HarvestError, IngestConfig, Result, SitemapRef};
use urlharvest_sitemap::SitemapSource;
use urlharvest_storage::DocumentStore;

use crate::reporter::{RunEvent, RunReporter};
use crate::sink::PersistenceSink;

/// A child sitemap that failed under [`FailurePolicy::Continue`].
#[derive(Debug)]
pub struct ChildFailure {
    pub location: String,
    pub error: HarvestError,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Storage namespace (the target name).
    pub namespace: String,
    /// Child sitemaps listed in the index.
    pub sitemaps_total: usize,
    /// Child sitemaps whose records were persisted.
    pub sitemaps_persisted: usize,
    /// Documents written across all children.
    pub documents: usize,
    pub failures: Vec<ChildFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether every listed child sitemap was persisted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.sitemaps_persisted == self.sitemaps_total
    }

    /// Stats payload for the run history.
    pub fn stats_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.failures.is_empty() { "completed" } else { "completed_with_errors" },
            "sitemaps_total": self.sitemaps_total,
            "sitemaps_persisted": self.sitemaps_persisted,
            "documents": self.documents,
            "failures": self
                .failures
                .iter()
                .map(|f| serde_json::json!({ "location": f.location, "error": f.error.to_string() }))
                .collect::<Vec<_>>(),
            "elapsed_ms": self.elapsed.as_millis() as u64,
        })
    }
}

/// Runs sitemap ingestion for crawl targets against one store.
pub struct Harvester<'a, S> {
    source: SitemapSource,
    store: &'a S,
    config: IngestConfig,
    reporter: &'a dyn RunReporter,
}

impl<'a, S: DocumentStore> Harvester<'a, S> {
    pub fn new(
        source: SitemapSource,
        store: &'a S,
        config: IngestConfig,
        reporter: &'a dyn RunReporter,
    ) -> Self {
        Self {
            source,
            store,
            config,
            reporter,
        }
    }

    /// Build a harvester whose HTTP client and parse mode come from `config`.
    pub fn from_config(
        config: &IngestConfig,
        store: &'a S,
        reporter: &'a dyn RunReporter,
    ) -> Result<Self> {
        config.validate()?;
        let source = SitemapSource::from_config(config)?;
        Ok(Self::new(source, store, config.clone(), reporter))
    }

    /// Ingest every URL record reachable from `target`'s sitemap index.
    #[instrument(skip_all, fields(target = %target.name))]
    pub async fn run(&self, target: &CrawlTarget) -> Result<RunSummary> {
        let start = Instant::now();

        match self.traverse(target, start).await {
            Ok(summary) => {
                info!(
                    sitemaps = summary.sitemaps_persisted,
                    documents = summary.documents,
                    failures = summary.failures.len(),
                    elapsed_ms = summary.elapsed.as_millis(),
                    "run complete"
                );
                self.reporter.report(RunEvent::Finished { summary: &summary });
                Ok(summary)
            }
            Err(error) => {
                self.reporter.report(RunEvent::Failed { error: &error });
                Err(error)
            }
        }
    }

    async fn traverse(&self, target: &CrawlTarget, start: Instant) -> Result<RunSummary> {
        target.validate()?;

        let index_url = target.index_url();
        self.reporter.report(RunEvent::Requesting { url: &index_url });
        let index = self.source.fetch_index(&index_url).await?;
        self.reporter.report(RunEvent::IndexLoaded {
            url: &index_url,
            sitemaps: index.sitemaps.len(),
        });

        let mut summary = RunSummary {
            namespace: target.name.clone(),
            sitemaps_total: index.sitemaps.len(),
            sitemaps_persisted: 0,
            documents: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        };

        let sink = PersistenceSink::new(self.store, self.config.store_name.as_str());
        let sink = &sink;
        let namespace = target.name.as_str();

        // With concurrency 1 this is strictly sequential, in index order.
        let mut children = stream::iter(index.sitemaps)
            .map(move |sitemap| self.process_child(sink, namespace, sitemap))
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((location, outcome)) = children.next().await {
            match outcome {
                Ok(count) => {
                    summary.sitemaps_persisted += 1;
                    summary.documents += count;
                }
                Err(error) => match self.config.failure_policy {
                    // Dropping the stream cancels any children still in flight.
                    FailurePolicy::FailFast => return Err(error),
                    FailurePolicy::Continue => {
                        self.reporter.report(RunEvent::ChildFailed {
                            sitemap: &location,
                            error: &error,
                        });
                        summary.failures.push(ChildFailure { location, error });
                    }
                },
            }
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    /// Fetch, decode and persist one child sitemap.
    async fn process_child(
        &self,
        sink: &PersistenceSink<'_, S>,
        namespace: &str,
        sitemap: SitemapRef,
    ) -> (String, Result<usize>) {
        let location = sitemap.location;

        let outcome = async {
            self.reporter.report(RunEvent::Requesting { url: &location });
            let detail = self.source.fetch_detail(&location).await?;
            let count = sink.insert_batch(namespace, detail.urls).await?;
            self.reporter.report(RunEvent::Persisted {
                sitemap: &location,
                count,
            });
            Ok::<_, HarvestError>(count)
        }
        .await;

        (location, outcome)
    }
}
