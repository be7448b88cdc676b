//! Core ingestion pipeline for urlharvest.
//!
//! This crate ties sitemap fetching/decoding and the document store together
//! into one end-to-end run per crawl target (see [`pipeline::Harvester`]).

pub mod pipeline;
pub mod reporter;
pub mod sink;

pub use pipeline::{ChildFailure, Harvester, RunSummary};
pub use reporter::{RunEvent, RunReporter, SilentReporter, TracingReporter};
pub use sink::PersistenceSink;
