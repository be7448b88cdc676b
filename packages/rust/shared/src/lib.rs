//! Shared types, error model, and configuration for urlharvest.
//!
//! This crate is the foundation depended on by all other urlharvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`CrawlTarget`], [`SitemapIndex`], [`SitemapDetail`], [`UrlRecord`])
//! - Configuration ([`AppConfig`], [`IngestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_STORE_NAME, FailurePolicy, HttpConfig, IngestConfig, IngestSettings,
    ParseMode, StorageConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{CrawlTarget, SitemapDetail, SitemapIndex, SitemapRef, UrlRecord};
