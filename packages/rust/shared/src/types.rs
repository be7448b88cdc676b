//! Core domain types: crawl targets and the two sitemap document shapes.
//!
//! The sitemap structs double as the XML schema (deserialized by the decoder)
//! and the persisted document shape (serialized by the sink), so field names
//! here are the field names downstream consumers see in the store.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

// ---------------------------------------------------------------------------
// CrawlTarget
// ---------------------------------------------------------------------------

/// A remote site whose sitemap hierarchy should be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// Logical source identifier, also the storage namespace.
    pub name: String,
    /// Site origin, e.g. `https://digitallibrary.un.org`.
    pub base_url: String,
    /// Path of the top-level compressed index, e.g. `/sitemap_index.xml.gz`.
    pub sitemap_path: String,
}

impl CrawlTarget {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        sitemap_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            sitemap_path: sitemap_path.into(),
        }
    }

    /// URL of the top-level sitemap index.
    ///
    /// This is a plain concatenation of `base_url` and `sitemap_path`, not a
    /// URL join: a base with a path component keeps it.
    pub fn index_url(&self) -> String {
        format!("{}{}", self.base_url, self.sitemap_path)
    }

    /// Check that the target can be ingested: non-empty name and an absolute
    /// http(s) index URL.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HarvestError::validation("crawl target name is empty"));
        }

        let index_url = self.index_url();
        let parsed = Url::parse(&index_url).map_err(|e| {
            HarvestError::validation(format!(
                "target '{}': invalid sitemap index URL '{index_url}': {e}",
                self.name
            ))
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(HarvestError::validation(format!(
                "target '{}': unsupported scheme '{other}'",
                self.name
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sitemap index (<sitemapindex>)
// ---------------------------------------------------------------------------

/// The root `<sitemapindex>` document: an ordered list of child sitemaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "sitemapindex")]
pub struct SitemapIndex {
    #[serde(rename = "sitemap", default)]
    pub sitemaps: Vec<SitemapRef>,
}

/// One `<sitemap>` entry of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapRef {
    /// Absolute URL of a child gzip-XML sitemap. Empty when `<loc>` is absent.
    #[serde(rename = "loc", default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
}

// ---------------------------------------------------------------------------
// Sitemap detail (<urlset>)
// ---------------------------------------------------------------------------

/// A leaf `<urlset>` document listing individual URL records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "urlset")]
pub struct SitemapDetail {
    #[serde(rename = "url", default)]
    pub urls: Vec<UrlRecord>,
}

/// One `<url>` entry. Values are kept as the source text; nothing is
/// re-validated or normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Empty when `<loc>` is absent; the record is still kept.
    #[serde(default)]
    pub loc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_url_is_plain_concatenation() {
        let target = CrawlTarget::new("un", "https://digitallibrary.un.org", "/sitemap_index.xml.gz");
        assert_eq!(
            target.index_url(),
            "https://digitallibrary.un.org/sitemap_index.xml.gz"
        );

        let nested = CrawlTarget::new("docs", "https://example.com/docs", "/sitemap.xml.gz");
        assert_eq!(nested.index_url(), "https://example.com/docs/sitemap.xml.gz");
    }

    #[test]
    fn validate_accepts_http_targets() {
        let target = CrawlTarget::new("local", "http://localhost:8080", "/index.xml.gz");
        assert!(target.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_name() {
        let target = CrawlTarget::new("  ", "https://example.com", "/index.xml.gz");
        let err = target.validate().unwrap_err();
        assert!(err.to_string().contains("name is empty"));
    }

    #[test]
    fn validate_rejects_relative_and_non_http() {
        let relative = CrawlTarget::new("x", "example.com", "/index.xml.gz");
        assert!(relative.validate().is_err());

        let ftp = CrawlTarget::new("x", "ftp://example.com", "/index.xml.gz");
        let err = ftp.validate().unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn url_record_serializes_with_source_field_names() {
        let record = UrlRecord {
            loc: "https://example.com/a".into(),
            lastmod: Some("2024-01-02".into()),
            changefreq: None,
            priority: Some("0.8".into()),
        };

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["loc"], "https://example.com/a");
        assert_eq!(value["lastmod"], "2024-01-02");
        assert_eq!(value["priority"], "0.8");
        assert!(value.get("changefreq").is_none());

        let back: UrlRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }
}
