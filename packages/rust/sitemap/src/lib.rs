//! Sitemap fetching and decoding.
//!
//! A sitemap hierarchy is two levels of gzip-compressed XML: a
//! `<sitemapindex>` pointing at many `<urlset>` documents. [`SitemapSource`]
//! turns a URL into either shape: GET, read the body, gunzip, parse.

pub mod decoder;
pub mod fetcher;

use tracing::{debug, instrument};

use urlharvest_shared::{IngestConfig, ParseMode, Result, SitemapDetail, SitemapIndex};

pub use decoder::{MAX_DECOMPRESSED_SIZE, apply_parse_mode, gunzip, parse_detail, parse_index};
pub use fetcher::{FetchOptions, FetchedBody, Fetcher, MAX_RESPONSE_SIZE};

/// Fetches and decodes sitemap documents.
#[derive(Debug, Clone)]
pub struct SitemapSource {
    fetcher: Fetcher,
    parse_mode: ParseMode,
}

impl SitemapSource {
    pub fn new(fetcher: Fetcher, parse_mode: ParseMode) -> Self {
        Self {
            fetcher,
            parse_mode,
        }
    }

    /// Build a source from runtime ingest settings.
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&FetchOptions::from(config))?;
        Ok(Self::new(fetcher, config.parse_mode))
    }

    /// Fetch and decode a top-level `<sitemapindex>`.
    #[instrument(skip(self))]
    pub async fn fetch_index(&self, url: &str) -> Result<SitemapIndex> {
        let xml = self.fetch_decompressed(url).await?;
        let index = apply_parse_mode(url, parse_index(&xml), self.parse_mode)?;
        debug!(sitemaps = index.sitemaps.len(), "index decoded");
        Ok(index)
    }

    /// Fetch and decode a child `<urlset>`.
    #[instrument(skip(self))]
    pub async fn fetch_detail(&self, url: &str) -> Result<SitemapDetail> {
        let xml = self.fetch_decompressed(url).await?;
        let detail = apply_parse_mode(url, parse_detail(&xml), self.parse_mode)?;
        debug!(urls = detail.urls.len(), "detail decoded");
        Ok(detail)
    }

    async fn fetch_decompressed(&self, url: &str) -> Result<Vec<u8>> {
        let compressed = self.fetcher.fetch(url).await?.into_bytes().await?;
        gunzip(url, &compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use urlharvest_shared::HarvestError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gzip(data: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    async fn serve(server: &MockServer, at: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    fn source(mode: ParseMode) -> SitemapSource {
        SitemapSource::new(Fetcher::new(&FetchOptions::default()).unwrap(), mode)
    }

    #[tokio::test]
    async fn fetch_index_with_mock_server() {
        let server = MockServer::start().await;
        let xml = format!(
            "<sitemapindex><sitemap><loc>{0}/1.xml.gz</loc></sitemap>\
             <sitemap><loc>{0}/2.xml.gz</loc></sitemap></sitemapindex>",
            server.uri()
        );
        serve(&server, "/index.xml.gz", gzip(&xml)).await;

        let index = source(ParseMode::Lenient)
            .fetch_index(&format!("{}/index.xml.gz", server.uri()))
            .await
            .unwrap();

        assert_eq!(index.sitemaps.len(), 2);
        assert!(index.sitemaps[0].location.ends_with("/1.xml.gz"));
        assert!(index.sitemaps[1].location.ends_with("/2.xml.gz"));
    }

    #[tokio::test]
    async fn fetch_detail_with_mock_server() {
        let server = MockServer::start().await;
        let xml = "<urlset><url><loc>https://example.com/a</loc><priority>1.0</priority></url></urlset>";
        serve(&server, "/1.xml.gz", gzip(xml)).await;

        let detail = source(ParseMode::Strict)
            .fetch_detail(&format!("{}/1.xml.gz", server.uri()))
            .await
            .unwrap();

        assert_eq!(detail.urls.len(), 1);
        assert_eq!(detail.urls[0].priority.as_deref(), Some("1.0"));
    }

    #[tokio::test]
    async fn uncompressed_body_is_decompression_error() {
        let server = MockServer::start().await;
        serve(&server, "/plain.xml", b"<urlset></urlset>".to_vec()).await;

        let err = source(ParseMode::Lenient)
            .fetch_detail(&format!("{}/plain.xml", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Decompression { .. }));
    }

    #[tokio::test]
    async fn malformed_xml_depends_on_parse_mode() {
        let server = MockServer::start().await;
        serve(&server, "/bad.xml.gz", gzip("<urlset><url><loc>x</url>")).await;
        let url = format!("{}/bad.xml.gz", server.uri());

        let lenient = source(ParseMode::Lenient).fetch_detail(&url).await.unwrap();
        assert!(lenient.urls.is_empty());

        let strict = source(ParseMode::Strict).fetch_detail(&url).await.unwrap_err();
        assert!(matches!(strict, HarvestError::Parse { .. }));
    }
}
