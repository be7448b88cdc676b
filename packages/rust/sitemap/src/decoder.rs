//! Gzip + XML decoding for sitemap payloads.
//!
//! Both sitemap shapes arrive gzip-framed:
//! - `<sitemapindex>` with `<sitemap><loc>..</loc></sitemap>` children
//! - `<urlset>` with `<url><loc>..</loc><lastmod>..</lastmod>..</url>` children
//!
//! Payloads are decompressed fully into memory before parsing.

use std::io::Read;

use flate2::read::MultiGzDecoder;
use serde::de::DeserializeOwned;
use tracing::warn;

use urlharvest_shared::{HarvestError, ParseMode, Result, SitemapDetail, SitemapIndex};

/// Magic bytes at the start of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on a single decompressed payload (256 MiB).
pub const MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Decompression
// ---------------------------------------------------------------------------

/// Decompress a complete gzip payload fetched from `url`.
///
/// Concatenated gzip members are decoded as one stream. Any framing error
/// fails the whole payload; partial output is discarded.
pub fn gunzip(url: &str, compressed: &[u8]) -> Result<Vec<u8>> {
    if compressed.is_empty() {
        return Err(HarvestError::decompression(url, "empty body"));
    }
    if !compressed.starts_with(&GZIP_MAGIC) {
        return Err(HarvestError::decompression(url, "not a gzip stream"));
    }

    let mut decoded = Vec::with_capacity(capacity_hint(compressed.len()));
    MultiGzDecoder::new(compressed)
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| HarvestError::decompression(url, e.to_string()))?;

    if decoded.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(HarvestError::decompression(
            url,
            format!("payload exceeds {MAX_DECOMPRESSED_SIZE} bytes once decompressed"),
        ));
    }

    Ok(decoded)
}

/// Initial buffer size for a payload of `compressed_len` bytes, never above the cap.
fn capacity_hint(compressed_len: usize) -> usize {
    compressed_len
        .saturating_mul(4)
        .min(MAX_DECOMPRESSED_SIZE as usize)
}

// ---------------------------------------------------------------------------
// XML parsing
// ---------------------------------------------------------------------------

/// Parse a `<sitemapindex>` document.
pub fn parse_index(xml: &[u8]) -> Result<SitemapIndex> {
    parse_xml(xml, "sitemap index")
}

/// Parse a `<urlset>` document.
pub fn parse_detail(xml: &[u8]) -> Result<SitemapDetail> {
    parse_xml(xml, "sitemap detail")
}

fn parse_xml<T: DeserializeOwned>(xml: &[u8], kind: &str) -> Result<T> {
    quick_xml::de::from_reader(xml)
        .map_err(|e| HarvestError::parse(format!("invalid {kind} XML: {e}")))
}

/// Apply `mode` to a parse result.
///
/// In [`ParseMode::Lenient`] a parse error is logged and replaced by the
/// empty document, so a malformed sitemap yields zero entries instead of
/// failing the run.
pub fn apply_parse_mode<T: Default>(url: &str, parsed: Result<T>, mode: ParseMode) -> Result<T> {
    match (parsed, mode) {
        (Ok(doc), _) => Ok(doc),
        (Err(e), ParseMode::Lenient) => {
            warn!(%url, error = %e, "ignoring unparseable sitemap, continuing with no entries");
            Ok(T::default())
        }
        (Err(e), ParseMode::Strict) => Err(e),
    }
}
