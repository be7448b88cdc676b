//! HTTP fetching for sitemap resources.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use urlharvest_shared::{HarvestError, IngestConfig, Result};

/// Maximum number of redirects to follow per request.
const MAX_REDIRECTS: usize = 5;

/// Default cap on a compressed response body (100 MB).
pub const MAX_RESPONSE_SIZE: u64 = 100 * 1024 * 1024;

/// Settings for the HTTP client.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Bodies larger than this fail while being read.
    pub max_body_bytes: u64,
}

impl From<&IngestConfig> for FetchOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            user_agent: config.user_agent.clone(),
            max_body_bytes: MAX_RESPONSE_SIZE,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

/// Issues plain GET requests and classifies responses by status.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: u64,
}

impl Fetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        // Bodies are gzip files, not gzip content-encoding: no transparent
        // decompression is enabled on the client.
        let client = Client::builder()
            .user_agent(opts.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| HarvestError::transport("-", format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_body_bytes: opts.max_body_bytes,
        })
    }

    /// GET `url`, succeeding only on `200 OK`.
    ///
    /// The returned [`FetchedBody`] owns the open response; dropping it
    /// releases the connection whether or not the body was read.
    pub async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        debug!(%url, "requesting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::transport(url, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(HarvestError::http_status(url, status.as_u16(), status.to_string()));
        }

        Ok(FetchedBody {
            url: url.to_string(),
            response,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

/// An open `200 OK` response whose body has not been read yet.
#[derive(Debug)]
pub struct FetchedBody {
    url: String,
    response: Response,
    max_body_bytes: u64,
}

impl FetchedBody {
    /// The URL this body was requested from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read the whole body into memory, consuming the response.
    ///
    /// Reading stops with a transport error once the body passes the
    /// configured cap, whether or not the server sent a `Content-Length`.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        let Self {
            url,
            mut response,
            max_body_bytes,
        } = self;

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| HarvestError::transport(&url, format!("failed to read body: {e}")))?
        {
            if (body.len() + chunk.len()) as u64 > max_body_bytes {
                return Err(HarvestError::transport(
                    &url,
                    format!("response body exceeds {max_body_bytes} bytes"),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(%url, bytes = body.len(), "body read");
        Ok(body)
    }
}
