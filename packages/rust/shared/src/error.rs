//! Error types for urlharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all urlharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/connection failure while fetching (DNS, connect, timeout, body read).
    #[error("transport error: {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with something other than `200 OK`.
    #[error("HTTP error: {url}: {status}")]
    HttpStatus {
        url: String,
        /// Numeric status code.
        code: u16,
        /// Status line text, e.g. `500 Internal Server Error`.
        status: String,
    },

    /// The payload was not a valid gzip stream.
    #[error("decompression error: {url}: {message}")]
    Decompression { url: String, message: String },

    /// The decompressed payload did not match the expected XML schema.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The document store rejected or could not complete a write.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad target, bad settings).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a transport error for `url`.
    pub fn transport(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an HTTP status error for `url`.
    pub fn http_status(url: impl Into<String>, code: u16, status: impl Into<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            code,
            status: status.into(),
        }
    }

    /// Create a decompression error for `url`.
    pub fn decompression(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decompression {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a persistence error from any displayable message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HarvestError::config("missing targets");
        assert_eq!(err.to_string(), "config error: missing targets");

        let err = HarvestError::http_status(
            "https://example.com/b.xml.gz",
            500,
            "500 Internal Server Error",
        );
        assert_eq!(
            err.to_string(),
            "HTTP error: https://example.com/b.xml.gz: 500 Internal Server Error"
        );

        let err = HarvestError::persistence("2 of 5 documents failed");
        assert!(err.to_string().starts_with("persistence error:"));
    }

    #[test]
    fn http_status_keeps_code() {
        match HarvestError::http_status("u", 404, "404 Not Found") {
            HarvestError::HttpStatus { code, .. } => assert_eq!(code, 404),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
