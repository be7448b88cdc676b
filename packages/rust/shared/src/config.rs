//! Application configuration for urlharvest.
//!
//! User config lives at `~/.urlharvest/urlharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::types::CrawlTarget;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "urlharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".urlharvest";

/// Store name every sitemap target is persisted under.
pub const DEFAULT_STORE_NAME: &str = "urls";

// ---------------------------------------------------------------------------
// Config structs (matching urlharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Ingestion behaviour.
    #[serde(default)]
    pub ingest: IngestSettings,

    /// Registered crawl targets.
    #[serde(default)]
    pub targets: Vec<CrawlTarget>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
            ingest: IngestSettings::default(),
            targets: vec![CrawlTarget::new(
                "un",
                "https://digitallibrary.un.org",
                "/sitemap_index.xml.gz",
            )],
        }
    }
}

impl AppConfig {
    /// Look up a registered target by name.
    pub fn target(&self, name: &str) -> Result<&CrawlTarget> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| HarvestError::config(format!("no target named '{name}' in config")))
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file. A leading `~/` is expanded to the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Store (collection group) name; targets are namespaces inside it.
    #[serde(default = "default_store_name")]
    pub store_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            store_name: default_store_name(),
        }
    }
}

impl StorageConfig {
    /// Resolve `database_path`, expanding `~/`.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }
}

fn default_database_path() -> String {
    "~/.urlharvest/urlharvest.db".into()
}
fn default_store_name() -> String {
    DEFAULT_STORE_NAME.into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    concat!("urlharvest/", env!("CARGO_PKG_VERSION")).into()
}

/// What to do when a sitemap payload is not valid XML for its schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseMode {
    /// Log the error and continue with an empty document.
    #[default]
    Lenient,
    /// Treat the parse error as fatal.
    Strict,
}

/// What to do when a child sitemap fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the run on the first error.
    #[default]
    FailFast,
    /// Record the failure and move on to the next child sitemap.
    Continue,
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default)]
    pub parse_mode: ParseMode,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Child sitemaps processed at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::default(),
            failure_policy: FailurePolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Ingest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime ingest configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Store name documents are written under.
    pub store_name: String,
    pub parse_mode: ParseMode,
    pub failure_policy: FailurePolicy,
    pub concurrency: usize,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for IngestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            store_name: config.storage.store_name.clone(),
            parse_mode: config.ingest.parse_mode,
            failure_policy: config.ingest.failure_policy,
            concurrency: config.ingest.concurrency,
            timeout_secs: config.http.timeout_secs,
            user_agent: config.http.user_agent.clone(),
        }
    }
}

impl IngestConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(HarvestError::config("concurrency must be at least 1"));
        }
        if self.store_name.trim().is_empty() {
            return Err(HarvestError::config("store_name must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(HarvestError::config("timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.urlharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.urlharvest/urlharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("digitallibrary.un.org"));
        assert!(toml_str.contains("lenient"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.storage.store_name, "urls");
        assert_eq!(parsed.ingest.concurrency, 1);
        assert_eq!(parsed.targets.len(), 1);
        assert_eq!(parsed.targets[0].sitemap_path, "/sitemap_index.xml.gz");
    }

    #[test]
    fn config_with_targets_and_modes() {
        let toml_str = r#"
[ingest]
parse_mode = "strict"
failure_policy = "continue"
concurrency = 4

[[targets]]
name = "docs"
base_url = "https://docs.example.com"
sitemap_path = "/sitemap.xml.gz"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.ingest.parse_mode, ParseMode::Strict);
        assert_eq!(config.ingest.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.target("docs").unwrap().base_url, "https://docs.example.com");
        assert!(config.target("un").is_err());
        // Sections not present fall back to defaults.
        assert_eq!(config.storage.store_name, "urls");
        assert_eq!(config.http.timeout_secs, 60);
    }

    #[test]
    fn ingest_config_from_app_config() {
        let app = AppConfig::default();
        let ingest = IngestConfig::from(&app);
        assert_eq!(ingest.store_name, "urls");
        assert_eq!(ingest.parse_mode, ParseMode::Lenient);
        assert_eq!(ingest.failure_policy, FailurePolicy::FailFast);
        assert_eq!(ingest.concurrency, 1);
        assert!(ingest.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let ingest = IngestConfig {
            concurrency: 0,
            ..IngestConfig::default()
        };
        let err = ingest.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn database_path_expansion() {
        let storage = StorageConfig {
            database_path: "/tmp/urls.db".into(),
            store_name: "urls".into(),
        };
        assert_eq!(
            storage.resolved_database_path().unwrap(),
            PathBuf::from("/tmp/urls.db")
        );

        let home_relative = StorageConfig::default();
        let resolved = home_relative.resolved_database_path().unwrap();
        assert!(resolved.ends_with(".urlharvest/urlharvest.db"));
    }
}
