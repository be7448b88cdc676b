//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use urlharvest_core::{Harvester, RunEvent, RunReporter, RunSummary, TracingReporter};
use urlharvest_shared::{
    AppConfig, CrawlTarget, FailurePolicy, IngestConfig, ParseMode, init_config, load_config,
    load_config_from,
};
use urlharvest_storage::{Collection, DocumentStore, MemoryStore, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// urlharvest: pull every URL out of a site's sitemap hierarchy.
#[derive(Parser)]
#[command(
    name = "urlharvest",
    version,
    about = "Ingest gzip sitemap hierarchies into a local document store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.urlharvest/urlharvest.toml).
    #[arg(long, global = true, env = "URLHARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides `[storage].database_path`).
    #[arg(long, global = true, env = "URLHARVEST_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch sitemap indexes and store every URL record they reach.
    Ingest(IngestArgs),

    /// List configured crawl targets.
    Targets,

    /// Show stored document counts.
    Stats {
        /// Namespace (target name). Lists all namespaces when omitted.
        namespace: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub(crate) struct IngestArgs {
    /// Configured target names to ingest.
    pub targets: Vec<String>,

    /// Ingest every configured target.
    #[arg(long, conflicts_with = "targets")]
    pub all: bool,

    /// Name of an ad-hoc target (also its storage namespace).
    #[arg(long, requires_all = ["base_url", "sitemap_path"], conflicts_with_all = ["targets", "all"])]
    pub name: Option<String>,

    /// Base URL of the ad-hoc target, e.g. https://digitallibrary.un.org.
    #[arg(long, requires = "name")]
    pub base_url: Option<String>,

    /// Sitemap index path of the ad-hoc target, e.g. /sitemap_index.xml.gz.
    #[arg(long, requires = "name")]
    pub sitemap_path: Option<String>,

    /// Treat malformed sitemap XML as an error instead of an empty document.
    #[arg(long)]
    pub strict: bool,

    /// Record failing child sitemaps and keep going.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Child sitemaps processed at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Write to an in-memory store instead of the database.
    #[arg(long)]
    pub dry_run: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "urlharvest=info",
        1 => "urlharvest=debug",
        _ => "urlharvest=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest(args) => {
            cmd_ingest(&config, cli.db.as_deref(), &args, &cli.log_format).await
        }
        Command::Targets => cmd_targets(&config),
        Command::Stats { namespace } => {
            cmd_stats(&config, cli.db.as_deref(), namespace.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn resolve_db_path(config: &AppConfig, db: Option<&Path>) -> Result<PathBuf> {
    match db {
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(config.storage.resolved_database_path()?),
    }
}

/// Targets named on the command line, all configured targets, or one ad-hoc target.
fn resolve_targets(config: &AppConfig, args: &IngestArgs) -> Result<Vec<CrawlTarget>> {
    if let (Some(name), Some(base_url), Some(sitemap_path)) =
        (&args.name, &args.base_url, &args.sitemap_path)
    {
        return Ok(vec![CrawlTarget::new(
            name.as_str(),
            base_url.as_str(),
            sitemap_path.as_str(),
        )]);
    }

    let targets: Vec<CrawlTarget> = if args.all {
        config.targets.clone()
    } else {
        args.targets
            .iter()
            .map(|name| config.target(name).cloned())
            .collect::<urlharvest_shared::Result<_>>()?
    };

    if targets.is_empty() {
        return Err(eyre!(
            "nothing to ingest: name a target, pass --all, or give --name/--base-url/--sitemap-path"
        ));
    }
    Ok(targets)
}

/// Runtime ingest settings: config file first, CLI flags on top.
fn resolve_ingest_config(config: &AppConfig, args: &IngestArgs) -> IngestConfig {
    let mut ingest = IngestConfig::from(config);
    if args.strict {
        ingest.parse_mode = ParseMode::Strict;
    }
    if args.continue_on_error {
        ingest.failure_policy = FailurePolicy::Continue;
    }
    if let Some(n) = args.concurrency {
        ingest.concurrency = n;
    }
    ingest
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    config: &AppConfig,
    db: Option<&Path>,
    args: &IngestArgs,
    log_format: &LogFormat,
) -> Result<()> {
    let targets = resolve_targets(config, args)?;
    let ingest = resolve_ingest_config(config, args);

    info!(
        targets = targets.len(),
        store = %ingest.store_name,
        concurrency = ingest.concurrency,
        dry_run = args.dry_run,
        "starting ingest"
    );

    // JSON logs are for machines; skip the spinner there. One spinner spans
    // every target and is cleared when `progress` drops.
    let progress = matches!(log_format, LogFormat::Text).then(CliProgress::new);
    let reporter: &dyn RunReporter = match &progress {
        Some(p) => p,
        None => &TracingReporter,
    };
    let show = |summary: &RunSummary, dry_run: bool| {
        let text = format_summary(summary, dry_run);
        match &progress {
            Some(p) => p.line(text),
            None => println!("{text}"),
        }
    };

    let mut incomplete = 0usize;

    if args.dry_run {
        let store = MemoryStore::new();
        let harvester = Harvester::from_config(&ingest, &store, reporter)?;
        for target in &targets {
            let summary = harvester.run(target).await?;
            show(&summary, true);
            incomplete += usize::from(!summary.is_complete());
        }
    } else {
        let db_path = resolve_db_path(config, db)?;
        let storage = Storage::open(&db_path).await?;
        let harvester = Harvester::from_config(&ingest, &storage, reporter)?;

        for target in &targets {
            let collection = Collection::new(ingest.store_name.as_str(), target.name.as_str());
            let run_id = storage.insert_run(&collection).await?;

            match harvester.run(target).await {
                Ok(summary) => {
                    storage
                        .finish_run(&run_id, &summary.stats_json().to_string())
                        .await?;
                    show(&summary, false);
                    incomplete += usize::from(!summary.is_complete());
                }
                Err(e) => {
                    let stats = serde_json::json!({ "status": "failed", "error": e.to_string() });
                    if let Err(history) = storage.finish_run(&run_id, &stats.to_string()).await {
                        tracing::warn!(error = %history, "failed to record run outcome");
                    }
                    return Err(e.into());
                }
            }
        }
    }

    if incomplete > 0 {
        return Err(eyre!("{incomplete} target(s) finished with failed child sitemaps"));
    }
    Ok(())
}

fn format_summary(summary: &RunSummary, dry_run: bool) -> String {
    use std::fmt::Write;

    let mut out = String::from("\n");
    if dry_run {
        out.push_str("  Dry run complete (nothing written to disk)\n");
    } else {
        out.push_str("  Ingest complete\n");
    }
    let _ = writeln!(out, "  Namespace: {}", summary.namespace);
    let _ = writeln!(
        out,
        "  Sitemaps:  {}/{}",
        summary.sitemaps_persisted, summary.sitemaps_total
    );
    let _ = writeln!(out, "  Documents: {}", summary.documents);
    let _ = writeln!(out, "  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    for failure in &summary.failures {
        let _ = writeln!(out, "  Failed:    {} ({})", failure.location, failure.error);
    }
    out
}

fn cmd_targets(config: &AppConfig) -> Result<()> {
    if config.targets.is_empty() {
        println!("No targets configured. Add [[targets]] to the config file.");
        return Ok(());
    }
    for target in &config.targets {
        println!("{:<16} {}", target.name, target.index_url());
    }
    Ok(())
}

async fn cmd_stats(config: &AppConfig, db: Option<&Path>, namespace: Option<&str>) -> Result<()> {
    let db_path = resolve_db_path(config, db)?;
    if !db_path.exists() {
        return Err(eyre!(
            "no database at '{}' (run `urlharvest ingest` first)",
            db_path.display()
        ));
    }

    let storage = Storage::open_readonly(&db_path).await?;
    let store_name = config.storage.store_name.as_str();

    match namespace {
        Some(ns) => {
            let count = storage.count(&Collection::new(store_name, ns)).await?;
            println!("{store_name}/{ns}: {count} documents");
        }
        None => {
            let namespaces = storage.namespaces(store_name).await?;
            if namespaces.is_empty() {
                println!("{store_name}: no documents");
            }
            for (ns, count) in namespaces {
                println!("{store_name}/{ns}: {count} documents");
            }
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Line-oriented progress on stdout with an indicatif spinner underneath.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn line(&self, text: String) {
        self.spinner.suspend(|| println!("{text}"));
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl RunReporter for CliProgress {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Requesting { url } => {
                self.line(format!("Requesting {url}"));
                self.spinner.set_message(format!("Fetching {url}"));
            }
            RunEvent::IndexLoaded { sitemaps, .. } => {
                self.spinner
                    .set_message(format!("Index lists {sitemaps} sitemaps"));
            }
            RunEvent::Persisted { count, .. } => {
                self.line(format!("Success saving {count}"));
            }
            RunEvent::ChildFailed { sitemap, error } => {
                self.line(format!("Failed {sitemap}: {error}"));
            }
            RunEvent::Finished { summary } => {
                self.spinner
                    .set_message(format!("Finished {}", summary.namespace));
            }
            RunEvent::Failed { .. } => {}
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
