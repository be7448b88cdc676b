//! urlharvest CLI: ingest sitemap hierarchies into a local document store.
//!
//! Fetches a site's gzip sitemap index, walks every child sitemap, and stores
//! each discovered URL record under the target's namespace.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
