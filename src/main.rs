//! requester - rate-limited HTTP load generator

use anyhow::Result;
use clap::Parser;

mod cli;
mod runner;
mod stats;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Initialize tracing; RUST_LOG directives take precedence
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(cli.log_level().into())
                .from_env_lossy(),
        )
        .init();

    tracing::debug!("requester starting");

    cli.dispatch().await
}
