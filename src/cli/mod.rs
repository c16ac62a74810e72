//! CLI argument parsing and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::runner::run_config;

#[derive(Parser)]
#[command(name = "requester")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tasks of a configuration file
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Run only the named task
        #[arg(short, long)]
        task: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Cli {
    /// Default log filter for the chosen verbosity
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Execute the selected command
    pub async fn dispatch(self) -> Result<()> {
        match self.command {
            Commands::Run { config, task } => {
                let config = requester_core::load_config(&config)
                    .with_context(|| format!("failed to load {}", config.display()))?;
                run_config(&config, task.as_deref()).await
            }
            Commands::Validate { config: path } => {
                let config = requester_core::load_config(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?;
                println!(
                    "{}: valid (version {}, {} task(s))",
                    path.display(),
                    config.version,
                    config.tasks.len()
                );
                for task in &config.tasks {
                    println!(
                        "  {}: {} request(s), {} coroutine(s), rps {}",
                        task.name,
                        task.requests.len(),
                        task.policy.limits.coroutines,
                        task.policy
                            .limits
                            .effective_rps()
                            .map_or_else(|| "unlimited".to_string(), |rps| rps.to_string())
                    );
                }
                Ok(())
            }
        }
    }
}
