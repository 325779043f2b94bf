//! AssetPack CLI - command-line interface for the asset pipeline

pub mod commands;
pub mod progress;

use std::path::PathBuf;

use clap::{Args, Parser};
use commands::Commands;

use crate::config::{Config, RunEnv};
use crate::context::Context;

#[derive(Parser)]
#[command(name = "assetpack", version)]
#[command(about = "AssetPack: texture and glTF build pipeline for web delivery", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project root the configured asset directories are relative to
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to `<root>/assetpack.toml` when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Files processed in parallel (overrides PACK_CONCURRENCY and the config)
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,

    /// Log tool command lines and skipped files
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress progress bars and informational logs
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    /// Load the configuration and build the run context.
    pub fn context(&self, env: &RunEnv) -> anyhow::Result<Context> {
        let config = Config::load(&self.root, self.config.as_deref())?;
        let ctx = Context::new(self.root.clone(), config, env)?.with_concurrency(self.concurrency);
        Ok(ctx)
    }

    fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Run the AssetPack CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_max_level(cli.global.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute(&cli.global)?;

    Ok(())
}
