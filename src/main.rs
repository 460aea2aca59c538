//! mnemo CLI - Entry point
//!
//! Usage: mnemo <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mnemo::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "mnemo=debug" } else { "mnemo=warn" };

    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if let Some(path) = &cli.config {
        std::env::set_var("MNEMO_CONFIG", path);
    }

    match cli.command {
        Commands::Init(args) => mnemo::cli::init::run(args),
        Commands::Remember(args) => mnemo::cli::remember::run(args).await,
        Commands::Favorites(args) => mnemo::cli::favorites::run(args),
        Commands::Facts(args) => mnemo::cli::facts::run(args),
        Commands::Clear(args) => mnemo::cli::clear::run(args),
        Commands::Recall(args) => mnemo::cli::recall::run(args).await,
        Commands::Cite(args) => mnemo::cli::cite::run(args),
        Commands::Escalate(args) => mnemo::cli::escalate::run(args).await,
        Commands::Stats(args) => mnemo::cli::stats::run(args),
        Commands::Config(args) => mnemo::cli::config::run(args),
    }
}
