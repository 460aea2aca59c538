//! `mnemo init` command
//!
//! Creates a `.mnemo/` directory with a default config and an empty database.
//!
//! # Usage
//! ```bash
//! mnemo init                    # Initialize in current directory
//! mnemo init /path/to/project   # Initialize in specific path
//! mnemo init --global           # Initialize global ~/.mnemo
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::{Config, CONFIG_FILE, DB_FILE, DIR_NAME};
use crate::core::storage::Storage;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Initialize global config (~/.mnemo)
    #[arg(long)]
    pub global: bool,

    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let base_path = if args.global {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .context("Could not determine home directory")?
    } else {
        args.path.unwrap_or_else(|| PathBuf::from("."))
    };

    let dir = base_path.join(DIR_NAME);

    if is_initialized(&base_path) && !args.force {
        bail!(
            "Directory {} is already initialized. Use --force to reinitialize.",
            base_path.display()
        );
    }

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    Config::default().save_to(&config_path)?;

    let db_path = dir.join(DB_FILE);
    Storage::open(&db_path)?;

    println!("{} Initialized mnemo in {}", "✓".green(), base_path.display());
    println!("   Config:   {}", config_path.display());
    println!("   Database: {}", db_path.display());
    println!("\nNext steps:");
    println!("  mnemo remember \"My favorite candies are Twix, Snickers\"");
    println!("  mnemo favorites candy");

    Ok(())
}

fn is_initialized(path: &Path) -> bool {
    path.join(DIR_NAME).join(CONFIG_FILE).exists()
}
