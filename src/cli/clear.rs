//! `mnemo clear` command
//!
//! The only way facts are ever deleted.
//!
//! # Usage
//! ```bash
//! mnemo clear --topic candy          # One ranked list
//! mnemo clear --prefix user.habits   # A key subtree
//! mnemo clear --all --yes            # Whole project
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use super::utils::{open_storage, project_id};
use crate::config::Config;
use crate::core::store::{ClearScope, FactStore};

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Clear one ranked list
    #[arg(long, conflicts_with = "prefix")]
    pub topic: Option<String>,

    /// Clear a key and everything below it
    #[arg(long)]
    pub prefix: Option<String>,

    /// Clear every fact in the project
    #[arg(long, conflicts_with_all = ["topic", "prefix"])]
    pub all: bool,

    /// Confirm clearing the whole project
    #[arg(short, long)]
    pub yes: bool,

    /// Project id (default from config)
    #[arg(short, long)]
    pub project: Option<String>,
}

pub fn run(args: ClearArgs) -> Result<()> {
    let scope = if let Some(topic) = args.topic {
        ClearScope::Topic(topic)
    } else if let Some(prefix) = args.prefix {
        ClearScope::Prefix(prefix)
    } else if args.all {
        if !args.yes {
            bail!("Refusing to clear the whole project without --yes");
        }
        ClearScope::All
    } else {
        bail!("Nothing to clear. Use --topic, --prefix or --all");
    };

    let config = Config::load()?;
    let storage = open_storage(&config)?;
    let project = project_id(&config, args.project.as_deref());

    let deleted = storage.clear(&project, &scope)?;
    println!("{} Deleted {} fact(s)", "✓".green(), deleted);

    Ok(())
}
