//! `mnemo facts` command
//!
//! # Usage
//! ```bash
//! mnemo facts                        # Everything in the project
//! mnemo facts --prefix user.habits   # One subtree
//! mnemo facts --format json
//! ```

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use super::utils::{open_storage, preview, print_json, project_id};
use super::OutputFormat;
use crate::config::Config;
use crate::core::fact::Fact;

#[derive(Args, Debug)]
pub struct FactsArgs {
    /// Only keys at or below this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Project id (default from config)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct FactRow {
    key: String,
    value: String,
    #[tabled(rename = "type")]
    value_type: String,
    confidence: String,
    updated: String,
}

impl From<&Fact> for FactRow {
    fn from(fact: &Fact) -> Self {
        Self {
            key: fact.fact_key.clone(),
            value: preview(&fact.value_text, 48),
            value_type: fact.value_type.to_string(),
            confidence: format!("{:.2}", fact.confidence),
            updated: fact.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub fn run(args: FactsArgs) -> Result<()> {
    let config = Config::load()?;
    let storage = open_storage(&config)?;
    let project = project_id(&config, args.project.as_deref());

    let facts = storage.list(&project, args.prefix.as_deref())?;

    if args.format == OutputFormat::Json {
        return print_json(&facts);
    }

    if facts.is_empty() {
        println!("No facts stored for project {}.", project);
        return Ok(());
    }

    let mut table = Table::new(facts.iter().map(FactRow::from));
    table.with(Style::rounded());
    println!("{}", table);
    println!("{} fact(s)", facts.len());

    Ok(())
}
