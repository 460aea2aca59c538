//! `mnemo recall` command
//!
//! Retrieves memory hits for a query, re-ranks and de-duplicates them, and
//! prints them numbered the way answers cite them (`[M1]`, `[M2]`, ...).
//!
//! # Usage
//! ```bash
//! mnemo recall "what is my favorite candy?"
//! mnemo recall "candy" --limit 3 --format json > hits.json
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_storage, preview, print_json, project_id};
use super::OutputFormat;
use crate::config::Config;
use crate::core::hit::MemoryHit;
use crate::retrieval::{HitRanker, LocalSearch, Retriever};

#[derive(Args, Debug)]
pub struct RecallArgs {
    /// Query text
    pub query: String,

    /// Maximum hits after ranking (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Project id (default from config)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub async fn run(args: RecallArgs) -> Result<()> {
    let config = Config::load()?;
    let storage = open_storage(&config)?;
    let project = project_id(&config, args.project.as_deref());

    let retriever = Retriever::new(Arc::new(LocalSearch::new(storage)), config.retrieval.clone());
    let retrieval = retriever.retrieve(&project, &args.query).await;

    let max_hits = args.limit.unwrap_or(config.ranking.max_hits);
    let hits = HitRanker::new(config.ranking.clone()).rank_and_dedupe(retrieval.hits, &args.query, max_hits);

    match args.format {
        OutputFormat::Json => print_json(&hits)?,
        OutputFormat::Pretty => {
            if retrieval.degraded {
                eprintln!("{} Search unavailable, showing no results", "!".yellow());
            }
            print_hits(&hits);
        }
    }

    Ok(())
}

fn print_hits(hits: &[MemoryHit]) {
    if hits.is_empty() {
        println!("No memories found.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{} {} {}",
            format!("[M{}]", i + 1).cyan(),
            preview(&hit.content, 100),
            format!("({:.2})", hit.score).dimmed()
        );
    }
}
