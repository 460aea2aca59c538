//! `mnemo escalate` command
//!
//! # Usage
//! ```bash
//! mnemo escalate "compare my options" "Twix."
//! mnemo escalate "favorite candy?" "Your favorite candy is Twix." --hits hits.json
//! mnemo escalate "favorite candy?" "Your favorite candy is Twix." --search
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_storage, print_json, project_id, read_hits};
use super::OutputFormat;
use crate::config::Config;
use crate::retrieval::{EscalationAdvisor, LocalSearch, Retrieval, Retriever};

#[derive(Args, Debug)]
pub struct EscalateArgs {
    /// The user's query
    pub query: String,

    /// The candidate answer
    pub answer: String,

    /// JSON file with supporting hits
    #[arg(long)]
    pub hits: Option<PathBuf>,

    /// Search the local store for supporting hits instead
    #[arg(long, conflicts_with = "hits")]
    pub search: bool,

    /// Project id for --search (default from config)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Check assistant hits for conflicting statements
    #[arg(long)]
    pub contradictions: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub async fn run(args: EscalateArgs) -> Result<()> {
    let config = Config::load()?;

    let retrieval = if args.search {
        let storage = open_storage(&config)?;
        let project = project_id(&config, args.project.as_deref());
        Retriever::new(Arc::new(LocalSearch::new(storage)), config.retrieval.clone())
            .retrieve(&project, &args.query)
            .await
    } else {
        Retrieval {
            hits: read_hits(args.hits.as_ref())?,
            degraded: false,
        }
    };

    let mut escalation = config.escalation.clone();
    escalation.detect_contradictions |= args.contradictions;

    let decision = EscalationAdvisor::new(escalation).assess(&args.query, &retrieval, &args.answer);

    match args.format {
        OutputFormat::Json => print_json(&decision)?,
        OutputFormat::Pretty => match decision.reason {
            Some(reason) if decision.should_escalate => {
                println!("{} escalate ({})", "↑".yellow(), reason)
            }
            _ => println!("{} no escalation", "✓".green()),
        },
    }

    Ok(())
}
