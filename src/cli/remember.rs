//! `mnemo remember` command
//!
//! Runs one message through extraction, topic resolution and storage.
//! Hits for the message are retrieved first so ranked-list hints can
//! resolve topic-less updates like "make Twix my #1".
//!
//! # Usage
//! ```bash
//! mnemo remember "My favorite candies are Snickers, Reese's, Twix"
//! mnemo remember "Make Twix my #1" --chat web --message-id 42
//! echo "I live in Berlin" | mnemo remember -
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_storage, print_json, project_id, read_text};
use super::OutputFormat;
use crate::config::Config;
use crate::core::fact::Role;
use crate::core::orchestrator::{FactsOrchestrator, MessageRef, PersistReport};
use crate::retrieval::{HitRanker, LocalSearch, Retriever};

#[derive(Args, Debug)]
pub struct RememberArgs {
    /// Message text (`-` reads stdin)
    pub message: String,

    /// Project id (default from config)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Message author
    #[arg(long, default_value = "user")]
    pub role: Role,

    /// Chat id (default from config)
    #[arg(long)]
    pub chat: Option<String>,

    /// External message id; repeated ids map to the same message
    #[arg(long)]
    pub message_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub async fn run(args: RememberArgs) -> Result<()> {
    let config = Config::load()?;
    let storage = open_storage(&config)?;
    let project = project_id(&config, args.project.as_deref());
    let content = read_text(&args.message)?;

    let retriever = Retriever::new(
        Arc::new(LocalSearch::new(storage.clone())),
        config.retrieval.clone(),
    );
    let retrieval = retriever.retrieve(&project, &content).await;
    let hits = HitRanker::new(config.ranking.clone()).rank_and_dedupe(
        retrieval.hits,
        &content,
        config.ranking.max_hits,
    );

    let chat = args
        .chat
        .unwrap_or_else(|| config.core.default_chat.clone());
    let mut message = MessageRef::new(chat);
    if let Some(id) = args.message_id {
        message = message.with_message_id(id);
    }

    let orchestrator = FactsOrchestrator::new(storage.clone(), storage, &config);
    let report = orchestrator.persist_facts(&project, &content, args.role, &message, &hits);

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Pretty => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &PersistReport) {
    if report.store_count == 0 && report.update_count == 0 {
        println!("Nothing new to remember.");
    } else {
        println!(
            "{} {} stored, {} updated",
            "✓".green(),
            report.store_count,
            report.update_count
        );
        for key in &report.stored_fact_keys {
            println!("   {}", key.cyan());
        }
    }

    if report.is_ambiguous() {
        println!(
            "{} Which list did you mean? {}",
            "?".yellow(),
            report.ambiguous_topics.join(", ")
        );
    }
    if report.dropped_candidates > 0 {
        println!(
            "{} {} list item(s) skipped: no topic found",
            "!".yellow(),
            report.dropped_candidates
        );
    }
}
