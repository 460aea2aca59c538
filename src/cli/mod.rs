//! CLI module - Command definitions and handlers

use clap::{Parser, Subcommand};

pub mod cite;
pub mod clear;
pub mod config;
pub mod escalate;
pub mod facts;
pub mod favorites;
pub mod init;
pub mod recall;
pub mod remember;
pub mod stats;
pub mod utils;

/// mnemo - conversational memory for chat assistants
///
/// Extracts facts about the user from chat messages, keeps ranked favorite
/// lists, and helps assemble cited answers from memory.
#[derive(Parser, Debug)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "MNEMO_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new mnemo directory
    Init(init::InitArgs),

    /// Extract and store facts from a message
    Remember(remember::RememberArgs),

    /// Show ranked favorite lists
    Favorites(favorites::FavoritesArgs),

    /// List stored facts
    Facts(facts::FactsArgs),

    /// Delete stored facts
    Clear(clear::ClearArgs),

    /// Search memory and re-rank the hits for a query
    Recall(recall::RecallArgs),

    /// Trim and renumber citations in an answer
    Cite(cite::CiteArgs),

    /// Decide whether an answer should go to a stronger model
    Escalate(escalate::EscalateArgs),

    /// Show database statistics
    Stats(stats::StatsArgs),

    /// Get or set configuration
    Config(config::ConfigArgs),
}

/// Output format shared by commands that print data
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}
