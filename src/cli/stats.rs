//! Stats command - Show database statistics

use clap::Args;

use super::utils::{open_storage, project_id};
use crate::config::Config;

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Project id (default from config)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: StatsArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let storage = open_storage(&config)?;
    let project = project_id(&config, args.project.as_deref());

    let stats = storage.stats(&project)?;

    if args.json {
        let json = serde_json::json!({
            "project": project,
            "total_facts": stats.total_facts,
            "ranked_facts": stats.ranked_facts,
            "plain_facts": stats.total_facts - stats.ranked_facts,
            "topics": stats.topics,
            "messages_all_projects": stats.all_messages,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("📊 Memory Statistics ({})\n", project);
        println!("  Total facts:      {}", stats.total_facts);
        println!("  ├── Ranked:       {} in {} list(s)", stats.ranked_facts, stats.topics);
        println!("  └── Plain:        {}", stats.total_facts - stats.ranked_facts);
        println!("  Messages (all projects): {}", stats.all_messages);

        if let Some(path) = storage.path() {
            println!("\n📁 Database: {}", path.display());
        }
    }

    Ok(())
}
