//! `mnemo favorites` command
//!
//! # Usage
//! ```bash
//! mnemo favorites            # All ranked lists
//! mnemo favorites candies    # One list (topic is canonicalized)
//! ```

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::utils::{open_storage, print_json, project_id};
use super::OutputFormat;
use crate::config::Config;
use crate::core::canonical::canonicalize;
use crate::core::fact::{RankedEntry, FAVORITES_PREFIX};
use crate::core::store::FactStore;

#[derive(Args, Debug)]
pub struct FavoritesArgs {
    /// Topic to show (default: every list)
    pub topic: Option<String>,

    /// Project id (default from config)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

#[derive(Tabled, Serialize)]
struct FavoriteRow {
    #[tabled(rename = "#")]
    rank: u32,
    value: String,
}

pub fn run(args: FavoritesArgs) -> Result<()> {
    let config = Config::load()?;
    let storage = open_storage(&config)?;
    let project = project_id(&config, args.project.as_deref());

    let lists: BTreeMap<String, Vec<RankedEntry>> = match &args.topic {
        Some(topic) => {
            let topic = canonicalize(topic);
            let entries = storage.get_ranked_list(&project, &topic)?;
            BTreeMap::from([(topic, entries)])
        }
        None => {
            let mut lists: BTreeMap<String, Vec<RankedEntry>> = BTreeMap::new();
            for fact in storage.list(&project, Some(FAVORITES_PREFIX))? {
                if let Some((topic, rank)) = fact.ranked_position() {
                    lists.entry(topic).or_default().push(RankedEntry {
                        rank,
                        value: fact.value_text,
                    });
                }
            }
            for entries in lists.values_mut() {
                entries.sort_by_key(|e| e.rank);
            }
            lists
        }
    };

    if args.format == OutputFormat::Json {
        let json: BTreeMap<&String, Vec<FavoriteRow>> = lists
            .iter()
            .map(|(topic, entries)| (topic, rows(entries)))
            .collect();
        return print_json(&json);
    }

    if lists.values().all(Vec::is_empty) {
        println!("No favorites stored.");
        return Ok(());
    }

    for (topic, entries) in &lists {
        if entries.is_empty() {
            continue;
        }
        println!("{}", topic.replace('_', " ").bold());
        let mut table = Table::new(rows(entries));
        table.with(Style::rounded());
        println!("{}\n", table);
    }

    Ok(())
}

fn rows(entries: &[RankedEntry]) -> Vec<FavoriteRow> {
    entries
        .iter()
        .map(|e| FavoriteRow {
            rank: e.rank,
            value: e.value.clone(),
        })
        .collect()
}
