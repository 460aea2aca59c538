//! `mnemo cite` command
//!
//! Post-processes a generated answer against the hits it was built from.
//!
//! # Usage
//! ```bash
//! mnemo recall "favorite candy" --format json > hits.json
//! mnemo cite "Your favorite candy is Twix [M1][M2]." --hits hits.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::utils::{print_json, read_hits, read_text};
use super::OutputFormat;
use crate::config::Config;
use crate::retrieval::CitationProcessor;

#[derive(Args, Debug)]
pub struct CiteArgs {
    /// Answer text (`-` reads stdin)
    pub answer: String,

    /// JSON file with the hits the answer cites (`-` reads stdin)
    #[arg(long)]
    pub hits: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub fn run(args: CiteArgs) -> Result<()> {
    let config = Config::load()?;
    let answer = read_text(&args.answer)?;
    let hits = read_hits(args.hits.as_ref())?;

    let cited = CitationProcessor::new(config.citations.clone()).post_process(&answer, &hits);

    match args.format {
        OutputFormat::Json => print_json(&cited)?,
        OutputFormat::Pretty => println!("{}", cited.text),
    }

    Ok(())
}
