//! `mnemo config` command
//!
//! Get or set configuration values.
//!
//! # Usage
//! ```bash
//! mnemo config                          # Show config file
//! mnemo config ranking.max_hits         # Get value
//! mnemo config ranking.max_hits 5       # Set value
//! mnemo config --global core.default_project work
//! mnemo config --path
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use toml_edit::{DocumentMut, Item, Table, Value};

use crate::config::{Config, CONFIG_FILE, DIR_NAME};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config key (e.g., ranking.max_hits, core.default_project)
    pub key: Option<String>,

    /// Value to set
    pub value: Option<String>,

    /// Show config file paths
    #[arg(long)]
    pub path: bool,

    /// Use global config (~/.mnemo/config.toml) instead of local
    #[arg(short, long)]
    pub global: bool,
}

fn config_path(global: bool) -> Result<PathBuf> {
    if global {
        return Config::global_path(CONFIG_FILE).context("Could not determine home directory");
    }
    Ok(Config::find_local(CONFIG_FILE).unwrap_or_else(|| PathBuf::from(DIR_NAME).join(CONFIG_FILE)))
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let path = config_path(args.global)?;

    if args.path {
        if let Ok(global) = config_path(true) {
            println!("Global: {}", global.display());
        }
        println!("Local:  {}", config_path(false)?.display());
        println!();
        if path.exists() {
            println!("{} Active: {}", "✓".green(), path.display());
        } else {
            println!("{} No config file at {}", "!".yellow(), path.display());
        }
        return Ok(());
    }

    match (&args.key, &args.value) {
        (Some(key), Some(value)) => {
            set_config_value(&path, key, value)?;
            println!("{} Set {} = {} (in {})", "✓".green(), key, value, path.display());
        }
        (Some(key), None) => match get_config_value(&path, key)? {
            Some(value) => println!("{}", value),
            None => println!("(not set)"),
        },
        _ => {
            if path.exists() {
                println!("Configuration ({}):\n", path.display());
                println!("{}", fs::read_to_string(&path)?);
            } else {
                println!("No config file at {}", path.display());
                println!("\nCreate one with:");
                println!("  mnemo init");
                println!("  mnemo config ranking.max_hits 5");
            }
        }
    }

    Ok(())
}

/// Set `section.key`, keeping comments and layout of the existing file.
/// The result must still load as a valid [`Config`].
fn set_config_value(path: &Path, key: &str, raw: &str) -> Result<()> {
    let content = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = content.parse().context("Failed to parse config.toml")?;

    let Some((section, field)) = key.split_once('.') else {
        bail!("Key must be section.key, got {}", key);
    };
    if field.contains('.') {
        bail!("Key too deep: {}. Max depth is section.key", key);
    }

    let table = doc
        .entry(section)
        .or_insert(Item::Table(Table::new()))
        .as_table_mut()
        .with_context(|| format!("{} is not a table", section))?;
    table.insert(field, Item::Value(parse_toml_value(raw)));

    let updated = doc.to_string();
    toml::from_str::<Config>(&updated)
        .with_context(|| format!("Invalid value for {}: {}", key, raw))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, updated)?;
    Ok(())
}

fn get_config_value(path: &Path, key: &str) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let doc: toml::Value = toml::from_str(&content).context("Failed to parse config.toml")?;

    let value = key
        .split('.')
        .try_fold(&doc, |node, part| node.get(part));

    Ok(value.map(|v| match v {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }))
}

/// Parse string value to the closest TOML type
fn parse_toml_value(s: &str) -> Value {
    if let Ok(b) = s.parse::<bool>() {
        return Value::from(b);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::from(f);
    }
    Value::from(s)
}
