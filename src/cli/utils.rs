//! CLI utility functions
//!
//! Common helpers shared across CLI commands:
//! - Opening storage from the resolved database path
//! - Project resolution
//! - Reading hit files and printing JSON

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Config;
use crate::core::hit::MemoryHit;
use crate::core::storage::Storage;

/// Open storage at the configured database path, creating parent dirs
pub fn open_storage(config: &Config) -> Result<Arc<Storage>> {
    let db_path = config.database_path();
    ensure_parent(&db_path)?;
    let storage = Storage::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    Ok(Arc::new(storage))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// `--project` if given, else the configured default
pub fn project_id(config: &Config, project: Option<&str>) -> String {
    project
        .map(str::to_string)
        .unwrap_or_else(|| config.core.default_project.clone())
}

/// Read memory hits from a JSON file (`-` for stdin)
pub fn read_hits(path: Option<&PathBuf>) -> Result<Vec<MemoryHit>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let content = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read hits from stdin")?
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read hits file {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse hits from {}", path.display()))
}

/// Text argument, or stdin when it is `-`
pub fn read_text(text: &str) -> Result<String> {
    if text == "-" {
        return std::io::read_to_string(std::io::stdin()).context("Failed to read stdin");
    }
    Ok(text.to_string())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First `max` chars with an ellipsis when cut
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_fallback() {
        let config = Config::default();
        assert_eq!(project_id(&config, None), "default");
        assert_eq!(project_id(&config, Some("work")), "work");
    }

    #[test]
    fn test_read_hits_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hits.json");
        fs::write(
            &path,
            r#"[{"source_id": "a", "content": "My favorite candy is Twix", "score": 0.8}]"#,
        )?;

        let hits = read_hits(Some(&path))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, "a");
        assert!(read_hits(None)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghij", 5), "abcd…");
    }
}
