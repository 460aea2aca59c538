//! Configuration module
//!
//! Loaded from TOML. Lookup order:
//! 1. `MNEMO_CONFIG`
//! 2. local `.mnemo/config.toml` (walking up from CWD)
//! 3. global `~/.mnemo/config.toml`
//! 4. defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory holding config and database
pub const DIR_NAME: &str = ".mnemo";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub citations: CitationConfig,

    #[serde(default)]
    pub escalation: EscalationConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Project used when `--project` is not given
    #[serde(default = "default_project")]
    pub default_project: String,

    /// Chat id used for messages entered through the CLI
    #[serde(default = "default_chat")]
    pub default_chat: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_project: default_project(),
            default_chat: default_chat(),
        }
    }
}

fn default_project() -> String {
    "default".to_string()
}

fn default_chat() -> String {
    "cli".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Explicit database path; overrides discovery
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Rules with a lower confidence are skipped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_confidence() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// How many recently updated lists count as recency evidence
    #[serde(default = "default_recency_lookback")]
    pub recency_lookback: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            recency_lookback: default_recency_lookback(),
        }
    }
}

fn default_recency_lookback() -> usize {
    5
}

/// Weights for memory hit re-ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_max_hits")]
    pub max_hits: usize,

    #[serde(default = "default_question_penalty")]
    pub question_penalty: f32,

    #[serde(default = "default_assistant_boost")]
    pub assistant_boost: f32,

    /// Scaled by the fraction of query tokens found in the hit
    #[serde(default = "default_overlap_weight")]
    pub overlap_weight: f32,

    #[serde(default = "default_answer_pattern_boost")]
    pub answer_pattern_boost: f32,

    #[serde(default = "default_file_match_boost")]
    pub file_match_boost: f32,

    #[serde(default = "default_source_mismatch_penalty")]
    pub source_mismatch_penalty: f32,

    #[serde(default = "default_chat_match_boost")]
    pub chat_match_boost: f32,

    /// Boost for the newest hit in a batch
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,

    /// Content prefix length used for near-duplicate grouping
    #[serde(default = "default_topic_key_chars")]
    pub topic_key_chars: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_hits: default_max_hits(),
            question_penalty: default_question_penalty(),
            assistant_boost: default_assistant_boost(),
            overlap_weight: default_overlap_weight(),
            answer_pattern_boost: default_answer_pattern_boost(),
            file_match_boost: default_file_match_boost(),
            source_mismatch_penalty: default_source_mismatch_penalty(),
            chat_match_boost: default_chat_match_boost(),
            recency_weight: default_recency_weight(),
            topic_key_chars: default_topic_key_chars(),
        }
    }
}

fn default_max_hits() -> usize {
    8
}

fn default_question_penalty() -> f32 {
    0.05
}

fn default_assistant_boost() -> f32 {
    0.05
}

fn default_overlap_weight() -> f32 {
    0.03
}

fn default_answer_pattern_boost() -> f32 {
    0.02
}

fn default_file_match_boost() -> f32 {
    0.15
}

fn default_source_mismatch_penalty() -> f32 {
    0.10
}

fn default_chat_match_boost() -> f32 {
    0.10
}

fn default_recency_weight() -> f32 {
    0.15
}

fn default_topic_key_chars() -> usize {
    160
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Citations kept for a single-claim answer
    #[serde(default = "default_keep")]
    pub default_keep: usize,

    /// Upper bound for multi-claim answers
    #[serde(default = "default_multi_claim_cap")]
    pub multi_claim_cap: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            default_keep: default_keep(),
            multi_claim_cap: default_multi_claim_cap(),
        }
    }
}

fn default_keep() -> usize {
    1
}

fn default_multi_claim_cap() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Answers shorter than this escalate
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,

    #[serde(default)]
    pub detect_contradictions: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            min_answer_chars: default_min_answer_chars(),
            detect_contradictions: false,
        }
    }
}

fn default_min_answer_chars() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Raw hits requested from the provider before re-ranking
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_fetch_limit() -> usize {
    20
}

impl Config {
    /// Load config from default locations
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("MNEMO_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        if let Some(local) = Self::find_local(CONFIG_FILE) {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_path(CONFIG_FILE) {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find `.mnemo/<file>` walking up directories
    pub fn find_local(file: &str) -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let candidate = current.join(DIR_NAME).join(file);
            if candidate.exists() {
                return Some(candidate);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// `~/.mnemo/<file>`
    pub fn global_path(file: &str) -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(DIR_NAME).join(file))
    }

    /// Database path with priority:
    /// 1. `MNEMO_DATABASE` env var
    /// 2. `[store] database` in config
    /// 3. Local .mnemo/data.db (walking up from CWD)
    /// 4. Local .mnemo/ directory (even without data.db yet)
    /// 5. Global ~/.mnemo/data.db
    pub fn database_path(&self) -> PathBuf {
        if let Ok(env_path) = std::env::var("MNEMO_DATABASE") {
            return PathBuf::from(env_path);
        }

        if let Some(path) = &self.store.database {
            return path.clone();
        }

        if let Some(local_db) = Self::find_local(DB_FILE) {
            return local_db;
        }

        if let Some(dir) = Self::find_local(CONFIG_FILE).and_then(|p| p.parent().map(Path::to_path_buf)) {
            return dir.join(DB_FILE);
        }

        if let Some(global) = Self::global_path(DB_FILE) {
            return global;
        }

        PathBuf::from(DIR_NAME).join(DB_FILE)
    }
}

pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "data.db";
