//! Fact - Core data structure
//!
//! A fact is one durable piece of knowledge about the user, scoped to a project.
//!
//! # Key Properties
//! - **id**: ULID (sortable, unique)
//! - **fact_key**: Dotted path (e.g., `user.email`, `user.favorites.candy.1`)
//! - **value_text** / **value_type**: Normalized value and how to read it
//! - **confidence**: 0.0-1.0, fixed per extraction rule
//! - **source_message_id**: Message the fact was mined from
//!
//! Facts are keyed by `(project_id, fact_key)`. Ranked-list facts live under
//! [`FAVORITES_PREFIX`] with the canonical topic and rank as the last segments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Key prefix shared by every ranked-list fact
pub const FAVORITES_PREFIX: &str = "user.favorites";

/// Who authored a message or a memory hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => anyhow::bail!("Unknown role: {}", s),
        }
    }
}

/// How `value_text` should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Bool,
    /// ISO-8601 calendar date (`YYYY-MM-DD`)
    Date,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Number => write!(f, "number"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Date => write!(f, "date"),
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "bool" => Ok(ValueType::Bool),
            "date" => Ok(ValueType::Date),
            _ => anyhow::bail!("Unknown value type: {}", s),
        }
    }
}

/// A fact - the fundamental unit of stored knowledge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier (ULID)
    pub id: Ulid,

    /// Project scope
    pub project_id: String,

    /// Dotted key (e.g., user.favorites.candy.1)
    pub fact_key: String,

    /// Normalized value
    pub value_text: String,

    /// Value type
    #[serde(default)]
    pub value_type: ValueType,

    /// Extraction confidence (0.0-1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    /// Message the fact was extracted from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

fn default_confidence() -> f32 {
    0.5
}

impl Fact {
    /// Create a new string fact
    pub fn new(
        project_id: impl Into<String>,
        fact_key: impl Into<String>,
        value_text: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Ulid::new(),
            project_id: project_id.into(),
            fact_key: fact_key.into(),
            value_text: value_text.into(),
            value_type: ValueType::default(),
            confidence: default_confidence(),
            source_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a ranked-list fact (`user.favorites.<topic>.<rank>`)
    pub fn ranked(
        project_id: impl Into<String>,
        topic: &str,
        rank: u32,
        value_text: impl Into<String>,
    ) -> Self {
        Self::new(project_id, ranked_key(topic, rank), value_text)
    }

    /// Set value type
    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Set confidence (clamped to 0.0-1.0)
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the message this fact came from
    pub fn with_source_message(mut self, message_id: Option<String>) -> Self {
        self.source_message_id = message_id;
        self
    }

    /// Topic and rank if this is a ranked-list fact
    pub fn ranked_position(&self) -> Option<(String, u32)> {
        parse_ranked_key(&self.fact_key)
    }

    /// Get short ID (first 8 chars)
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_lowercase()
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} = {}", self.short_id(), self.fact_key, self.value_text)
    }
}

/// Build the key for one rank of a topic's list
pub fn ranked_key(topic: &str, rank: u32) -> String {
    format!("{}.{}.{}", FAVORITES_PREFIX, topic, rank)
}

/// Split a ranked-list key into (topic, rank)
pub fn parse_ranked_key(key: &str) -> Option<(String, u32)> {
    let rest = key.strip_prefix(FAVORITES_PREFIX)?.strip_prefix('.')?;
    let (topic, rank) = rest.rsplit_once('.')?;
    if topic.is_empty() || topic.contains('.') {
        return None;
    }
    let rank: u32 = rank.parse().ok()?;
    if rank == 0 {
        return None;
    }
    Some((topic.to_string(), rank))
}

/// What a write actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreAction {
    /// Key was absent, row inserted
    Store,
    /// Key existed with a different value, overwritten
    Update,
    /// Key existed with the same value
    Noop,
}

impl std::fmt::Display for StoreAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreAction::Store => write!(f, "store"),
            StoreAction::Update => write!(f, "update"),
            StoreAction::Noop => write!(f, "noop"),
        }
    }
}

/// Outcome of one store-or-update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub fact_id: Ulid,
    pub fact_key: String,
    pub action: StoreAction,
}

/// One row of a ranked list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub value: String,
}
