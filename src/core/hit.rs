//! Memory hits
//!
//! One candidate snippet returned by a search provider. Hits are built fresh
//! for every query and never persisted by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::canonical::canonicalize;
use super::fact::{parse_ranked_key, Role, FAVORITES_PREFIX};

/// Metadata key carrying a ranked-list topic (schema hint)
pub const HINT_TOPIC: &str = "ranked_list_topic";
/// Metadata key carrying the fact key a hit was built from
pub const HINT_FACT_KEY: &str = "fact_key";

/// Where a hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Chat,
    File,
    Fact,
    Web,
    #[serde(other)]
    Other,
}

/// A single search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub source_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    #[serde(default)]
    pub role: Role,

    pub content: String,

    /// Similarity score from the provider (higher is better)
    #[serde(default)]
    pub score: f32,

    #[serde(default)]
    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl MemoryHit {
    pub fn new(source_id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            source_id: source_id.into(),
            message_id: None,
            chat_id: None,
            role: Role::User,
            content: content.into(),
            score,
            source_type: SourceType::Chat,
            created_at: None,
            metadata: Map::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Canonical ranked-list topic this hit is tagged with, if any.
    ///
    /// Reads the explicit topic hint first, then falls back to a
    /// `user.favorites.*` fact key.
    pub fn ranked_list_topic(&self) -> Option<String> {
        if let Some(topic) = self.metadata.get(HINT_TOPIC).and_then(Value::as_str) {
            if !topic.trim().is_empty() {
                return Some(canonicalize(topic));
            }
        }

        let key = self.metadata.get(HINT_FACT_KEY).and_then(Value::as_str)?;
        if !key.starts_with(FAVORITES_PREFIX) {
            return None;
        }
        parse_ranked_key(key).map(|(topic, _)| canonicalize(&topic))
    }
}
