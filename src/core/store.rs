//! Store abstraction
//!
//! The orchestrator and topic resolver only see these traits. [`Storage`]
//! (SQLite) implements both; tests and embedders can swap in their own.
//!
//! [`Storage`]: super::storage::Storage

use super::error::StoreResult;
use super::fact::{Fact, RankedEntry, StoreOutcome};

/// A value headed for a ranked list whose rank the store decides
#[derive(Debug, Clone)]
pub struct RankedWrite {
    pub project_id: String,
    /// Canonical topic
    pub topic: String,
    pub value: String,
    pub confidence: f32,
    pub source_message_id: Option<String>,
}

impl RankedWrite {
    /// Materialize as a fact at a concrete rank
    pub fn to_fact(&self, rank: u32) -> Fact {
        Fact::ranked(&self.project_id, &self.topic, rank, &self.value)
            .with_confidence(self.confidence)
            .with_source_message(self.source_message_id.clone())
    }
}

/// What an explicit clear removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// Every fact in the project
    All,
    /// A key and everything below it (`user.favorites` clears all lists)
    Prefix(String),
    /// One ranked list
    Topic(String),
}

/// Durable key/value + ranked-list storage, scoped by project
pub trait FactStore: Send + Sync {
    /// Insert, overwrite, or leave alone depending on the stored value.
    /// Atomic per `(project_id, fact_key)`.
    fn store_or_update(&self, fact: &Fact) -> StoreResult<StoreOutcome>;

    /// Append to the end of a list. A value already in the list is a noop.
    fn append_ranked(&self, write: &RankedWrite) -> StoreResult<StoreOutcome>;

    /// Place a value at `rank`, shifting occupants down as needed.
    /// Only keys whose value changed are reported.
    fn promote_ranked(&self, write: &RankedWrite, rank: u32) -> StoreResult<Vec<StoreOutcome>>;

    /// Full list for a topic, ascending by rank, no truncation.
    /// The topic is canonicalized and matched exactly.
    fn get_ranked_list(&self, project_id: &str, topic: &str) -> StoreResult<Vec<RankedEntry>>;

    /// Topics of the most recently updated lists, newest first
    fn recent_ranked_topics(&self, project_id: &str, limit: usize) -> StoreResult<Vec<String>>;

    /// Delete facts. The only deletion path.
    fn clear(&self, project_id: &str, scope: &ClearScope) -> StoreResult<usize>;
}

/// Maps an external (chat, message) pair to a stable internal message id
pub trait MessageIdentity: Send + Sync {
    /// Idempotent upsert. A missing `message_id` always creates a new message.
    fn get_or_create(&self, chat_id: &str, message_id: Option<&str>) -> StoreResult<String>;
}
