//! mnemo - conversational memory for chat assistants
//!
//! Pulls durable facts about the user out of chat messages and keeps them in
//! a per-project store. On the read side it re-ranks memory hits, trims
//! citations in generated answers and decides when to escalate.
//!
//! ## Key Concepts
//!
//! - **Fact keys**: dotted keys like `user.email` or `user.favorites.candy.2`
//! - **Ranked lists**: `user.favorites.<topic>.<rank>`, 1-based, canonical topics
//! - **Store-or-update**: a write is a store, an update, or a noop; never a duplicate
//! - **Memory hits**: search results re-ranked per query, never persisted

pub mod cli;
pub mod config;
pub mod core;
pub mod retrieval;

use std::sync::Arc;

pub use crate::config::Config;
pub use crate::core::extract::{Extraction, FactExtractor};
pub use crate::core::fact::{Fact, Role};
pub use crate::core::hit::{MemoryHit, SourceType};
pub use crate::core::orchestrator::{FactsOrchestrator, MessageRef, PersistReport};
pub use crate::core::resolver::{TopicResolution, TopicResolver};
pub use crate::core::storage::Storage;
pub use crate::core::store::{FactStore, MessageIdentity};
pub use retrieval::{
    CitationProcessor, CitedAnswer, EscalationAdvisor, EscalationDecision, HitRanker,
};

/// Persist facts from one message with default settings
pub fn persist_facts<S, I>(
    store: Arc<S>,
    identity: Arc<I>,
    project_id: &str,
    content: &str,
    role: Role,
    message: &MessageRef,
) -> PersistReport
where
    S: FactStore + ?Sized,
    I: MessageIdentity + ?Sized,
{
    FactsOrchestrator::new(store, identity, &Config::default())
        .persist_facts(project_id, content, role, message, &[])
}

/// Re-rank and de-duplicate raw hits with default weights
pub fn rank_and_dedupe(raw_hits: Vec<MemoryHit>, query: &str, max_hits: usize) -> Vec<MemoryHit> {
    HitRanker::default().rank_and_dedupe(raw_hits, query, max_hits)
}

/// Keep the best citations in an answer and renumber them
pub fn post_process_citations(answer: &str, hits: &[MemoryHit]) -> CitedAnswer {
    CitationProcessor::default().post_process(answer, hits)
}

/// Decide whether an answer should go to a stronger model, default settings
pub fn should_escalate(query: &str, hits: &[MemoryHit], answer: &str) -> EscalationDecision {
    EscalationAdvisor::default().should_escalate(query, hits, answer)
}
