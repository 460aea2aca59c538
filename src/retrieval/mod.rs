//! Retrieval module
//!
//! Everything that happens around a query: fetching hits, re-ranking them,
//! cleaning up citations in the answer and deciding on escalation.

pub mod citations;
pub mod escalation;
pub mod provider;
pub mod ranker;

pub use crate::core::hit::{MemoryHit, SourceType};
pub use citations::{CitationProcessor, CitedAnswer};
pub use escalation::{EscalationAdvisor, EscalationDecision, EscalationReason};
pub use provider::{LocalSearch, Retrieval, Retriever, SearchProvider};
pub use ranker::HitRanker;
