//! Facts orchestrator
//!
//! One entry point per incoming message: identity → extraction → topic
//! resolution → writes. Counts in the report come from what the store
//! actually did, never from what the extractor found.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::extract::{Extraction, FactExtractor, Placement, RankedListCandidate};
use super::fact::{ranked_key, Fact, Role, StoreAction, StoreOutcome};
use super::hit::MemoryHit;
use super::resolver::{TopicResolution, TopicResolver};
use super::store::{FactStore, MessageIdentity, RankedWrite};
use crate::config::Config;

/// External identity of the message being persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: String,
    /// Caller-side message id; `None` always creates a new message
    pub message_id: Option<String>,
}

impl MessageRef {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// What one `persist_facts` call did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistReport {
    pub store_count: usize,
    pub update_count: usize,
    /// Keys whose action was store or update, in write order
    pub stored_fact_keys: Vec<String>,
    /// Internal message id; `None` when identity could not be established
    pub message_id: Option<String>,
    /// Set when ranked writes were skipped for lack of a single topic
    pub ambiguous_topics: Vec<String>,
    /// Ranked candidates dropped because no topic could be found
    pub dropped_candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_topic: Option<String>,
}

impl PersistReport {
    fn record(&mut self, outcome: &StoreOutcome) {
        match outcome.action {
            StoreAction::Store => self.store_count += 1,
            StoreAction::Update => self.update_count += 1,
            StoreAction::Noop => return,
        }
        self.stored_fact_keys.push(outcome.fact_key.clone());
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_topics.is_empty()
    }
}

/// Wires extractor, resolver, store and message identity together
pub struct FactsOrchestrator<S: FactStore + ?Sized, I: MessageIdentity + ?Sized> {
    store: Arc<S>,
    identity: Arc<I>,
    extractor: FactExtractor,
    resolver: TopicResolver,
}

impl<S: FactStore + ?Sized, I: MessageIdentity + ?Sized> FactsOrchestrator<S, I> {
    pub fn new(store: Arc<S>, identity: Arc<I>, config: &Config) -> Self {
        Self {
            store,
            identity,
            extractor: FactExtractor::new(config.extraction.min_confidence),
            resolver: TopicResolver::new(config.resolver.recency_lookback),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Extract and persist everything a message says about the user.
    ///
    /// `prior_hits` are the memory hits retrieved for this message; their
    /// ranked-list hints help resolve which list a topic-less update means.
    pub fn persist_facts(
        &self,
        project_id: &str,
        content: &str,
        role: Role,
        message: &MessageRef,
        prior_hits: &[MemoryHit],
    ) -> PersistReport {
        let mut report = PersistReport::default();

        let message_id = match self
            .identity
            .get_or_create(&message.chat_id, message.message_id.as_deref())
        {
            Ok(id) => id,
            Err(e) => {
                error!(
                    chat_id = %message.chat_id,
                    error = %e,
                    "Could not establish message identity, nothing persisted"
                );
                return report;
            }
        };
        report.message_id = Some(message_id.clone());

        if role != Role::User {
            debug!(%role, %message_id, "Not a user message, skipping extraction");
            return report;
        }

        let Extraction { facts, ranked } = self.extractor.extract(content, role);

        if !ranked.is_empty() {
            let resolution =
                self.resolver
                    .resolve(self.store.as_ref(), project_id, content, &ranked, prior_hits);
            match resolution {
                TopicResolution::Resolved(topic) => {
                    self.write_ranked(project_id, &topic, &ranked, &message_id, &mut report);
                    report.resolved_topic = Some(topic);
                }
                TopicResolution::Ambiguous(topics) => {
                    info!(
                        project_id,
                        topics = ?topics,
                        candidates = ranked.len(),
                        "Ambiguous ranked-list topic, skipping ranked writes"
                    );
                    report.ambiguous_topics = topics;
                }
                TopicResolution::Unresolved => {
                    debug!(
                        project_id,
                        candidates = ?ranked.iter().map(|c| c.value.as_str()).collect::<Vec<_>>(),
                        "No topic for ranked candidates, dropping them"
                    );
                    report.dropped_candidates = ranked.len();
                }
            }
        }

        for extracted in facts {
            let fact = extracted.into_fact(project_id, Some(message_id.clone()));
            self.write_fact(&fact, &mut report);
        }

        info!(
            project_id,
            %message_id,
            stored = report.store_count,
            updated = report.update_count,
            "Persisted facts"
        );
        report
    }

    fn write_ranked(
        &self,
        project_id: &str,
        topic: &str,
        candidates: &[RankedListCandidate],
        message_id: &str,
        report: &mut PersistReport,
    ) {
        for candidate in candidates {
            let write = RankedWrite {
                project_id: project_id.to_string(),
                topic: topic.to_string(),
                value: candidate.value.clone(),
                confidence: candidate.confidence,
                source_message_id: Some(message_id.to_string()),
            };

            match (candidate.placement, candidate.rank) {
                (Placement::Sequential | Placement::Explicit, Some(rank)) => {
                    self.write_fact(&write.to_fact(rank), report);
                }
                (Placement::Promote, Some(rank)) => match self.store.promote_ranked(&write, rank) {
                    Ok(outcomes) => outcomes.iter().for_each(|o| report.record(o)),
                    Err(e) => warn!(
                        key = %ranked_key(topic, rank),
                        error = %e,
                        "Ranked promotion failed, skipping"
                    ),
                },
                (Placement::Append, _) | (_, None) => match self.store.append_ranked(&write) {
                    Ok(outcome) => report.record(&outcome),
                    Err(e) => warn!(topic, error = %e, "Ranked append failed, skipping"),
                },
            }
        }
    }

    fn write_fact(&self, fact: &Fact, report: &mut PersistReport) {
        match self.store.store_or_update(fact) {
            Ok(outcome) => {
                debug!(key = %outcome.fact_key, action = %outcome.action, "Fact written");
                report.record(&outcome);
            }
            Err(e) => warn!(key = %fact.fact_key, error = %e, "Fact write failed, skipping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{StoreError, StoreResult};
    use crate::core::fact::RankedEntry;
    use crate::core::hit::HINT_TOPIC;
    use crate::core::storage::Storage;
    use crate::core::store::ClearScope;
    use anyhow::Result;

    fn orchestrator() -> Result<FactsOrchestrator<Storage, Storage>> {
        let storage = Arc::new(Storage::open_memory()?);
        Ok(FactsOrchestrator::new(
            storage.clone(),
            storage,
            &Config::default(),
        ))
    }

    fn persist(orch: &FactsOrchestrator<Storage, Storage>, content: &str) -> PersistReport {
        orch.persist_facts("p1", content, Role::User, &MessageRef::new("chat-1"), &[])
    }

    fn values(orch: &FactsOrchestrator<Storage, Storage>, topic: &str) -> Result<Vec<String>> {
        Ok(orch
            .store()
            .get_ranked_list("p1", topic)?
            .into_iter()
            .map(|e| e.value)
            .collect())
    }

    #[test]
    fn test_candy_bulk_list_counts() -> Result<()> {
        let orch = orchestrator()?;
        let report = persist(&orch, "My favorite candies are Snickers, Reese's, Twix.");

        assert_eq!(report.store_count, 3);
        assert_eq!(report.update_count, 0);
        assert_eq!(
            report.stored_fact_keys,
            vec![
                "user.favorites.candy.1",
                "user.favorites.candy.2",
                "user.favorites.candy.3"
            ]
        );
        assert!(report.message_id.is_some());
        assert_eq!(values(&orch, "candies")?, vec!["Snickers", "Reese's", "Twix"]);
        Ok(())
    }

    #[test]
    fn test_bulk_mixed_ranks_store_every_item() -> Result<()> {
        let orch = orchestrator()?;
        let report = persist(&orch, "My favorite movies are Alien, #1 Heat, Jaws");

        assert_eq!(report.store_count, 3);
        assert_eq!(values(&orch, "movie")?, vec!["Heat", "Alien", "Jaws"]);
        Ok(())
    }

    #[test]
    fn test_repeat_message_is_noop() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite candies are Snickers, Reese's, Twix.");
        let again = persist(&orch, "My favorite candies are Snickers, Reese's, Twix.");

        assert_eq!(again.store_count, 0);
        assert_eq!(again.update_count, 0);
        assert!(again.stored_fact_keys.is_empty());
        Ok(())
    }

    #[test]
    fn test_promote_to_first() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite candies are Snickers, Reese's.");

        let report = persist(&orch, "Make Twix my #1 favorite candy");
        assert_eq!(values(&orch, "candy")?, vec!["Twix", "Snickers", "Reese's"]);
        assert_eq!(report.store_count, 1);
        assert_eq!(report.update_count, 2);
        Ok(())
    }

    #[test]
    fn test_implicit_topic_from_single_list() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite colors are red, green.");

        let report = persist(&orch, "Make blue my #1");
        assert_eq!(report.resolved_topic.as_deref(), Some("color"));
        assert_eq!(values(&orch, "color")?, vec!["blue", "red", "green"]);
        Ok(())
    }

    #[test]
    fn test_ambiguous_topic_writes_nothing() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite candies are Snickers, Twix.");
        persist(&orch, "My favorite movies are Heat, Alien.");

        let report = persist(&orch, "Make BTC my #1");
        assert_eq!(report.store_count, 0);
        assert_eq!(report.update_count, 0);
        let mut topics = report.ambiguous_topics.clone();
        topics.sort();
        assert_eq!(topics, vec!["candy", "movie"]);
        assert_eq!(values(&orch, "candy")?, vec!["Snickers", "Twix"]);
        assert_eq!(values(&orch, "movie")?, vec!["Heat", "Alien"]);
        Ok(())
    }

    #[test]
    fn test_schema_hint_breaks_ambiguity() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite candies are Snickers, Twix.");
        persist(&orch, "My favorite movies are Heat, Alien.");

        let hits = vec![MemoryHit::new("h1", "movie #1: Heat", 0.9).with_metadata(HINT_TOPIC, "movie")];
        let report = orch.persist_facts(
            "p1",
            "Make Ronin my #1",
            Role::User,
            &MessageRef::new("chat-1"),
            &hits,
        );
        assert_eq!(report.resolved_topic.as_deref(), Some("movie"));
        assert_eq!(values(&orch, "movie")?, vec!["Ronin", "Heat", "Alien"]);
        Ok(())
    }

    #[test]
    fn test_ambiguity_still_persists_generic_facts() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite candies are Snickers, Twix.");
        persist(&orch, "My favorite movies are Heat, Alien.");

        let report = persist(&orch, "Make BTC my #1. My name is Ada.");
        assert!(report.is_ambiguous());
        assert_eq!(report.stored_fact_keys, vec!["user.name"]);
        Ok(())
    }

    #[test]
    fn test_unresolved_candidates_are_dropped() -> Result<()> {
        let orch = orchestrator()?;
        let report = persist(&orch, "Make Zorblax my #1");
        assert_eq!(report.dropped_candidates, 1);
        assert_eq!(report.store_count, 0);
        assert_eq!(orch.store().stats("p1")?.total_facts, 0);
        Ok(())
    }

    #[test]
    fn test_append_after_last() -> Result<()> {
        let orch = orchestrator()?;
        persist(&orch, "My favorite candies are Snickers, Twix.");
        let report = persist(&orch, "Add Mars and Twix to my favorite candies");

        assert_eq!(report.store_count, 1);
        assert_eq!(report.stored_fact_keys, vec!["user.favorites.candy.3"]);
        assert_eq!(values(&orch, "candy")?, vec!["Snickers", "Twix", "Mars"]);
        Ok(())
    }

    #[test]
    fn test_generic_fact_update_counts() -> Result<()> {
        let orch = orchestrator()?;
        let first = persist(&orch, "I live in Berlin");
        let second = persist(&orch, "I live in Lisbon");

        assert_eq!(first.store_count, 1);
        assert_eq!(second.store_count, 0);
        assert_eq!(second.update_count, 1);

        let fact = orch.store().get("p1", "user.location")?.expect("fact stored");
        assert_eq!(fact.value_text, "Lisbon");
        assert_eq!(fact.source_message_id, second.message_id);
        Ok(())
    }

    #[test]
    fn test_non_user_role() -> Result<()> {
        let orch = orchestrator()?;
        let report = orch.persist_facts(
            "p1",
            "My name is Ada.",
            Role::Assistant,
            &MessageRef::new("chat-1").with_message_id("m1"),
            &[],
        );
        assert_eq!(report.store_count, 0);
        assert!(report.message_id.is_some());
        assert_eq!(orch.store().stats("p1")?.total_facts, 0);
        Ok(())
    }

    #[test]
    fn test_same_external_message_keeps_identity() -> Result<()> {
        let orch = orchestrator()?;
        let message = MessageRef::new("chat-1").with_message_id("ext-42");
        let a = orch.persist_facts("p1", "I live in Oslo", Role::User, &message, &[]);
        let b = orch.persist_facts("p1", "I live in Oslo", Role::User, &message, &[]);
        assert_eq!(a.message_id, b.message_id);
        Ok(())
    }

    struct NoIdentity;

    impl MessageIdentity for NoIdentity {
        fn get_or_create(&self, _chat_id: &str, _message_id: Option<&str>) -> StoreResult<String> {
            Err(StoreError::Identity("message table unavailable".into()))
        }
    }

    #[test]
    fn test_identity_failure_aborts() -> Result<()> {
        let storage = Arc::new(Storage::open_memory()?);
        let orch = FactsOrchestrator::new(storage.clone(), Arc::new(NoIdentity), &Config::default());

        let report = orch.persist_facts(
            "p1",
            "My name is Ada.",
            Role::User,
            &MessageRef::new("chat-1"),
            &[],
        );
        assert_eq!(report, PersistReport::default());
        assert!(report.message_id.is_none());
        assert_eq!(storage.stats("p1")?.total_facts, 0);
        Ok(())
    }

    /// Delegates to SQLite but refuses writes to one key
    struct RejectingStore {
        inner: Storage,
        rejected_key: &'static str,
    }

    impl FactStore for RejectingStore {
        fn store_or_update(&self, fact: &Fact) -> StoreResult<StoreOutcome> {
            if fact.fact_key == self.rejected_key {
                return Err(StoreError::InvalidKey(fact.fact_key.clone()));
            }
            self.inner.store_or_update(fact)
        }

        fn append_ranked(&self, write: &RankedWrite) -> StoreResult<StoreOutcome> {
            self.inner.append_ranked(write)
        }

        fn promote_ranked(&self, write: &RankedWrite, rank: u32) -> StoreResult<Vec<StoreOutcome>> {
            self.inner.promote_ranked(write, rank)
        }

        fn get_ranked_list(&self, project_id: &str, topic: &str) -> StoreResult<Vec<RankedEntry>> {
            self.inner.get_ranked_list(project_id, topic)
        }

        fn recent_ranked_topics(&self, project_id: &str, limit: usize) -> StoreResult<Vec<String>> {
            self.inner.recent_ranked_topics(project_id, limit)
        }

        fn clear(&self, project_id: &str, scope: &ClearScope) -> StoreResult<usize> {
            self.inner.clear(project_id, scope)
        }
    }

    #[test]
    fn test_failed_write_skips_only_that_fact() -> Result<()> {
        let store = Arc::new(RejectingStore {
            inner: Storage::open_memory()?,
            rejected_key: "user.email",
        });
        let identity = Arc::new(Storage::open_memory()?);
        let orch = FactsOrchestrator::new(store.clone(), identity, &Config::default());

        let report = orch.persist_facts(
            "p1",
            "My email is ada@example.com. I live in Berlin.",
            Role::User,
            &MessageRef::new("chat-1"),
            &[],
        );
        assert!(report.stored_fact_keys.contains(&"user.location".to_string()));
        assert!(!report.stored_fact_keys.contains(&"user.email".to_string()));
        assert_eq!(report.store_count, report.stored_fact_keys.len());
        assert!(store.inner.get("p1", "user.email")?.is_none());
        assert!(store.inner.get("p1", "user.location")?.is_some());
        Ok(())
    }
}
