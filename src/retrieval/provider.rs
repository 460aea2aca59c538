//! Search providers
//!
//! Raw hits come from a [`SearchProvider`]. The [`Retriever`] bounds every
//! call with a timeout and degrades to an empty hit list on failure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::core::hit::MemoryHit;
use crate::core::storage::Storage;

/// Semantic search over stored memory
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, project_id: &str, query: &str, limit: usize) -> Result<Vec<MemoryHit>>;
}

/// Full-text search over the local fact store
pub struct LocalSearch {
    storage: Arc<Storage>,
}

impl LocalSearch {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SearchProvider for LocalSearch {
    async fn search(&self, project_id: &str, query: &str, limit: usize) -> Result<Vec<MemoryHit>> {
        let storage = Arc::clone(&self.storage);
        let project_id = project_id.to_string();
        let query = query.to_string();

        let hits =
            tokio::task::spawn_blocking(move || storage.search_hits(&project_id, &query, limit))
                .await??;
        Ok(hits)
    }
}

/// Hits for one query
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub hits: Vec<MemoryHit>,
    /// Provider failed or timed out
    pub degraded: bool,
}

pub struct Retriever {
    provider: Arc<dyn SearchProvider>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(provider: Arc<dyn SearchProvider>, config: RetrievalConfig) -> Self {
        Self { provider, config }
    }

    pub async fn retrieve(&self, project_id: &str, query: &str) -> Retrieval {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let search = self.provider.search(project_id, query, self.config.fetch_limit);

        match tokio::time::timeout(timeout, search).await {
            Ok(Ok(hits)) => {
                debug!(project = %project_id, hits = hits.len(), "Retrieved hits");
                Retrieval {
                    hits,
                    degraded: false,
                }
            }
            Ok(Err(e)) => {
                warn!(project = %project_id, error = %e, "Search provider failed");
                Retrieval {
                    hits: Vec::new(),
                    degraded: true,
                }
            }
            Err(_) => {
                warn!(
                    project = %project_id,
                    timeout_ms = self.config.timeout_ms,
                    "Search provider timed out"
                );
                Retrieval {
                    hits: Vec::new(),
                    degraded: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fact::Role;
    use crate::core::orchestrator::{FactsOrchestrator, MessageRef};
    use crate::config::Config;

    struct SlowSearch;

    #[async_trait]
    impl SearchProvider for SlowSearch {
        async fn search(&self, _: &str, _: &str, _: usize) -> Result<Vec<MemoryHit>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![MemoryHit::new("late", "too late", 1.0)])
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _: &str, _: &str, _: usize) -> Result<Vec<MemoryHit>> {
            anyhow::bail!("index offline")
        }
    }

    fn quick() -> RetrievalConfig {
        RetrievalConfig {
            timeout_ms: 50,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let retriever = Retriever::new(Arc::new(SlowSearch), quick());
        let retrieval = retriever.retrieve("p", "candy").await;
        assert!(retrieval.degraded);
        assert!(retrieval.hits.is_empty());
    }

    #[tokio::test]
    async fn test_error_degrades() {
        let retriever = Retriever::new(Arc::new(FailingSearch), quick());
        let retrieval = retriever.retrieve("p", "candy").await;
        assert!(retrieval.degraded);
        assert!(retrieval.hits.is_empty());
    }

    #[tokio::test]
    async fn test_local_search_finds_facts() -> Result<()> {
        let storage = Arc::new(Storage::open_memory()?);
        let orchestrator = FactsOrchestrator::new(storage.clone(), storage.clone(), &Config::default());
        orchestrator.persist_facts(
            "p",
            "My favorite candies are Twix, Snickers",
            Role::User,
            &MessageRef::new("chat"),
            &[],
        );

        let retriever = Retriever::new(
            Arc::new(LocalSearch::new(storage)),
            RetrievalConfig::default(),
        );
        let retrieval = retriever.retrieve("p", "twix").await;

        assert!(!retrieval.degraded);
        assert_eq!(retrieval.hits.len(), 1);
        assert_eq!(retrieval.hits[0].ranked_list_topic(), Some("candy".to_string()));
        Ok(())
    }
}
