//! Topic resolution for ranked-list updates
//!
//! A message like "Make BTC my #1" doesn't say which list it means. The
//! resolver looks for evidence in a fixed order and stops at the first step
//! that produces any topic:
//!
//! 1. topics named in the message itself
//! 2. schema hints on the memory hits retrieved for the message
//! 3. the project's most recently updated lists
//! 4. a keyword dictionary of unambiguous nouns
//!
//! One distinct topic resolves; several are reported as ambiguous and never
//! guessed between.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::canonical::{canonicalize, UNKNOWN_TOPIC};
use super::extract::RankedListCandidate;
use super::hit::MemoryHit;
use super::store::FactStore;

static RE_FAVORITE_MENTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bfavou?rites?\s+(?P<topic>[a-z][a-z'-]*(?:\s+[a-z][a-z'-]*)?)\s+(?:list|ranking|is|are|was|were)\b",
    )
    .ok()
});

/// Unambiguous nouns and the list they belong to
const KEYWORDS: &[(&str, &str)] = &[
    ("btc", "crypto"),
    ("bitcoin", "crypto"),
    ("eth", "crypto"),
    ("ethereum", "crypto"),
    ("solana", "crypto"),
    ("crypto", "crypto"),
    ("cryptocurrency", "crypto"),
    ("cryptocurrencies", "crypto"),
    ("coin", "crypto"),
    ("coins", "crypto"),
    ("color", "color"),
    ("colors", "color"),
    ("colour", "color"),
    ("colours", "color"),
    ("candy", "candy"),
    ("candies", "candy"),
    ("chocolate", "candy"),
    ("chocolates", "candy"),
    ("movie", "movie"),
    ("movies", "movie"),
    ("film", "movie"),
    ("films", "movie"),
    ("book", "book"),
    ("books", "book"),
    ("novel", "book"),
    ("novels", "book"),
    ("song", "song"),
    ("songs", "song"),
    ("album", "album"),
    ("albums", "album"),
    ("band", "band"),
    ("bands", "band"),
    ("food", "food"),
    ("dish", "food"),
    ("dishes", "food"),
    ("drink", "drink"),
    ("drinks", "drink"),
    ("beverage", "drink"),
    ("game", "game"),
    ("games", "game"),
    ("sport", "sport"),
    ("sports", "sport"),
    ("city", "city"),
    ("cities", "city"),
    ("country", "country"),
    ("countries", "country"),
    ("tv", "tv_show"),
    ("series", "tv_show"),
    ("sitcom", "tv_show"),
    ("restaurant", "restaurant"),
    ("restaurants", "restaurant"),
    ("animal", "animal"),
    ("animals", "animal"),
];

/// Words that follow "favorite" without naming a topic
const NOT_TOPICS: &[&str] = &["is", "are", "was", "were", "list", "one", "thing", "things"];

/// Outcome of topic resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicResolution {
    Resolved(String),
    /// Several topics fit equally well; nothing is written
    Ambiguous(Vec<String>),
    Unresolved,
}

/// Which step produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evidence {
    Explicit,
    SchemaHint,
    Recency,
    Keyword,
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evidence::Explicit => write!(f, "explicit"),
            Evidence::SchemaHint => write!(f, "schema_hint"),
            Evidence::Recency => write!(f, "recency"),
            Evidence::Keyword => write!(f, "keyword"),
        }
    }
}

/// Picks the ranked list a message refers to
#[derive(Debug, Clone)]
pub struct TopicResolver {
    recency_lookback: usize,
}

impl Default for TopicResolver {
    fn default() -> Self {
        Self::new(5)
    }
}

impl TopicResolver {
    pub fn new(recency_lookback: usize) -> Self {
        Self { recency_lookback }
    }

    pub fn resolve<S: FactStore + ?Sized>(
        &self,
        store: &S,
        project_id: &str,
        message: &str,
        candidates: &[RankedListCandidate],
        hits: &[MemoryHit],
    ) -> TopicResolution {
        if candidates.is_empty() {
            return TopicResolution::Unresolved;
        }

        let explicit = candidates
            .iter()
            .filter_map(|c| c.explicit_topic.clone())
            .chain(mentioned_topics(message));
        if let Some(resolution) = decide(explicit, Evidence::Explicit) {
            return resolution;
        }

        let hinted = hits.iter().filter_map(MemoryHit::ranked_list_topic);
        if let Some(resolution) = decide(hinted, Evidence::SchemaHint) {
            return resolution;
        }

        if self.recency_lookback > 0 {
            match store.recent_ranked_topics(project_id, self.recency_lookback) {
                Ok(recent) => {
                    if let Some(resolution) = decide(recent, Evidence::Recency) {
                        return resolution;
                    }
                }
                Err(e) => {
                    warn!(project_id, error = %e, "Recent topic lookup failed, skipping recency");
                }
            }
        }

        if let Some(resolution) = decide(keyword_topics(message), Evidence::Keyword) {
            return resolution;
        }

        TopicResolution::Unresolved
    }
}

/// Canonical topics named after "favorite" in free text
pub fn mentioned_topics(message: &str) -> Vec<String> {
    let Some(re) = RE_FAVORITE_MENTION.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(message)
        .filter_map(|caps| caps.name("topic").map(|m| m.as_str().to_lowercase()))
        .filter(|topic| {
            topic
                .split_whitespace()
                .next()
                .is_some_and(|first| !NOT_TOPICS.contains(&first))
        })
        .map(|topic| canonicalize(&topic))
        .filter(|topic| topic != UNKNOWN_TOPIC)
        .collect()
}

fn keyword_topics(message: &str) -> Vec<String> {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .filter_map(|word| {
            let word = word.to_lowercase();
            KEYWORDS
                .iter()
                .find(|(keyword, _)| *keyword == word)
                .map(|(_, topic)| topic.to_string())
        })
        .collect()
}

fn decide(topics: impl IntoIterator<Item = String>, evidence: Evidence) -> Option<TopicResolution> {
    let mut distinct: Vec<String> = Vec::new();
    for topic in topics {
        let topic = canonicalize(&topic);
        if !distinct.contains(&topic) {
            distinct.push(topic);
        }
    }

    match distinct.len() {
        0 => None,
        1 => {
            let topic = distinct.remove(0);
            debug!(%topic, %evidence, "Resolved ranked-list topic");
            Some(TopicResolution::Resolved(topic))
        }
        _ => {
            debug!(topics = ?distinct, %evidence, "Ambiguous ranked-list topic");
            Some(TopicResolution::Ambiguous(distinct))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{StoreError, StoreResult};
    use crate::core::extract::Placement;
    use crate::core::fact::{Fact, RankedEntry, StoreOutcome};
    use crate::core::hit::{HINT_FACT_KEY, HINT_TOPIC};
    use crate::core::storage::Storage;
    use crate::core::store::{ClearScope, RankedWrite};
    use anyhow::Result;

    fn candidate(topic: Option<&str>) -> RankedListCandidate {
        RankedListCandidate {
            rank: Some(1),
            value: "BTC".to_string(),
            explicit_topic: topic.map(str::to_string),
            placement: Placement::Promote,
            confidence: 0.85,
            rule: "promote",
        }
    }

    fn seed(storage: &Storage, topic: &str, value: &str) -> Result<()> {
        storage.store_or_update(&Fact::ranked("p1", topic, 1, value))?;
        Ok(())
    }

    #[test]
    fn test_explicit_topic_wins() -> Result<()> {
        let storage = Storage::open_memory()?;
        seed(&storage, "movie", "Heat")?;

        let resolution = TopicResolver::default().resolve(
            &storage,
            "p1",
            "Make Twix my #1 favorite candy",
            &[candidate(Some("candy"))],
            &[],
        );
        assert_eq!(resolution, TopicResolution::Resolved("candy".to_string()));
        Ok(())
    }

    #[test]
    fn test_conflicting_explicit_topics_are_ambiguous() -> Result<()> {
        let storage = Storage::open_memory()?;
        let resolution = TopicResolver::default().resolve(
            &storage,
            "p1",
            "x",
            &[candidate(Some("candy")), candidate(Some("color"))],
            &[],
        );
        assert_eq!(
            resolution,
            TopicResolution::Ambiguous(vec!["candy".to_string(), "color".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_schema_hint_anchors_topic() -> Result<()> {
        let storage = Storage::open_memory()?;
        seed(&storage, "candy", "Mars")?;
        seed(&storage, "movie", "Heat")?;

        let hits = vec![
            MemoryHit::new("h1", "crypto #1: ETH", 0.8).with_metadata(HINT_TOPIC, "Crypto"),
            MemoryHit::new("h2", "crypto #2: SOL", 0.7)
                .with_metadata(HINT_FACT_KEY, "user.favorites.crypto.2"),
        ];
        let resolution = TopicResolver::default().resolve(
            &storage,
            "p1",
            "Make BTC my #1",
            &[candidate(None)],
            &hits,
        );
        assert_eq!(resolution, TopicResolution::Resolved("crypto".to_string()));
        Ok(())
    }

    #[test]
    fn test_keyword_and_hint_topics_match_stored_list() -> Result<()> {
        let storage = Storage::open_memory()?;
        let stored = canonicalize("movies");
        seed(&storage, &stored, "Heat")?;
        seed(&storage, "candy", "Mars")?;

        let hits = vec![MemoryHit::new("h1", "movies: Heat", 0.8).with_metadata(HINT_TOPIC, "Movies")];
        let hinted = TopicResolver::default().resolve(&storage, "p1", "Make Ronin my #1", &[candidate(None)], &hits);
        assert_eq!(hinted, TopicResolution::Resolved(stored.clone()));

        let keyword = TopicResolver::new(0).resolve(
            &storage,
            "p1",
            "Make Ronin my #1 film",
            &[candidate(None)],
            &[],
        );
        assert_eq!(keyword, TopicResolution::Resolved(stored));
        Ok(())
    }

    #[test]
    fn test_single_recent_list_resolves() -> Result<()> {
        let storage = Storage::open_memory()?;
        seed(&storage, "crypto", "ETH")?;

        let resolution = TopicResolver::default().resolve(
            &storage,
            "p1",
            "Make BTC my #1",
            &[candidate(None)],
            &[],
        );
        assert_eq!(resolution, TopicResolution::Resolved("crypto".to_string()));
        Ok(())
    }

    #[test]
    fn test_two_recent_lists_are_ambiguous() -> Result<()> {
        let storage = Storage::open_memory()?;
        seed(&storage, "candy", "Snickers")?;
        seed(&storage, "movie", "Heat")?;

        let resolution = TopicResolver::default().resolve(
            &storage,
            "p1",
            "Make BTC my #1",
            &[candidate(None)],
            &[],
        );
        match resolution {
            TopicResolution::Ambiguous(mut topics) => {
                topics.sort();
                assert_eq!(topics, vec!["candy".to_string(), "movie".to_string()]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_keyword_fallback() -> Result<()> {
        let storage = Storage::open_memory()?;
        let resolution = TopicResolver::default().resolve(
            &storage,
            "p1",
            "Make BTC my #1",
            &[candidate(None)],
            &[],
        );
        assert_eq!(resolution, TopicResolution::Resolved("crypto".to_string()));

        let nothing = TopicResolver::default().resolve(
            &storage,
            "p1",
            "Make Zorblax my #1",
            &[candidate(None)],
            &[],
        );
        assert_eq!(nothing, TopicResolution::Unresolved);
        Ok(())
    }

    #[test]
    fn test_mentioned_topics() {
        assert_eq!(
            mentioned_topics("put it on my favorite tv shows list"),
            vec!["tv_show".to_string()]
        );
        assert_eq!(mentioned_topics("my favorites are great"), Vec::<String>::new());
    }

    struct BrokenStore;

    impl FactStore for BrokenStore {
        fn store_or_update(&self, _fact: &Fact) -> StoreResult<StoreOutcome> {
            Err(StoreError::Lock("broken".into()))
        }
        fn append_ranked(&self, _write: &RankedWrite) -> StoreResult<StoreOutcome> {
            Err(StoreError::Lock("broken".into()))
        }
        fn promote_ranked(&self, _write: &RankedWrite, _rank: u32) -> StoreResult<Vec<StoreOutcome>> {
            Err(StoreError::Lock("broken".into()))
        }
        fn get_ranked_list(&self, _project_id: &str, _topic: &str) -> StoreResult<Vec<RankedEntry>> {
            Err(StoreError::Lock("broken".into()))
        }
        fn recent_ranked_topics(&self, _project_id: &str, _limit: usize) -> StoreResult<Vec<String>> {
            Err(StoreError::Lock("broken".into()))
        }
        fn clear(&self, _project_id: &str, _scope: &ClearScope) -> StoreResult<usize> {
            Err(StoreError::Lock("broken".into()))
        }
    }

    #[test]
    fn test_store_failure_is_no_evidence() {
        let resolution = TopicResolver::default().resolve(
            &BrokenStore,
            "p1",
            "Make BTC my #1",
            &[candidate(None)],
            &[],
        );
        assert_eq!(resolution, TopicResolution::Resolved("crypto".to_string()));
    }
}
