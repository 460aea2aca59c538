//! Memory hit re-ranking and deduplication
//!
//! Adjustments on top of the provider score (all additive):
//! question penalty, assistant boost, query-token overlap, answer-pattern
//! boost, source/query fit, and a recency boost normalized over the batch.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::config::RankingConfig;
use crate::core::fact::Role;
use crate::core::hit::{MemoryHit, SourceType};

static RE_ANSWER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:is|are|was|were)\b").ok());

const INTERROGATIVES: &[&str] = &[
    "what", "which", "who", "whom", "whose", "how", "why", "when", "where", "do", "does", "did",
    "is", "are", "can", "could", "should", "would", "will",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "what", "which", "who", "how", "why", "when",
    "where", "do", "does", "did", "my", "your", "i", "me", "you", "of", "to", "in", "on", "for",
    "and", "or", "it", "that", "this", "be", "about", "with", "at", "by",
];

const FILE_WORDS: &[&str] = &[
    "file", "files", "document", "documents", "doc", "docs", "pdf", "repo", "repository", "code",
    "readme", "upload", "uploaded", "attachment", "attached", "spreadsheet",
];

#[derive(Debug)]
struct Scored {
    hit: MemoryHit,
    score: f32,
    index: usize,
}

/// Re-ranks raw provider hits for one query
#[derive(Debug, Clone, Default)]
pub struct HitRanker {
    config: RankingConfig,
}

impl HitRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Adjust, deduplicate, sort descending and cap at `max_hits`.
    ///
    /// Returned hits carry their adjusted score.
    pub fn rank_and_dedupe(&self, raw_hits: Vec<MemoryHit>, query: &str, max_hits: usize) -> Vec<MemoryHit> {
        let total = raw_hits.len();
        let query_tokens = content_tokens(query);
        let file_query = tokens(query).iter().any(|t| FILE_WORDS.contains(&t.as_str()));
        let span = time_span(&raw_hits);

        let scored: Vec<Scored> = raw_hits
            .into_iter()
            .enumerate()
            .map(|(index, hit)| {
                let score = self.adjusted_score(&hit, &query_tokens, file_query, span);
                Scored { hit, score, index }
            })
            .collect();

        let mut survivors = self.dedupe(scored);

        survivors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        survivors.truncate(max_hits);

        debug!(raw = total, kept = survivors.len(), file_query, "Ranked memory hits");

        survivors
            .into_iter()
            .map(|s| {
                let mut hit = s.hit;
                hit.score = s.score;
                hit
            })
            .collect()
    }

    fn adjusted_score(
        &self,
        hit: &MemoryHit,
        query_tokens: &HashSet<String>,
        file_query: bool,
        span: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> f32 {
        let c = &self.config;
        let mut score = hit.score;

        if looks_like_question(&hit.content) {
            score -= c.question_penalty;
        }

        let assistant = hit.role == Role::Assistant;
        if assistant {
            score += c.assistant_boost;
        }

        if !query_tokens.is_empty() {
            let hit_tokens = content_tokens(&hit.content);
            let present = query_tokens.iter().filter(|t| hit_tokens.contains(*t)).count();
            score += c.overlap_weight * present as f32 / query_tokens.len() as f32;
        }

        if assistant && RE_ANSWER_PATTERN.as_ref().is_some_and(|re| re.is_match(&hit.content)) {
            score += c.answer_pattern_boost;
        }

        score += match (file_query, hit.source_type) {
            (true, SourceType::File) => c.file_match_boost,
            (true, SourceType::Chat) => -c.source_mismatch_penalty,
            (false, SourceType::File) => -c.source_mismatch_penalty,
            (false, SourceType::Chat) => c.chat_match_boost,
            _ => 0.0,
        };

        if let (Some((oldest, newest)), Some(at)) = (span, hit.created_at) {
            let micros = |d: chrono::Duration| d.num_microseconds().unwrap_or(i64::MAX) as f64;
            let range = micros(newest - oldest).max(1.0);
            let offset = micros(at - oldest);
            score += c.recency_weight * (offset / range).clamp(0.0, 1.0) as f32;
        }

        score
    }

    /// Message-id collapse first, then near-duplicate content grouping
    fn dedupe(&self, scored: Vec<Scored>) -> Vec<Scored> {
        let mut by_message: Vec<Scored> = Vec::with_capacity(scored.len());
        let mut seen_messages: HashMap<String, usize> = HashMap::new();
        for item in scored {
            let Some(message_id) = item.hit.message_id.clone() else {
                by_message.push(item);
                continue;
            };
            match seen_messages.get(&message_id) {
                Some(&slot) => {
                    if item.score > by_message[slot].score {
                        by_message[slot] = item;
                    }
                }
                None => {
                    seen_messages.insert(message_id, by_message.len());
                    by_message.push(item);
                }
            }
        }

        let mut by_topic: Vec<Scored> = Vec::with_capacity(by_message.len());
        let mut seen_topics: HashMap<String, usize> = HashMap::new();
        for item in by_message {
            let key = topic_key(&item.hit.content, self.config.topic_key_chars);
            match seen_topics.get(&key) {
                Some(&slot) => {
                    if supersedes(&item, &by_topic[slot]) {
                        by_topic[slot] = item;
                    }
                }
                None => {
                    seen_topics.insert(key, by_topic.len());
                    by_topic.push(item);
                }
            }
        }
        by_topic
    }
}

/// Later timestamp wins; without two timestamps to compare, higher score wins
fn supersedes(candidate: &Scored, current: &Scored) -> bool {
    match (candidate.hit.created_at, current.hit.created_at) {
        (Some(a), Some(b)) if a != b => a > b,
        _ => candidate.score > current.score,
    }
}

/// Oldest and newest timestamp, if they differ
fn time_span(hits: &[MemoryHit]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut times = hits.iter().filter_map(|h| h.created_at);
    let first = times.next()?;
    let (oldest, newest) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    (newest > oldest).then_some((oldest, newest))
}

fn topic_key(content: &str, chars: usize) -> String {
    content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(chars)
        .collect()
}

fn looks_like_question(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.ends_with('?') {
        return true;
    }
    tokens(trimmed)
        .first()
        .is_some_and(|first| INTERROGATIVES.contains(&first.as_str()))
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn content_tokens(text: &str) -> HashSet<String> {
    tokens(text)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ranker() -> HitRanker {
        HitRanker::default()
    }

    fn ids(hits: &[MemoryHit]) -> Vec<&str> {
        hits.iter().map(|h| h.source_id.as_str()).collect()
    }

    #[test]
    fn test_assistant_answer_beats_user_question() {
        let hits = vec![
            MemoryHit::new("q", "What is my favorite candy?", 0.8),
            MemoryHit::new("a", "Your favorite candy is Twix.", 0.8).with_role(Role::Assistant),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "favorite candy", 8);
        assert_eq!(ids(&ranked), vec!["a", "q"]);
        assert!(ranked[0].score > 0.8);
    }

    #[test]
    fn test_message_id_collapse_keeps_best() {
        let hits = vec![
            MemoryHit::new("h1", "Ada lives in Berlin", 0.4).with_message("m1"),
            MemoryHit::new("h2", "Berlin, Germany (Ada)", 0.9).with_message("m1"),
            MemoryHit::new("h3", "unrelated", 0.1).with_message("m2"),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "where does Ada live", 8);
        assert_eq!(ids(&ranked), vec!["h2", "h3"]);
    }

    #[test]
    fn test_near_duplicates_keep_latest() {
        let now = Utc::now();
        let hits = vec![
            MemoryHit::new("old", "My  favorite color is   green", 0.9)
                .with_created_at(now - Duration::days(3)),
            MemoryHit::new("new", "my favorite color is green", 0.5).with_created_at(now),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "color", 8);
        assert_eq!(ids(&ranked), vec!["new"]);
    }

    #[test]
    fn test_near_duplicates_without_time_keep_higher_score() {
        let hits = vec![
            MemoryHit::new("low", "Twix is great", 0.3),
            MemoryHit::new("high", "twix is great", 0.6),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "twix", 8);
        assert_eq!(ids(&ranked), vec!["high"]);
    }

    #[test]
    fn test_recency_boost_is_linear_over_batch() {
        let now = Utc::now();
        let hits = vec![
            MemoryHit::new("old", "alpha", 0.5).with_created_at(now - Duration::hours(2)),
            MemoryHit::new("mid", "beta", 0.5).with_created_at(now - Duration::hours(1)),
            MemoryHit::new("new", "gamma", 0.5).with_created_at(now),
            MemoryHit::new("untimed", "delta", 0.5),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "", 8);
        let score = |id: &str| ranked.iter().find(|h| h.source_id == id).map(|h| h.score).unwrap();

        let base = score("untimed");
        assert!((score("old") - base).abs() < 1e-6);
        assert!((score("mid") - base - 0.075).abs() < 1e-4);
        assert!((score("new") - base - 0.15).abs() < 1e-4);
    }

    #[test]
    fn test_single_instant_batch_gets_no_recency() {
        let now = Utc::now();
        let hits = vec![
            MemoryHit::new("a", "alpha", 0.5).with_created_at(now),
            MemoryHit::new("b", "beta", 0.5).with_created_at(now),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "", 8);
        assert!(ranked.iter().all(|h| (h.score - 0.6).abs() < 1e-6));
    }

    #[test]
    fn test_sub_millisecond_spans_still_order() {
        let now = Utc::now();
        let hits = vec![
            MemoryHit::new("old", "alpha", 0.5).with_created_at(now),
            MemoryHit::new("new", "beta", 0.5).with_created_at(now + Duration::microseconds(400)),
        ];
        let ranked = ranker().rank_and_dedupe(hits, "", 8);
        let score = |id: &str| ranked.iter().find(|h| h.source_id == id).map(|h| h.score).unwrap();

        assert!((score("new") - score("old") - 0.15).abs() < 1e-4);
        assert_eq!(ranked[0].source_id, "new");
    }

    #[test]
    fn test_file_query_prefers_file_hits() {
        let hits = vec![
            MemoryHit::new("chat", "the budget total is 40k", 0.5),
            MemoryHit::new("file", "budget total: 40k", 0.5).with_source_type(SourceType::File),
        ];
        let from_file = ranker().rank_and_dedupe(hits.clone(), "what does the budget document say", 8);
        assert_eq!(ids(&from_file), vec!["file", "chat"]);

        let from_chat = ranker().rank_and_dedupe(hits, "what did we say about the budget", 8);
        assert_eq!(ids(&from_chat), vec!["chat", "file"]);
    }

    #[test]
    fn test_ties_keep_input_order_and_cap() {
        let hits = (0..5)
            .map(|i| MemoryHit::new(format!("h{}", i), format!("note {}", i), 0.5))
            .collect();
        let ranked = ranker().rank_and_dedupe(hits, "", 3);
        assert_eq!(ids(&ranked), vec!["h0", "h1", "h2"]);
    }

    #[test]
    fn test_topic_key_prefix() {
        let long = "x".repeat(200);
        assert_eq!(topic_key(&long, 160).len(), 160);
        assert_eq!(topic_key("  A  b\nC ", 160), "a b c");
    }
}
