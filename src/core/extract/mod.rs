//! Fact extraction
//!
//! Turns one user message into generic facts and topic-less ranked-list
//! candidates. The text is split into clauses first; every rule of
//! [`rules::all_rules`] is then applied to every clause.
//!
//! Only user-authored text is mined. Extraction is pure: no I/O, no clock.

pub mod bulk;
pub mod rules;
pub mod values;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use self::rules::{evaluate, Extracted, ExtractionRule};
use super::fact::{Fact, Role, ValueType};

pub use bulk::parse_bulk;

static RE_CLAUSE_BREAK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:,?\s+(?:and|but|also)|,)\s+(?P<next>my|i'm|i)\b").ok()
});

/// Tokens that end in a period without ending the sentence
const ABBREVIATIONS: &[&str] = &["no", "mr", "mrs", "ms", "dr", "st", "jr", "vs", "e.g", "i.e", "etc"];

/// A generic (non-ranked) fact candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    pub fact_key: String,
    pub value_text: String,
    pub value_type: ValueType,
    pub confidence: f32,
    /// Name of the rule that produced it
    pub rule: &'static str,
}

impl ExtractedFact {
    pub fn into_fact(self, project_id: &str, message_id: Option<String>) -> Fact {
        Fact::new(project_id, self.fact_key, self.value_text)
            .with_type(self.value_type)
            .with_confidence(self.confidence)
            .with_source_message(message_id)
    }
}

/// How a ranked-list candidate is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Position inside an enumerated list
    Sequential,
    /// Rank stated explicitly ("my second favorite ...")
    Explicit,
    /// Insert at a rank and shift occupants down
    Promote,
    /// After the current last rank
    Append,
}

/// A ranked-list entry whose topic is not yet resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RankedListCandidate {
    /// `None` only for appends
    pub rank: Option<u32>,
    pub value: String,
    /// Canonical topic named in the message itself
    pub explicit_topic: Option<String>,
    pub placement: Placement,
    pub confidence: f32,
    pub rule: &'static str,
}

/// Everything extracted from one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub facts: Vec<ExtractedFact>,
    pub ranked: Vec<RankedListCandidate>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.ranked.is_empty()
    }

    /// Keep one fact per key: highest confidence, first seen on ties
    fn push_fact(&mut self, fact: ExtractedFact) {
        match self.facts.iter_mut().find(|f| f.fact_key == fact.fact_key) {
            Some(existing) if fact.confidence > existing.confidence => *existing = fact,
            Some(_) => {}
            None => self.facts.push(fact),
        }
    }

    fn push_candidate(&mut self, candidate: RankedListCandidate) {
        let duplicate = self.ranked.iter().any(|c| {
            c.explicit_topic == candidate.explicit_topic
                && c.rank == candidate.rank
                && c.value.eq_ignore_ascii_case(&candidate.value)
        });
        if !duplicate {
            self.ranked.push(candidate);
        }
    }
}

/// Rule-driven fact extractor
pub struct FactExtractor {
    rules: Vec<ExtractionRule>,
    min_confidence: f32,
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl FactExtractor {
    /// Rules below `min_confidence` are skipped
    pub fn new(min_confidence: f32) -> Self {
        Self {
            rules: rules::all_rules(),
            min_confidence,
        }
    }

    pub fn extract(&self, text: &str, role: Role) -> Extraction {
        let mut extraction = Extraction::default();
        if role != Role::User {
            debug!(%role, "Skipping extraction for non-user message");
            return extraction;
        }

        for clause in split_clauses(text) {
            for rule in self.rules.iter().filter(|r| r.confidence >= self.min_confidence) {
                for item in evaluate(rule, &clause) {
                    match item {
                        Extracted::Fact(fact) => extraction.push_fact(fact),
                        Extracted::Ranked(candidate) => extraction.push_candidate(candidate),
                    }
                }
            }
        }

        debug!(
            facts = extraction.facts.len(),
            ranked = extraction.ranked.len(),
            "Extracted"
        );
        extraction
    }
}

/// Split a message into clauses.
///
/// Bullet and numbered lines are folded into the preceding line so a list
/// stays in one clause. Sentences end at `.`, `!`, `?`; clauses joined by
/// "and my" / ", I" style conjunctions are split further.
pub fn split_clauses(text: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match segments.last_mut() {
            Some(last) if is_list_line(line) => {
                last.push_str(", ");
                last.push_str(line);
            }
            _ => segments.push(line.to_string()),
        }
    }

    segments
        .iter()
        .flat_map(|segment| split_sentences(segment))
        .flat_map(split_conjoined)
        .map(|clause| {
            clause
                .trim()
                .trim_end_matches(['.', '!', '?', ',', ';'])
                .trim()
                .to_string()
        })
        .filter(|clause| !clause.is_empty())
        .collect()
}

fn is_list_line(line: &str) -> bool {
    if line.starts_with(['-', '*', '•']) {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(['.', ')'])
}

fn split_sentences(segment: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = segment.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let at_break = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        let boundary = match c {
            '!' | '?' => at_break,
            '.' => at_break && !suppresses_break(&segment[start..pos], prev),
            _ => false,
        };
        if boundary {
            let end = pos + c.len_utf8();
            out.push(&segment[start..end]);
            start = end;
        }
        prev = Some(c);
    }
    out.push(&segment[start..]);
    out
}

/// Periods after abbreviations and list numbers ("1. Snickers") don't end a sentence
fn suppresses_break(before: &str, prev: Option<char>) -> bool {
    let Some(token) = before.split_whitespace().last() else {
        return false;
    };

    if prev.is_some_and(|c| c.is_ascii_digit()) {
        let is_marker = token.len() <= 3 && token.chars().all(|c| c.is_ascii_digit());
        let lead = before[..before.len() - token.len()].trim_end();
        return is_marker && (lead.is_empty() || lead.ends_with([',', ':']));
    }

    ABBREVIATIONS.contains(&token.to_lowercase().as_str())
}

fn split_conjoined(sentence: &str) -> Vec<&str> {
    let Some(re) = RE_CLAUSE_BREAK.as_ref() else {
        return vec![sentence];
    };

    let mut out = Vec::new();
    let mut start = 0;
    for caps in re.captures_iter(sentence) {
        let (Some(whole), Some(next)) = (caps.get(0), caps.name("next")) else {
            continue;
        };
        out.push(&sentence[start..whole.start()]);
        start = next.start();
    }
    out.push(&sentence[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(extraction: &Extraction) -> Vec<&str> {
        extraction.facts.iter().map(|f| f.fact_key.as_str()).collect()
    }

    #[test]
    fn test_split_clauses() {
        let clauses = split_clauses("I'm 34 years old and my email is ada@example.com. I live in Berlin!");
        assert_eq!(
            clauses,
            vec!["I'm 34 years old", "my email is ada@example.com", "I live in Berlin"]
        );
    }

    #[test]
    fn test_split_keeps_abbreviations_and_decimals() {
        let clauses = split_clauses("Move Twix to no. 2 on my candy list. I am 1.80 m tall.");
        assert_eq!(
            clauses,
            vec!["Move Twix to no. 2 on my candy list", "I am 1.80 m tall"]
        );
    }

    #[test]
    fn test_split_folds_list_lines() {
        let clauses = split_clauses("My top movies:\n1. Heat\n2. Alien\n\nThanks!");
        assert_eq!(clauses, vec!["My top movies:, 1. Heat, 2. Alien", "Thanks"]);
    }

    #[test]
    fn test_non_user_roles_are_ignored() {
        let extractor = FactExtractor::default();
        let text = "My name is Ada. My favorite candies are Snickers, Twix.";
        assert!(extractor.extract(text, Role::Assistant).is_empty());
        assert!(extractor.extract(text, Role::System).is_empty());
        assert!(!extractor.extract(text, Role::User).is_empty());
    }

    #[test]
    fn test_candy_bulk_list() {
        let extraction = FactExtractor::default()
            .extract("My favorite candies are Snickers, Reese's, Twix.", Role::User);

        assert!(extraction.facts.is_empty());
        let ranked: Vec<_> = extraction
            .ranked
            .iter()
            .map(|c| (c.rank, c.value.as_str(), c.explicit_topic.as_deref()))
            .collect();
        assert_eq!(
            ranked,
            vec![
                (Some(1), "Snickers", Some("candy")),
                (Some(2), "Reese's", Some("candy")),
                (Some(3), "Twix", Some("candy")),
            ]
        );
    }

    #[test]
    fn test_bulleted_list() {
        let extraction = FactExtractor::default()
            .extract("My favorite colors are:\n- red\n- green\n- blue", Role::User);
        let values: Vec<_> = extraction.ranked.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["red", "green", "blue"]);
        assert!(extraction.ranked.iter().all(|c| c.explicit_topic.as_deref() == Some("color")));
    }

    #[test]
    fn test_highest_confidence_wins_per_key() {
        let extraction =
            FactExtractor::default().extract("My birthday is June 5, 1990.", Role::User);

        assert_eq!(keys(&extraction), vec!["user.birthday"]);
        let fact = &extraction.facts[0];
        assert_eq!(fact.value_text, "1990-06-05");
        assert_eq!(fact.rule, "birthday");
        assert_eq!(fact.value_type, ValueType::Date);
    }

    #[test]
    fn test_mixed_message() {
        let extraction = FactExtractor::default().extract(
            "My name is Ada, I'm 36 years old and I work at Analytical Engines. \
             I don't smoke and my email is ada@example.com.",
            Role::User,
        );

        let mut found = keys(&extraction);
        found.sort();
        assert_eq!(
            found,
            vec!["user.age", "user.email", "user.employer", "user.habits.smoke", "user.name"]
        );
        let email = extraction
            .facts
            .iter()
            .find(|f| f.fact_key == "user.email")
            .unwrap();
        assert_eq!(email.rule, "email");
    }

    #[test]
    fn test_min_confidence_filters_rules() {
        let text = "See https://example.com/ada for more";
        assert_eq!(
            keys(&FactExtractor::new(0.5).extract(text, Role::User)),
            vec!["user.links.example_com"]
        );
        assert!(FactExtractor::new(0.6).extract(text, Role::User).is_empty());
    }

    #[test]
    fn test_promote_without_topic() {
        let extraction = FactExtractor::default().extract("Make BTC my #1", Role::User);
        assert!(extraction.facts.is_empty());
        assert_eq!(extraction.ranked.len(), 1);
        assert_eq!(extraction.ranked[0].placement, Placement::Promote);
        assert_eq!(extraction.ranked[0].explicit_topic, None);
    }

    #[test]
    fn test_into_fact() {
        let extracted = ExtractedFact {
            fact_key: "user.age".to_string(),
            value_text: "36".to_string(),
            value_type: ValueType::Number,
            confidence: 0.9,
            rule: "age",
        };
        let fact = extracted.into_fact("p1", Some("m1".to_string()));
        assert_eq!(fact.project_id, "p1");
        assert_eq!(fact.value_type, ValueType::Number);
        assert_eq!(fact.source_message_id.as_deref(), Some("m1"));
    }
}
