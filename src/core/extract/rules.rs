//! Extraction rule table
//!
//! Every rule is a named regex with a fixed confidence and a [`RuleKind`]
//! describing how its captures become facts or ranked-list candidates.
//! [`all_rules`] returns them in evaluation order; [`evaluate`] applies one
//! rule to one clause.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::bulk::{clean_item, parse_bulk, split_rank_token};
use super::values::{parse_count, parse_date, parse_quantity, parse_rank};
use super::{ExtractedFact, Placement, RankedListCandidate};
use crate::core::canonical::{canonicalize, slugify, UNKNOWN_TOPIC};
use crate::core::fact::ValueType;

macro_rules! rule_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

/// `#2`, `no. 2`, `number 2`, `2nd`, `second`, `top`
macro_rules! rank_token {
    () => {
        r"(?P<rank>#\s*\d{1,3}|\bno\.\s*\d{1,3}|\bnumber\s+\d{1,3}|\b(?:first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|top|\d{1,2}(?:st|nd|rd|th))\b)"
    };
}

macro_rules! topic_phrase {
    () => {
        r"(?P<topic>[a-z][a-z' -]{0,40}?)"
    };
}

// ── Identity ───────────────────────────────────────────────────────────────
rule_pattern!(
    RE_NAME,
    r"\b(?i:my\s+name\s+is|call\s+me|i\s+go\s+by)\s+(?P<value>\p{Lu}[\p{L}'-]*(?:\s+\p{Lu}[\p{L}'-]*){0,3})"
);

rule_pattern!(
    RE_EMAIL,
    r"(?P<value>[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,})"
);

rule_pattern!(
    RE_WEBSITE,
    r"(?i)\bmy\s+(?:personal\s+)?(?:website|site|homepage|home\s+page|blog|portfolio)\s+is\s+(?:at\s+)?(?P<value>(?:https?://)?[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)+(?:/\S*)?)"
);

rule_pattern!(
    RE_LINK,
    r"(?i)\b(?P<value>https?://(?P<host>[a-z0-9.-]+)(?:[/?#]\S*)?)"
);

// ── Dates ──────────────────────────────────────────────────────────────────
rule_pattern!(
    RE_BIRTHDAY,
    r"(?i)\b(?:my\s+birthday\s+is|my\s+date\s+of\s+birth\s+is|i\s+was\s+born)\s+(?:on\s+)?(?P<value>.+)$"
);

rule_pattern!(
    RE_DATED_ATTRIBUTE,
    r"(?i)\bmy\s+(?P<attr>[a-z][a-z' ]{0,30}?)\s+(?:is|was|falls)\s+(?:on\s+)?(?P<value>.+)$"
);

// ── Measurements ───────────────────────────────────────────────────────────
rule_pattern!(
    RE_AGE,
    r"(?i)\b(?:i'm|i\s+am|i\s+just\s+turned|i\s+turned)\s+(?P<value>\d{1,3})\s*(?:years?|yrs?)(?:\s+old)?\b"
);

rule_pattern!(
    RE_HEIGHT,
    r"(?i)\b(?:i'm|i\s+am)\s+(?P<value>\d+(?:[.,]\d+)?\s*(?:cm|m|ft|feet|foot|in|inches|centimet(?:er|re)s?|met(?:er|re)s?))\s+tall\b"
);

rule_pattern!(
    RE_WEIGHT,
    r"(?i)\bi\s+weigh\s+(?:about\s+|around\s+)?(?P<value>\d+(?:[.,]\d+)?\s*(?:kg|kilos?|kilograms?|lbs?|pounds?))\b"
);

rule_pattern!(
    RE_MEASURED_ATTRIBUTE,
    r"(?i)\bmy\s+(?P<attr>[a-z][a-z' ]{0,30}?)\s+is\s+(?:about\s+|around\s+)?(?P<value>\d+(?:[.,]\d+)?\s*(?:[a-z°%]+(?:\s+old)?)?)\s*$"
);

rule_pattern!(
    RE_POSSESSION_COUNT,
    r"(?i)\bi\s+(?:have|own|have\s+got)\s+(?P<count>\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten)\s+(?P<noun>[a-z]+)\b"
);

// ── Entities ───────────────────────────────────────────────────────────────
rule_pattern!(
    RE_LOCATION,
    r"\b(?i:i\s+live\s+in|i\s+currently\s+live\s+in|i'm\s+based\s+in|i\s+am\s+based\s+in|i\s+moved\s+to|i\s+reside\s+in)\s+(?P<value>\p{Lu}[\p{L}.'-]*(?:(?:\s+|,\s*)\p{Lu}[\p{L}.'-]*){0,3})"
);

rule_pattern!(
    RE_HOMETOWN,
    r"\b(?i:i'm\s+from|i\s+am\s+from|i\s+grew\s+up\s+in|i\s+was\s+born\s+in)\s+(?P<value>\p{Lu}[\p{L}.'-]*(?:(?:\s+|,\s*)\p{Lu}[\p{L}.'-]*){0,3})"
);

rule_pattern!(
    RE_EMPLOYER,
    r"\b(?i:i\s+work\s+(?:at|for)|i'm\s+working\s+(?:at|for)|i\s+am\s+working\s+(?:at|for)|i'm\s+employed\s+(?:at|by)|i\s+am\s+employed\s+(?:at|by)|my\s+employer\s+is)\s+(?P<value>\p{Lu}[\p{L}\p{N}&.'-]*(?:\s+(?:&\s+)?\p{Lu}[\p{L}\p{N}&.'-]*){0,3})"
);

// ── Habits ─────────────────────────────────────────────────────────────────
rule_pattern!(
    RE_HABIT,
    r"(?i)\bi\s+(?P<neg>don't\s+|do\s+not\s+|never\s+|no\s+longer\s+)?(?:regularly\s+|usually\s+|often\s+)?(?P<verb>smoke|drink|drive|meditate|exercise|vape|cycle|swim)\b"
);

// ── Generic "my X is Y" ────────────────────────────────────────────────────
rule_pattern!(
    RE_ATTRIBUTE_IS,
    r"(?i)\bmy\s+(?P<attr>[a-z][a-z' ]{0,30}?)\s+(?:is|are)\s+(?P<value>.{1,120})$"
);

// ── Ranked lists ───────────────────────────────────────────────────────────
rule_pattern!(
    RE_FAVORITES_BULK,
    concat!(
        r"(?i)\bmy\s+(?:all[- ]time\s+)?favou?rites?\s+",
        topic_phrase!(),
        r"(?:\s+(?:are|is|include|were)(?:\s*:\s*|\s+)|\s*:\s*)(?P<value>.+)$"
    )
);

rule_pattern!(
    RE_TOP_N_BULK,
    concat!(
        r"(?i)\bmy\s+top\s+(?:(?:\d{1,2}|three|four|five|six|seven|eight|nine|ten)\s+)?(?:favou?rite\s+)?",
        topic_phrase!(),
        r"(?:\s+(?:are|is|include|were)(?:\s*:\s*|\s+)|\s*:\s*)(?P<value>.+)$"
    )
);

rule_pattern!(
    RE_ORDINAL_FAVORITE,
    concat!(
        r"(?i)(?:\bmy\s+)?",
        rank_token!(),
        r"\s+(?:most\s+)?favou?rite\s+",
        topic_phrase!(),
        r"\s+(?:is|are|would\s+be)\s+(?P<value>.+)$"
    )
);

rule_pattern!(
    RE_ORDINAL_INVERSE,
    concat!(
        r"(?i)^(?P<value>.+?)\s+is\s+(?:now\s+)?my\s+",
        rank_token!(),
        r"(?:\s+(?:most\s+)?favou?rite)?(?:\s+",
        topic_phrase!(),
        r")?\s*$"
    )
);

rule_pattern!(
    RE_PROMOTE,
    concat!(
        r"(?i)\b(?:make|set)\s+(?P<value>.+?)\s+(?:(?:as\s+)?(?:my|the)\s+)?",
        rank_token!(),
        r"(?:\s+(?:most\s+)?favou?rite)?(?:\s+",
        topic_phrase!(),
        r")?(?:\s+(?:on|in)\s+(?:my|the)\s+list)?\s*$"
    )
);

rule_pattern!(
    RE_MOVE,
    concat!(
        r"(?i)\b(?:move|put|bump)\s+(?P<value>.+?)\s+(?:up\s+|down\s+)?(?:to|at|into)\s+(?:the\s+)?",
        rank_token!(),
        r"(?:\s+(?:place|spot|position|slot))?(?:\s+(?:on|in|of)\s+(?:my|the)\s+(?:favou?rite\s+)?",
        topic_phrase!(),
        r"(?:\s+list)?)?\s*$"
    )
);

rule_pattern!(
    RE_APPEND,
    concat!(
        r"(?i)\badd\s+(?P<value>.+?)\s+to\s+my\s+(?:list\s+of\s+)?(?:favou?rite\s+",
        topic_phrase!(),
        r"(?:\s+list)?|favou?rites?(?:\s+list)?)\s*$"
    )
);

/// How a matched value is normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueParse {
    Text,
    Date,
    Quantity,
    Integer,
}

impl ValueParse {
    fn apply(self, raw: &str) -> Option<(String, ValueType)> {
        match self {
            ValueParse::Text => {
                let value = clean_item(raw);
                (!value.is_empty()).then_some((value, ValueType::String))
            }
            ValueParse::Date => {
                parse_date(raw).map(|d| (d.format("%Y-%m-%d").to_string(), ValueType::Date))
            }
            ValueParse::Quantity => parse_quantity(raw).map(|q| (q.to_string(), ValueType::Number)),
            ValueParse::Integer => raw
                .trim()
                .parse::<u32>()
                .ok()
                .map(|n| (n.to_string(), ValueType::Number)),
        }
    }
}

/// What a rule produces from its captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `value` stored under a fixed key
    Fixed { key: &'static str, parse: ValueParse },
    /// `value` stored under `user.<attr>`
    Attribute { parse: ValueParse },
    /// URL stored under `user.links.<host>`
    Link,
    /// `count` stored under `user.<noun>.count`
    Count,
    /// Boolean under `user.habits.<verb>`
    Habit,
    /// Enumerated list, one candidate per item
    RankedBulk,
    /// One value at an explicit rank
    RankedOrdinal,
    /// Insert-with-shift at an explicit rank
    RankedPromote,
    /// Append after the current last rank
    RankedAppend,
}

/// A named extraction rule
pub struct ExtractionRule {
    pub name: &'static str,
    pub confidence: f32,
    pub pattern: &'static LazyLock<Option<Regex>>,
    pub kind: RuleKind,
}

/// One rule match
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Fact(ExtractedFact),
    Ranked(RankedListCandidate),
}

/// All rules in evaluation order. Earlier rules win confidence ties.
pub fn all_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule {
            name: "name",
            confidence: 0.95,
            pattern: &RE_NAME,
            kind: RuleKind::Fixed { key: "user.name", parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "email",
            confidence: 0.95,
            pattern: &RE_EMAIL,
            kind: RuleKind::Fixed { key: "user.email", parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "birthday",
            confidence: 0.90,
            pattern: &RE_BIRTHDAY,
            kind: RuleKind::Fixed { key: "user.birthday", parse: ValueParse::Date },
        },
        ExtractionRule {
            name: "age",
            confidence: 0.90,
            pattern: &RE_AGE,
            kind: RuleKind::Fixed { key: "user.age", parse: ValueParse::Integer },
        },
        ExtractionRule {
            name: "favorites_bulk",
            confidence: 0.90,
            pattern: &RE_FAVORITES_BULK,
            kind: RuleKind::RankedBulk,
        },
        ExtractionRule {
            name: "top_n_bulk",
            confidence: 0.90,
            pattern: &RE_TOP_N_BULK,
            kind: RuleKind::RankedBulk,
        },
        ExtractionRule {
            name: "ordinal_favorite",
            confidence: 0.90,
            pattern: &RE_ORDINAL_FAVORITE,
            kind: RuleKind::RankedOrdinal,
        },
        ExtractionRule {
            name: "ordinal_inverse",
            confidence: 0.85,
            pattern: &RE_ORDINAL_INVERSE,
            kind: RuleKind::RankedOrdinal,
        },
        ExtractionRule {
            name: "promote",
            confidence: 0.85,
            pattern: &RE_PROMOTE,
            kind: RuleKind::RankedPromote,
        },
        ExtractionRule {
            name: "move",
            confidence: 0.85,
            pattern: &RE_MOVE,
            kind: RuleKind::RankedPromote,
        },
        ExtractionRule {
            name: "append",
            confidence: 0.85,
            pattern: &RE_APPEND,
            kind: RuleKind::RankedAppend,
        },
        ExtractionRule {
            name: "website",
            confidence: 0.85,
            pattern: &RE_WEBSITE,
            kind: RuleKind::Fixed { key: "user.website", parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "height",
            confidence: 0.85,
            pattern: &RE_HEIGHT,
            kind: RuleKind::Fixed { key: "user.height", parse: ValueParse::Quantity },
        },
        ExtractionRule {
            name: "weight",
            confidence: 0.85,
            pattern: &RE_WEIGHT,
            kind: RuleKind::Fixed { key: "user.weight", parse: ValueParse::Quantity },
        },
        ExtractionRule {
            name: "dated_attribute",
            confidence: 0.85,
            pattern: &RE_DATED_ATTRIBUTE,
            kind: RuleKind::Attribute { parse: ValueParse::Date },
        },
        ExtractionRule {
            name: "measured_attribute",
            confidence: 0.85,
            pattern: &RE_MEASURED_ATTRIBUTE,
            kind: RuleKind::Attribute { parse: ValueParse::Quantity },
        },
        ExtractionRule {
            name: "possession_count",
            confidence: 0.80,
            pattern: &RE_POSSESSION_COUNT,
            kind: RuleKind::Count,
        },
        ExtractionRule {
            name: "location",
            confidence: 0.80,
            pattern: &RE_LOCATION,
            kind: RuleKind::Fixed { key: "user.location", parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "hometown",
            confidence: 0.80,
            pattern: &RE_HOMETOWN,
            kind: RuleKind::Fixed { key: "user.hometown", parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "employer",
            confidence: 0.80,
            pattern: &RE_EMPLOYER,
            kind: RuleKind::Fixed { key: "user.employer", parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "habit",
            confidence: 0.75,
            pattern: &RE_HABIT,
            kind: RuleKind::Habit,
        },
        ExtractionRule {
            name: "attribute_is",
            confidence: 0.70,
            pattern: &RE_ATTRIBUTE_IS,
            kind: RuleKind::Attribute { parse: ValueParse::Text },
        },
        ExtractionRule {
            name: "link",
            confidence: 0.50,
            pattern: &RE_LINK,
            kind: RuleKind::Link,
        },
    ]
}

/// Words that make an attribute phrase part of a ranked-list statement
const RANKED_WORDS: &[&str] = &[
    "favorite", "favourite", "favorites", "favourites", "fave", "faves", "top", "list", "first",
    "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Nouns that are not possessions ("I have two questions")
const COUNT_STOPWORDS: &[&str] = &[
    "question", "problem", "thing", "idea", "minute", "hour", "day", "week", "month", "year",
    "time", "more", "other", "option",
];

/// Values that point back at something instead of naming it
const PRONOUNS: &[&str] = &["it", "that", "this", "them", "those", "these", "one"];

/// Topics too generic to name a list
const GENERIC_TOPICS: &[&str] = &["list", "one", "thing", "pick", "choice"];

/// Apply one rule to one clause
pub fn evaluate(rule: &ExtractionRule, clause: &str) -> Vec<Extracted> {
    let Some(re) = rule.pattern.as_ref() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for caps in re.captures_iter(clause) {
        match rule.kind {
            RuleKind::Fixed { key, parse } => {
                if let Some((value, value_type)) = capture(&caps, "value").and_then(|v| parse.apply(v)) {
                    out.push(fact(rule, key.to_string(), value, value_type));
                }
            }
            RuleKind::Attribute { parse } => {
                let Some(key) = capture(&caps, "attr").and_then(attribute_key) else {
                    continue;
                };
                if let Some((value, value_type)) = capture(&caps, "value").and_then(|v| parse.apply(v)) {
                    out.push(fact(rule, key, value, value_type));
                }
            }
            RuleKind::Link => {
                let (Some(url), Some(host)) = (capture(&caps, "value"), capture(&caps, "host")) else {
                    continue;
                };
                let url = url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"']);
                let host = host.to_lowercase();
                let host = host.trim_start_matches("www.").trim_end_matches('.');
                let slug = slugify(&host.replace('.', "_"));
                if !slug.is_empty() {
                    out.push(fact(rule, format!("user.links.{}", slug), url.to_string(), ValueType::String));
                }
            }
            RuleKind::Count => {
                let (Some(count), Some(noun)) = (capture(&caps, "count"), capture(&caps, "noun")) else {
                    continue;
                };
                let noun = canonicalize(noun);
                if noun == UNKNOWN_TOPIC || COUNT_STOPWORDS.contains(&noun.as_str()) {
                    continue;
                }
                if let Some(n) = parse_count(count) {
                    out.push(fact(rule, format!("user.{}.count", noun), n.to_string(), ValueType::Number));
                }
            }
            RuleKind::Habit => {
                let Some(verb) = capture(&caps, "verb") else {
                    continue;
                };
                let value = if caps.name("neg").is_some() { "false" } else { "true" };
                out.push(fact(
                    rule,
                    format!("user.habits.{}", verb.to_lowercase()),
                    value.to_string(),
                    ValueType::Bool,
                ));
            }
            RuleKind::RankedBulk => {
                let topic = explicit_topic(&caps);
                let Some(value) = capture(&caps, "value") else {
                    continue;
                };
                let items: Vec<(Option<u32>, String)> = parse_bulk(value)
                    .iter()
                    .map(|item| split_rank_token(item))
                    .filter(|(_, value)| !value.is_empty())
                    .collect();

                // Unranked items fill the slots no explicit rank claimed
                let taken: HashSet<u32> = items.iter().filter_map(|(rank, _)| *rank).collect();
                let mut next_free = 1;
                for (rank, value) in items {
                    let (rank, placement) = match rank {
                        Some(rank) => (rank, Placement::Explicit),
                        None => {
                            while taken.contains(&next_free) {
                                next_free += 1;
                            }
                            next_free += 1;
                            (next_free - 1, Placement::Sequential)
                        }
                    };
                    out.push(ranked(rule, Some(rank), value, topic.clone(), placement));
                }
            }
            RuleKind::RankedOrdinal | RuleKind::RankedPromote => {
                let Some(rank) = capture(&caps, "rank").and_then(parse_rank) else {
                    continue;
                };
                let Some(value) = capture(&caps, "value").and_then(single_value) else {
                    continue;
                };
                let placement = if rule.kind == RuleKind::RankedPromote {
                    Placement::Promote
                } else {
                    Placement::Explicit
                };
                out.push(ranked(rule, Some(rank), value, explicit_topic(&caps), placement));
            }
            RuleKind::RankedAppend => {
                let topic = explicit_topic(&caps);
                let Some(value) = capture(&caps, "value") else {
                    continue;
                };
                for item in parse_bulk(value) {
                    if let Some(value) = single_value(&item) {
                        out.push(ranked(rule, None, value, topic.clone(), Placement::Append));
                    }
                }
            }
        }
    }
    out
}

fn capture<'t>(caps: &Captures<'t>, group: &str) -> Option<&'t str> {
    caps.name(group).map(|m| m.as_str()).filter(|s| !s.trim().is_empty())
}

fn fact(rule: &ExtractionRule, fact_key: String, value_text: String, value_type: ValueType) -> Extracted {
    Extracted::Fact(ExtractedFact {
        fact_key,
        value_text,
        value_type,
        confidence: rule.confidence,
        rule: rule.name,
    })
}

fn ranked(
    rule: &ExtractionRule,
    rank: Option<u32>,
    value: String,
    explicit_topic: Option<String>,
    placement: Placement,
) -> Extracted {
    Extracted::Ranked(RankedListCandidate {
        rank,
        value,
        explicit_topic,
        placement,
        confidence: rule.confidence,
        rule: rule.name,
    })
}

/// `user.<slug>` unless the phrase belongs to a ranked-list statement
fn attribute_key(attr: &str) -> Option<String> {
    let lowered = attr.to_lowercase();
    let ranked = lowered.split_whitespace().any(|w| {
        RANKED_WORDS.contains(&w) || w.starts_with('#') || w.chars().any(|c| c.is_ascii_digit())
    });
    if ranked {
        return None;
    }
    let slug = slugify(&lowered);
    (!slug.is_empty()).then(|| format!("user.{}", slug))
}

fn explicit_topic(caps: &Captures<'_>) -> Option<String> {
    let topic = canonicalize(capture(caps, "topic")?);
    if topic == UNKNOWN_TOPIC || GENERIC_TOPICS.contains(&topic.as_str()) {
        return None;
    }
    Some(topic)
}

fn single_value(raw: &str) -> Option<String> {
    let value = clean_item(raw);
    if value.is_empty() || PRONOUNS.contains(&value.to_lowercase().as_str()) {
        return None;
    }
    Some(value)
}
