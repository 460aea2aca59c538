//! Escalation advice
//!
//! Decides whether a lightweight answer should be re-routed to a more
//! capable model.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::EscalationConfig;
use crate::core::fact::Role;
use crate::core::hit::MemoryHit;
use crate::retrieval::provider::Retrieval;

const COMPLEX_VOCABULARY: &[&str] = &[
    "analyze",
    "analyse",
    "compare",
    "contrast",
    "evaluate",
    "explain why",
    "pros and cons",
    "trade-off",
    "tradeoff",
    "step by step",
    "reasoning",
    "implications",
    "strategy",
    "in depth",
];

const UNCERTAINTY_PHRASES: &[&str] = &[
    "i'm not sure",
    "i am not sure",
    "i don't know",
    "i do not know",
    "not certain",
    "i can't tell",
    "i cannot tell",
    "unclear",
    "i don't have enough information",
    "i don't have that information",
    "no information",
];

const CONFUSION_PHRASES: &[&str] = &[
    "could you clarify",
    "can you clarify",
    "what do you mean",
    "i don't understand",
    "i do not understand",
    "confusing",
    "could you rephrase",
];

const TEMPORAL_MARKERS: &[&str] = &[
    "now",
    "used to",
    "previously",
    "anymore",
    "no longer",
    "changed",
    "moved",
    "recently",
    "these days",
];

static RE_STATEMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:your|my)\s+(?P<attr>[a-z][a-z ]{1,30}?)\s+(?:is|was|are)\s+(?:now\s+)?(?P<value>[^.,;!?\n]{1,60})")
        .ok()
});

/// Why a query should escalate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    ComplexQuery,
    Uncertainty,
    TooShort,
    Confusion,
    Contradiction,
    ProviderUnavailable,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EscalationReason::ComplexQuery => "complex_query",
            EscalationReason::Uncertainty => "uncertainty",
            EscalationReason::TooShort => "too_short",
            EscalationReason::Confusion => "confusion",
            EscalationReason::Contradiction => "contradiction",
            EscalationReason::ProviderUnavailable => "provider_unavailable",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscalationDecision {
    pub should_escalate: bool,
    pub reason: Option<EscalationReason>,
}

impl EscalationDecision {
    pub fn none() -> Self {
        Self {
            should_escalate: false,
            reason: None,
        }
    }

    pub fn escalate(reason: EscalationReason) -> Self {
        Self {
            should_escalate: true,
            reason: Some(reason),
        }
    }

    /// Retrieval failed; answer quality cannot be trusted
    pub fn provider_unavailable() -> Self {
        Self::escalate(EscalationReason::ProviderUnavailable)
    }
}

/// How two assistant statements about the same attribute relate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContradictionKind {
    /// Conflicting values with no sign of change over time
    SameAttributeDifferentValue { attribute: String },
    /// The value changed; the newer statement supersedes the older
    TemporalProgression { attribute: String },
}

impl ContradictionKind {
    pub fn escalates(&self) -> bool {
        matches!(self, ContradictionKind::SameAttributeDifferentValue { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EscalationAdvisor {
    config: EscalationConfig,
}

impl EscalationAdvisor {
    pub fn new(config: EscalationConfig) -> Self {
        Self { config }
    }

    /// Like [`should_escalate`](Self::should_escalate), but a degraded
    /// retrieval escalates with `provider_unavailable` before any other check
    pub fn assess(&self, query: &str, retrieval: &Retrieval, answer: &str) -> EscalationDecision {
        if retrieval.degraded {
            debug!("Retrieval degraded, escalating");
            return EscalationDecision::provider_unavailable();
        }
        self.should_escalate(query, &retrieval.hits, answer)
    }

    pub fn should_escalate(&self, query: &str, hits: &[MemoryHit], answer: &str) -> EscalationDecision {
        let query_lower = query.to_lowercase();
        let answer_lower = answer.to_lowercase();

        let decision = if contains_any(&query_lower, COMPLEX_VOCABULARY) {
            EscalationDecision::escalate(EscalationReason::ComplexQuery)
        } else if contains_any(&answer_lower, UNCERTAINTY_PHRASES) {
            EscalationDecision::escalate(EscalationReason::Uncertainty)
        } else if answer.trim().chars().count() < self.config.min_answer_chars {
            EscalationDecision::escalate(EscalationReason::TooShort)
        } else if contains_any(&answer_lower, CONFUSION_PHRASES) {
            EscalationDecision::escalate(EscalationReason::Confusion)
        } else if self.config.detect_contradictions
            && classify_contradictions(hits).iter().any(ContradictionKind::escalates)
        {
            EscalationDecision::escalate(EscalationReason::Contradiction)
        } else {
            EscalationDecision::none()
        };

        debug!(
            escalate = decision.should_escalate,
            reason = ?decision.reason,
            "Escalation decided"
        );
        decision
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| {
        haystack.match_indices(needle).any(|(start, _)| {
            let end = start + needle.len();
            let before_ok = haystack[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
            let after_ok = haystack[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
            before_ok && after_ok
        })
    })
}

/// Compare "your X is Y" statements across assistant hits
pub fn classify_contradictions(hits: &[MemoryHit]) -> Vec<ContradictionKind> {
    let Some(re) = RE_STATEMENT.as_ref() else {
        return Vec::new();
    };

    // attribute -> (value, temporal) as first seen
    let mut seen: HashMap<String, (String, bool)> = HashMap::new();
    let mut found = Vec::new();

    for hit in hits.iter().filter(|h| h.role == Role::Assistant) {
        let lower = hit.content.to_lowercase();
        let temporal = contains_any(&lower, TEMPORAL_MARKERS);

        for caps in re.captures_iter(&lower) {
            let (Some(attr), Some(value)) = (caps.name("attr"), caps.name("value")) else {
                continue;
            };
            let attribute = attr.as_str().trim().to_string();
            let value = value.as_str().trim().to_string();

            match seen.get(&attribute) {
                Some((previous, previous_temporal)) if *previous != value => {
                    let kind = if temporal || *previous_temporal {
                        ContradictionKind::TemporalProgression { attribute: attribute.clone() }
                    } else {
                        ContradictionKind::SameAttributeDifferentValue { attribute: attribute.clone() }
                    };
                    found.push(kind);
                }
                Some(_) => {}
                None => {
                    seen.insert(attribute, (value, temporal));
                }
            }
        }
    }

    found
}
