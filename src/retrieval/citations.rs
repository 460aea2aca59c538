//! Citation post-processing
//!
//! Answers cite memory hits inline as `[M<n>]` (1-based). Only the best few
//! citations survive: one for a single-claim answer, up to the configured cap
//! when the answer makes several claims. Survivors are renumbered densely by
//! first appearance.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::CitationConfig;
use crate::core::fact::Role;
use crate::core::hit::MemoryHit;

static RE_MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[[Mm](\d+)\]").ok());

static RE_NUMBERED_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d{1,3}[.)]\s+\S").ok());

static RE_SEGMENT_BREAK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[.!?;]+(?:\s+|$)|\n+").ok());

const CONNECTIVES: &[&str] = &["and", "also", "additionally", "however", "while", "but", "plus"];

/// Answer text after citation cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitedAnswer {
    pub text: String,
    /// 0-based positions in the input hit list, ordered by new marker number
    pub kept_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CitationProcessor {
    config: CitationConfig,
}

impl CitationProcessor {
    pub fn new(config: CitationConfig) -> Self {
        Self { config }
    }

    pub fn post_process(&self, answer: &str, hits: &[MemoryHit]) -> CitedAnswer {
        let Some(re) = RE_MARKER.as_ref() else {
            return CitedAnswer {
                text: answer.to_string(),
                kept_indices: Vec::new(),
            };
        };

        // Distinct valid citations, 0-based, by first appearance
        let mut cited: Vec<usize> = Vec::new();
        for caps in re.captures_iter(answer) {
            let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
                continue;
            };
            if (1..=hits.len()).contains(&n) && !cited.contains(&(n - 1)) {
                cited.push(n - 1);
            }
        }

        let stripped = re.replace_all(answer, "");
        let multi_claim = is_multi_claim(&stripped);
        let keep = if multi_claim && cited.len() > 1 {
            self.config
                .multi_claim_cap
                .min(self.config.default_keep.saturating_mul(3))
        } else {
            self.config.default_keep
        };

        let mut ranked = cited.clone();
        ranked.sort_by(|&a, &b| {
            preference(&hits[b], &hits[a]).then_with(|| first_seen(&cited, a).cmp(&first_seen(&cited, b)))
        });
        ranked.truncate(keep);

        // Renumber survivors densely in order of first appearance
        let mut renumber: HashMap<usize, usize> = HashMap::new();
        let mut kept_indices = Vec::new();
        for &index in &cited {
            if ranked.contains(&index) {
                kept_indices.push(index);
                renumber.insert(index, kept_indices.len());
            }
        }

        debug!(
            cited = cited.len(),
            kept = kept_indices.len(),
            multi_claim,
            "Post-processed citations"
        );

        CitedAnswer {
            text: rewrite(answer, re, &renumber),
            kept_indices,
        }
    }
}

/// Higher is better: user role, then newer, then similarity score
fn preference(a: &MemoryHit, b: &MemoryHit) -> Ordering {
    let role_rank = |hit: &MemoryHit| u8::from(hit.role == Role::User);
    role_rank(a)
        .cmp(&role_rank(b))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
}

fn first_seen(cited: &[usize], index: usize) -> usize {
    cited.iter().position(|&i| i == index).unwrap_or(usize::MAX)
}

/// Replace kept markers with their new numbers; drop the rest and collapse
/// adjacent repeats. Whitespace in front of a dropped marker is held back and
/// only reused when a kept marker follows in the same run.
fn rewrite(answer: &str, re: &Regex, renumber: &HashMap<usize, usize>) -> String {
    let mut out = String::with_capacity(answer.len());
    let mut last_end = 0;
    let mut last_marker: Option<usize> = None;
    let mut held = "";

    for caps in re.captures_iter(answer) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let between = &answer[last_end..whole.start()];
        last_end = whole.end();

        let only_space = between.trim().is_empty();
        if !only_space {
            last_marker = None;
            held = "";
        }

        let new_number = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| renumber.get(&index).copied());

        match new_number {
            Some(n) if last_marker != Some(n) => {
                if only_space && !held.is_empty() {
                    out.push_str(held);
                } else {
                    out.push_str(between);
                }
                out.push_str(&format!("[M{}]", n));
                last_marker = Some(n);
                held = "";
            }
            _ => {
                let text = between.trim_end();
                out.push_str(text);
                if held.is_empty() || !only_space {
                    held = &between[text.len()..];
                }
            }
        }
    }

    out.push_str(&answer[last_end..]);
    out
}

/// Bullets, numbered items, three or more sentences, or two joined by a connective
pub fn is_multi_claim(text: &str) -> bool {
    let bulleted = text.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ")
    });
    let numbered = RE_NUMBERED_LINE.as_ref().is_some_and(|re| re.is_match(text));
    if bulleted || numbered {
        return true;
    }

    let segments: Vec<&str> = match RE_SEGMENT_BREAK.as_ref() {
        Some(re) => re.split(text).collect(),
        None => vec![text],
    };
    let segments: Vec<&str> = segments
        .into_iter()
        .filter(|s| s.chars().any(char::is_alphabetic))
        .collect();

    match segments.len() {
        0 | 1 => false,
        2 => segments.iter().any(|s| {
            s.split(|c: char| !c.is_alphanumeric())
                .any(|w| CONNECTIVES.contains(&w.to_lowercase().as_str()))
        }),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn hits(n: usize) -> Vec<MemoryHit> {
        (0..n)
            .map(|i| MemoryHit::new(format!("h{}", i), format!("hit {}", i), 0.5))
            .collect()
    }

    fn process(answer: &str, hits: &[MemoryHit]) -> CitedAnswer {
        CitationProcessor::default().post_process(answer, hits)
    }

    #[test]
    fn test_single_claim_keeps_one() {
        let mut hits = hits(3);
        hits[1].score = 0.9;

        let out = process("Your favorite candy is Twix [M1][M2][M3].", &hits);
        assert_eq!(out.text, "Your favorite candy is Twix [M1].");
        assert_eq!(out.kept_indices, vec![1]);
    }

    #[test]
    fn test_multi_claim_bullets_keep_three() {
        let hits = hits(4);
        let answer = "- Candy: Twix [M1]\n- Color: green [M2]\n- City: Berlin [M3]\n- Pet: cat [M4]";
        let out = process(answer, &hits);

        assert_eq!(out.kept_indices, vec![0, 1, 2]);
        assert_eq!(
            out.text,
            "- Candy: Twix [M1]\n- Color: green [M2]\n- City: Berlin [M3]\n- Pet: cat"
        );
    }

    #[test]
    fn test_renumbering_is_dense_by_appearance() {
        let mut hits = hits(5);
        hits[4].created_at = Some(Utc::now());
        hits[2].created_at = Some(Utc::now() - Duration::days(1));

        let answer = "You like green [M5]. You live in Berlin [M3]. You have a cat [M1].";
        let out = process(answer, &hits);

        assert_eq!(out.kept_indices, vec![4, 2, 0]);
        assert_eq!(
            out.text,
            "You like green [M1]. You live in Berlin [M2]. You have a cat [M3]."
        );
    }

    #[test]
    fn test_user_role_preferred() {
        let mut hits = hits(2);
        hits[0].role = Role::Assistant;
        hits[0].score = 0.99;

        let out = process("It is Twix [M1] [M2]", &hits);
        assert_eq!(out.kept_indices, vec![1]);
        assert_eq!(out.text, "It is Twix [M1]");
    }

    #[test]
    fn test_out_of_range_and_lowercase_markers() {
        let hits = hits(2);
        let out = process("Twix [m2] [M7] [M0]!", &hits);
        assert_eq!(out.text, "Twix [M1]!");
        assert_eq!(out.kept_indices, vec![1]);
    }

    #[test]
    fn test_adjacent_repeats_collapse() {
        let hits = hits(2);
        let out = process("Twix [M1] [M1][M1] is it.", &hits);
        assert_eq!(out.text, "Twix [M1] is it.");
    }

    #[test]
    fn test_dropped_marker_keeps_spacing_before_survivor() {
        let mut hits = hits(3);
        hits[2].score = 0.9;

        let out = process("Twix [M1] [M2][M3] is it.", &hits);
        assert_eq!(out.text, "Twix [M1] is it.");
        assert_eq!(out.kept_indices, vec![2]);
    }

    #[test]
    fn test_huge_marker_is_dropped() {
        let out = process("Twix [M1] [M12345].", &hits(2));
        assert_eq!(out.text, "Twix [M1].");
        assert_eq!(out.kept_indices, vec![0]);
    }

    #[test]
    fn test_no_markers() {
        let out = process("Nothing cited here.", &hits(2));
        assert_eq!(out.text, "Nothing cited here.");
        assert!(out.kept_indices.is_empty());
    }

    #[test]
    fn test_multi_claim_detection() {
        assert!(is_multi_claim("1. Twix\n2. Mars"));
        assert!(is_multi_claim("A is x. B is y. C is z."));
        assert!(is_multi_claim("You like Twix. However, you also like Mars."));
        assert!(!is_multi_claim("You like Twix."));
        assert!(!is_multi_claim("You like Twix. That's it."));
    }
}
