//! Enumerated-list parsing
//!
//! `"Spain, Greece, and Thailand."` → `["Spain", "Greece", "Thailand"]`

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static RE_CONJUNCTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:,\s*|\s+)(?:and|&)\s+").ok());

static RE_RANK_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:#\s*(\d{1,3})|(\d{1,3})[.):])\s*(.+)$").ok());

/// Characters trimmed from both ends of a list item
const ITEM_TRIM: &[char] = &[
    '"', '\'', '`', '“', '”', '‘', '’', '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '*',
    '-', '•',
];

/// Split an enumerated phrase into items.
///
/// ", and " / " and " / ";" become commas, items are trimmed of quotes and
/// punctuation, and duplicates are dropped case-insensitively keeping the
/// first spelling and position.
pub fn parse_bulk(text: &str) -> Vec<String> {
    let normalized = match RE_CONJUNCTION.as_ref() {
        Some(re) => re.replace_all(text, ",").into_owned(),
        None => text.to_string(),
    };

    let mut seen = HashSet::new();
    normalized
        .split([',', ';', '\n'])
        .map(clean_item)
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Split a leading rank token off a list item: `"#2 Twix"` → `(Some(2), "Twix")`
pub fn split_rank_token(item: &str) -> (Option<u32>, String) {
    let trimmed = item.trim();
    let caps = RE_RANK_TOKEN.as_ref().and_then(|re| re.captures(trimmed));

    match caps {
        Some(caps) => {
            let rank = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|r| *r > 0);
            match (rank, caps.get(3)) {
                (Some(rank), Some(rest)) => (Some(rank), clean_item(rest.as_str())),
                _ => (None, clean_item(trimmed)),
            }
        }
        None => (None, clean_item(trimmed)),
    }
}

pub(crate) fn clean_item(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_matches(ITEM_TRIM).trim().to_string()
}
