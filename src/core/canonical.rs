//! Topic canonicalization
//!
//! Turns a free-form topic phrase ("My Favorite Candies", "tv-shows") into the
//! single token used in ranked-list keys (`candy`, `tv_show`).
//!
//! # Key Points
//! - Pure string normalization, no I/O
//! - Idempotent: the pipeline runs to a fixpoint
//! - Empty input maps to [`UNKNOWN_TOPIC`]

/// Sentinel returned when nothing survives normalization
pub const UNKNOWN_TOPIC: &str = "unknown";

/// Leading tokens that never belong to a topic
const PREFIX_TOKENS: &[&str] = &[
    "my",
    "favorite",
    "favorites",
    "favourite",
    "favourites",
];

/// Canonicalize a topic phrase
pub fn canonicalize(raw: &str) -> String {
    let mut current = raw.to_string();

    // Each pass only shortens or keeps the string, so this terminates.
    loop {
        let next = canonicalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        UNKNOWN_TOPIC.to_string()
    } else {
        current
    }
}

/// Normalize an attribute phrase into a key segment.
///
/// Same separator handling as [`canonicalize`] but keeps every token and its
/// plural form: `"Dog's Name"` becomes `dogs_name`.
pub fn slugify(raw: &str) -> String {
    let separated = separate(&raw.trim().to_lowercase());
    collapse_underscores(&separated)
}

fn canonicalize_once(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let slug = collapse_underscores(&separate(&lowered));

    let mut tokens: Vec<String> = slug
        .split('_')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    while tokens
        .first()
        .is_some_and(|t| PREFIX_TOKENS.contains(&t.as_str()))
    {
        tokens.remove(0);
    }

    let Some(last) = tokens.pop() else {
        return String::new();
    };
    tokens.push(singularize(&last));

    tokens.join("_")
}

/// Whitespace and hyphens become underscores, other punctuation is dropped
fn separate(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() || c == '-' || c == '_' {
                Some('_')
            } else if c.is_alphanumeric() {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

fn collapse_underscores(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

/// Plurals in "-ies" whose singular ends in "-ie"
const IE_SINGULARS: &[&str] = &[
    "movie", "cookie", "pie", "tie", "rookie", "zombie", "selfie", "smoothie", "brownie",
    "genie", "hippie", "calorie", "goalie", "lie",
];

/// Same form in singular and plural
const INVARIANT: &[&str] = &["series", "species", "news"];

fn singularize(word: &str) -> String {
    if INVARIANT.contains(&word) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        let ie = format!("{}ie", stem);
        if IE_SINGULARS.contains(&ie.as_str()) {
            return ie;
        }
        return format!("{}y", stem);
    }
    if word.ends_with('s') && !word.ends_with("ss") && word.chars().count() > 2 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
