//! Value parsers for typed facts
//!
//! - dates: a fixed list of chrono formats, normalized to `YYYY-MM-DD`
//! - quantities: number + unit alias, normalized to the unit symbol
//! - small cardinal and ordinal words

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static RE_DAY_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").ok());

static RE_QUANTITY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^(?P<num>\d+(?:[.,]\d+)?)\s*(?P<unit>[a-z°%"']+(?:\s+old)?)?$"#).ok()
});

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
];

/// (alias, canonical symbol)
const UNIT_ALIASES: &[(&str, &str)] = &[
    ("mm", "mm"),
    ("millimeter", "mm"),
    ("millimeters", "mm"),
    ("cm", "cm"),
    ("centimeter", "cm"),
    ("centimeters", "cm"),
    ("centimetre", "cm"),
    ("centimetres", "cm"),
    ("m", "m"),
    ("meter", "m"),
    ("meters", "m"),
    ("metre", "m"),
    ("metres", "m"),
    ("km", "km"),
    ("kilometer", "km"),
    ("kilometers", "km"),
    ("in", "in"),
    ("inch", "in"),
    ("inches", "in"),
    ("\"", "in"),
    ("ft", "ft"),
    ("foot", "ft"),
    ("feet", "ft"),
    ("'", "ft"),
    ("mi", "mi"),
    ("mile", "mi"),
    ("miles", "mi"),
    ("g", "g"),
    ("gram", "g"),
    ("grams", "g"),
    ("kg", "kg"),
    ("kilo", "kg"),
    ("kilos", "kg"),
    ("kilogram", "kg"),
    ("kilograms", "kg"),
    ("lb", "lb"),
    ("lbs", "lb"),
    ("pound", "lb"),
    ("pounds", "lb"),
    ("l", "l"),
    ("liter", "l"),
    ("liters", "l"),
    ("litre", "l"),
    ("litres", "l"),
    ("year", "years"),
    ("years", "years"),
    ("yr", "years"),
    ("yrs", "years"),
    ("years old", "years"),
    ("month", "months"),
    ("months", "months"),
    ("°c", "°C"),
    ("celsius", "°C"),
    ("°f", "°F"),
    ("fahrenheit", "°F"),
    ("%", "%"),
    ("percent", "%"),
];

const NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

const ORDINAL_WORDS: &[&str] = &[
    "", "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
    "tenth",
];

/// Parse a free-form date into a calendar date
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let mut cleaned = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?'))
        .to_string();

    if let Some(re) = RE_DAY_SUFFIX.as_ref() {
        cleaned = re.replace_all(&cleaned, "$1").into_owned();
    }

    // "the 5 of June 2019" → "5 June 2019"
    let cleaned = cleaned
        .split_whitespace()
        .filter(|w| !w.eq_ignore_ascii_case("the") && !w.eq_ignore_ascii_case("of"))
        .collect::<Vec<_>>()
        .join(" ");

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

/// A number with an optional unit
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub amount: f64,
    pub unit: Option<&'static str>,
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // f64 Display drops a zero fraction and never switches to exponents
        match self.unit {
            Some(unit) => write!(f, "{} {}", self.amount, unit),
            None => write!(f, "{}", self.amount),
        }
    }
}

/// Parse `"75 kg"`, `"6ft"`, `"1,5 liters"`, `"34"`.
/// Unknown units yield `None`.
pub fn parse_quantity(raw: &str) -> Option<Quantity> {
    let lowered = raw
        .trim()
        .trim_end_matches(['.', ',', '!', '?'])
        .to_lowercase();
    let caps = RE_QUANTITY.as_ref()?.captures(&lowered)?;

    let num = caps.name("num")?.as_str();
    // "02139" is a code, not an amount
    if num.len() > 1 && num.starts_with('0') && num.as_bytes()[1].is_ascii_digit() {
        return None;
    }
    let amount: f64 = num.replace(',', ".").parse().ok()?;
    let unit = match caps.name("unit") {
        Some(m) => Some(lookup_unit(m.as_str())?),
        None => None,
    };

    Some(Quantity { amount, unit })
}

fn lookup_unit(alias: &str) -> Option<&'static str> {
    UNIT_ALIASES
        .iter()
        .find(|(a, _)| *a == alias)
        .map(|(_, symbol)| *symbol)
}

/// `"7"` or `"seven"` → 7
pub fn parse_count(raw: &str) -> Option<u32> {
    let word = raw.trim().to_lowercase();
    if let Ok(n) = word.parse::<u32>() {
        return Some(n);
    }
    NUMBER_WORDS
        .iter()
        .position(|w| *w == word)
        .map(|n| n as u32)
}

/// Rank tokens: `#1`, `# 2`, `number 3`, `no. 4`, `2nd`, `second`, `two`, `top`
pub fn parse_rank(raw: &str) -> Option<u32> {
    let word = raw.trim().to_lowercase();
    if word == "top" {
        return Some(1);
    }

    let digits: String = word
        .trim_start_matches("number")
        .trim_start_matches("no.")
        .trim_start_matches("no")
        .trim_start_matches('#')
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .to_string();

    let rank = if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse::<u32>().ok()
    } else {
        ORDINAL_WORDS
            .iter()
            .position(|w| !w.is_empty() && *w == word)
            .map(|n| n as u32)
            .or_else(|| parse_count(&word))
    };

    rank.filter(|r| *r > 0)
}
