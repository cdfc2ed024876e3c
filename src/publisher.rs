//! Publisher name cleanup and publisher extraction from renewal full text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::similarity::token_sort_ratio;
use crate::text::normalize;

static TRAILING_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.,;:]+$").expect("valid trailing punctuation regex"));
static TRAILING_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid trailing parenthetical regex"));
static LINEAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i),?\s*(successor to|formerly|division of|imprint of|subsidiary of).*$")
        .expect("valid publisher lineage regex")
});

const PUBLISHER_INDICATORS: &[&str] = &[
    "publisher",
    "published by",
    "press",
    "publications",
    "books",
    "pub.",
    "publishing",
    "imprint",
    "edition",
];

const NON_PUBLISHER_STARTS: &[&str] = &["the", "a", "an", "by", "in", "at", "on", "for"];

const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "ltd",
    "limited",
    "co",
    "company",
    "corp",
    "corporation",
    "llc",
    "plc",
    "and",
];

/// Minimum token-sort score for a full-text segment to stand in for the publisher.
pub const PUBLISHER_MATCH_THRESHOLD: f64 = 80.0;

/// Strip trailing punctuation, a trailing parenthetical and "successor to ..." style lineage.
pub fn clean_publisher_suffix(publisher: &str) -> String {
    let cleaned = TRAILING_PUNCT_RE.replace(publisher, "");
    let cleaned = TRAILING_PAREN_RE.replace(&cleaned, "");
    let cleaned = LINEAGE_RE.replace(&cleaned, "");
    cleaned.trim().to_string()
}

/// Drop trailing corporate designators ("inc", "ltd", "and co") from a normalized name.
/// A name made only of designators is returned unchanged.
pub fn strip_corporate_suffixes(normalized: &str) -> String {
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    while tokens.len() > 1
        && tokens
            .last()
            .is_some_and(|t| CORPORATE_SUFFIXES.contains(t))
    {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Canonical comparison form of a publisher name.
pub fn normalize_publisher(raw: &str) -> String {
    strip_corporate_suffixes(&normalize(&clean_publisher_suffix(raw)))
}

/// Segments of unstructured renewal text that look like publisher names.
pub fn extract_publisher_candidates(full_text: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for segment in full_text.split([';', '.', ',', '\n']) {
        let segment = segment.trim();
        if segment.chars().count() < 3 {
            continue;
        }
        let lower = segment.to_lowercase();
        if PUBLISHER_INDICATORS.iter().any(|ind| lower.contains(ind)) {
            candidates.push(segment.to_string());
            continue;
        }
        let words: Vec<&str> = segment.split_whitespace().collect();
        let starts_upper = segment.chars().next().is_some_and(char::is_uppercase);
        if (3..=6).contains(&words.len())
            && starts_upper
            && !NON_PUBLISHER_STARTS.contains(&words[0].to_lowercase().as_str())
        {
            candidates.push(segment.to_string());
        }
    }
    candidates
}

/// Best publisher-like segment of `full_text` relative to a catalog publisher,
/// when it scores at least [`PUBLISHER_MATCH_THRESHOLD`].
pub fn extract_best_publisher_match(catalog_publisher: &str, full_text: &str) -> Option<String> {
    let target = normalize_publisher(catalog_publisher);
    if target.is_empty() {
        return None;
    }
    let mut best: Option<(f64, String)> = None;
    for candidate in extract_publisher_candidates(full_text) {
        let score = token_sort_ratio(&target, &normalize_publisher(&candidate));
        if score < PUBLISHER_MATCH_THRESHOLD {
            continue;
        }
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_publisher_suffix() {
        assert_eq!(clean_publisher_suffix("Scribner,"), "Scribner");
        assert_eq!(clean_publisher_suffix("Doubleday (NY)"), "Doubleday");
        assert_eq!(
            clean_publisher_suffix("Farrar, successor to Rinehart & Co."),
            "Farrar"
        );
        assert_eq!(
            clean_publisher_suffix("Ace Books, Division of Charter"),
            "Ace Books"
        );
        assert_eq!(clean_publisher_suffix(""), "");
    }

    #[test]
    fn test_strip_corporate_suffixes() {
        assert_eq!(strip_corporate_suffixes("harper brothers inc"), "harper brothers");
        assert_eq!(strip_corporate_suffixes("scribner and co"), "scribner");
        assert_eq!(strip_corporate_suffixes("macmillan company"), "macmillan");
        assert_eq!(strip_corporate_suffixes("co"), "co");
        assert_eq!(strip_corporate_suffixes(""), "");
    }

    #[test]
    fn test_normalize_publisher() {
        assert_eq!(normalize_publisher("Charles Scribner's Sons, Inc."), "charles scribner s sons");
        assert_eq!(normalize_publisher("Little, Brown & Co."), "little brown");
    }

    #[test]
    fn test_extract_publisher_candidates() {
        let text = "Renewed by John Smith; Published by Random House. New York City Library Edition";
        let candidates = extract_publisher_candidates(text);
        assert!(candidates.contains(&"Published by Random House".to_string()));
        assert!(candidates.contains(&"New York City Library Edition".to_string()));
        assert!(candidates.contains(&"Renewed by John Smith".to_string()));
    }

    #[test]
    fn test_extract_publisher_candidates_skips_short_and_lowercase() {
        let candidates = extract_publisher_candidates("ab; the quick brown fox; In the beginning was");
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_extract_best_publisher_match() {
        let text = "R123456; 12Jan55; Doubleday & Company; John Smith (A)";
        assert_eq!(
            extract_best_publisher_match("Doubleday", text).as_deref(),
            Some("Doubleday & Company")
        );
        assert_eq!(extract_best_publisher_match("Viking Press", text), None);
        assert_eq!(extract_best_publisher_match("", text), None);
    }
}
