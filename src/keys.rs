//! Index keys for titles and authors, plus natural-order author names.

use ahash::AHashSet;

use crate::text::{normalize, normalize_name};

/// Shortest token kept as a significant title word.
const MIN_SIGNIFICANT_LEN: usize = 3;

/// Prefix that keeps phonetic keys apart from word keys in the same posting map.
const PHONETIC_PREFIX: char = '#';

/// Significant words of a normalized title in original order.
///
/// Drops stopwords and words shorter than three characters. When that leaves nothing,
/// the last word of the title is kept so a non-empty title always yields a key.
pub fn significant_words<'a>(normalized: &'a str, stopwords: &AHashSet<String>) -> Vec<&'a str> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let significant: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| w.len() >= MIN_SIGNIFICANT_LEN && !stopwords.contains(*w))
        .collect();
    if significant.is_empty() {
        return words.last().map(|w| vec![*w]).unwrap_or_default();
    }
    significant
}

/// Soundex code: first letter and three digits ("Robert" -> "r163").
pub fn soundex(word: &str) -> Option<String> {
    let mut letters = word.chars().filter(char::is_ascii_alphabetic);
    let first = letters.next()?.to_ascii_lowercase();

    let code = |c: char| -> Option<char> {
        match c.to_ascii_lowercase() {
            'b' | 'f' | 'p' | 'v' => Some('1'),
            'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
            'd' | 't' => Some('3'),
            'l' => Some('4'),
            'm' | 'n' => Some('5'),
            'r' => Some('6'),
            _ => None,
        }
    };

    let mut out = String::with_capacity(4);
    out.push(first);
    let mut prev = code(first);
    for c in letters {
        if out.len() == 4 {
            break;
        }
        let current = code(c);
        if let Some(digit) = current {
            if current != prev {
                out.push(digit);
            }
        }
        // h and w do not separate letters with the same code
        if !matches!(c.to_ascii_lowercase(), 'h' | 'w') {
            prev = current;
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    Some(out)
}

/// Index keys for a title: significant words, contiguous 2- and 3-word
/// combinations joined by `_`, and optionally a Soundex key per word.
pub fn generate_title_keys(
    title: &str,
    stopwords: &AHashSet<String>,
    phonetic: bool,
) -> AHashSet<String> {
    let normalized = normalize(title);
    let words = significant_words(&normalized, stopwords);
    let mut keys = AHashSet::with_capacity(words.len() * 3);

    for word in &words {
        keys.insert((*word).to_string());
        if phonetic {
            if let Some(code) = soundex(word) {
                keys.insert(format!("{PHONETIC_PREFIX}{code}"));
            }
        }
    }
    for n in 2..=3 {
        for window in words.windows(n) {
            keys.insert(window.join("_"));
        }
    }
    keys
}

/// Split an author string into (given names, surname).
///
/// "Surname, Given Names" when a comma is present, otherwise the last token is the surname.
/// Corporate names go through the same rule.
pub fn parse_name(author: &str) -> (Vec<String>, String) {
    if let Some((surname, given)) = author.split_once(',') {
        let surname = normalize_name(surname);
        if !surname.is_empty() {
            let given = normalize_name(given)
                .split_whitespace()
                .map(str::to_string)
                .collect();
            return (given, surname);
        }
        return parse_name(given);
    }
    let mut tokens: Vec<String> = normalize_name(author)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let surname = tokens.pop().unwrap_or_default();
    (tokens, surname)
}

/// Normalized name in natural order, given names first: "Smith, John" becomes "john smith".
pub fn canonical_name(author: &str) -> String {
    let (mut parts, surname) = parse_name(author);
    if !surname.is_empty() {
        parts.push(surname);
    }
    parts.join(" ")
}

/// Index keys for an author name: the surname, surname with first given name in both
/// orders, and surname paired with every given name.
pub fn generate_author_keys(author: &str) -> AHashSet<String> {
    let (given, surname) = parse_name(author);
    let mut keys = AHashSet::new();
    if surname.is_empty() {
        return keys;
    }
    // "Van Dyke, Henry" keeps the whole surname as one key
    let surname = surname.replace(' ', "_");
    if let Some(first) = given.first() {
        keys.insert(format!("{first}_{surname}"));
    }
    for name in &given {
        keys.insert(format!("{surname}_{name}"));
    }
    keys.insert(surname);
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopwords() -> AHashSet<String> {
        ["the", "a", "an", "of", "and"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    fn set(items: &[&str]) -> AHashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_title_keys_words_and_ngrams() {
        let keys = generate_title_keys("The Great Gatsby", &stopwords(), false);
        assert_eq!(keys, set(&["great", "gatsby", "great_gatsby"]));
    }

    #[test]
    fn test_title_keys_three_word_windows() {
        let keys = generate_title_keys("History of Modern European Art", &stopwords(), false);
        assert!(keys.contains("history_modern"));
        assert!(keys.contains("modern_european"));
        assert!(keys.contains("european_art"));
        assert!(keys.contains("history_modern_european"));
        assert!(keys.contains("modern_european_art"));
        assert!(!keys.contains("history_modern_european_art"));
    }

    #[test]
    fn test_title_keys_never_empty_for_nonempty_title() {
        let keys = generate_title_keys("Of the", &stopwords(), false);
        assert_eq!(keys, set(&["the"]));
        let keys = generate_title_keys("It", &stopwords(), false);
        assert_eq!(keys, set(&["it"]));
    }

    #[test]
    fn test_title_keys_empty() {
        assert!(generate_title_keys("", &stopwords(), false).is_empty());
        assert!(generate_title_keys("   ", &stopwords(), false).is_empty());
        assert!(generate_title_keys("[microform]", &stopwords(), false).is_empty());
    }

    #[test]
    fn test_title_keys_phonetic() {
        let keys = generate_title_keys("Macdonald", &stopwords(), true);
        assert!(keys.contains("macdonald"));
        assert!(keys.contains("#m235"));
        let other = generate_title_keys("McDonald", &stopwords(), true);
        assert!(other.contains("#m235"));
    }

    #[test]
    fn test_soundex() {
        assert_eq!(soundex("Robert").as_deref(), Some("r163"));
        assert_eq!(soundex("Rupert").as_deref(), Some("r163"));
        assert_eq!(soundex("Ashcraft").as_deref(), Some("a261"));
        assert_eq!(soundex("Tymczak").as_deref(), Some("t522"));
        assert_eq!(soundex("Lee").as_deref(), Some("l000"));
        assert_eq!(soundex(""), None);
        assert_eq!(soundex("123"), None);
    }

    #[test]
    fn test_author_keys_comma_form() {
        let keys = generate_author_keys("Fitzgerald, F. Scott");
        assert_eq!(
            keys,
            set(&["fitzgerald", "f_fitzgerald", "fitzgerald_f", "fitzgerald_scott"])
        );
    }

    #[test]
    fn test_author_keys_natural_order() {
        let keys = generate_author_keys("John Ronald Tolkien");
        assert_eq!(
            keys,
            set(&["tolkien", "john_tolkien", "tolkien_john", "tolkien_ronald"])
        );
    }

    #[test]
    fn test_author_keys_corporate_name_uses_last_token() {
        let keys = generate_author_keys("Harvard University Press");
        assert!(keys.contains("press"));
        assert!(keys.contains("harvard_press"));
        assert!(keys.contains("press_university"));
    }

    #[test]
    fn test_author_keys_compound_surname() {
        let keys = generate_author_keys("Van Dyke, Henry");
        assert_eq!(keys, set(&["van_dyke", "henry_van_dyke", "van_dyke_henry"]));
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("Smith, John A."), "john a smith");
        assert_eq!(canonical_name("John A. Smith"), "john a smith");
        assert_eq!(canonical_name("Voltaire"), "voltaire");
        assert_eq!(canonical_name(", Anonymous"), "anonymous");
        assert_eq!(canonical_name(""), "");
    }

    #[test]
    fn test_author_keys_single_token_and_empty() {
        assert_eq!(generate_author_keys("Voltaire"), set(&["voltaire"]));
        assert!(generate_author_keys("").is_empty());
        assert!(generate_author_keys(" , ").is_empty());
    }
}
