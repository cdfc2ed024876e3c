//! Canonical text forms shared by indexing, scoring and LCCN matching.

use ahash::AHashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static BRACKETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]]*\]").expect("valid bracket regex"));
static SPLIT_LETTERS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[a-z] +)+[a-z]\b").expect("valid split letters regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b|c)((?:18|19|20)\d{2})\b").expect("valid publication year regex")
});

/// Letters that Unicode decomposition leaves alone.
fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ø' => "o",
        'Ø' => "O",
        'ß' => "ss",
        'đ' | 'ð' => "d",
        'Đ' | 'Ð' => "D",
        'ł' => "l",
        'Ł' => "L",
        'þ' => "th",
        'Þ' => "TH",
        'ı' => "i",
        _ => return None,
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `[...]` annotations, innermost first, then collapse whitespace.
///
/// Unbalanced brackets are kept as they are.
pub fn remove_bracketed_content(text: &str) -> String {
    let mut cleaned = text.to_string();
    while BRACKETED_RE.is_match(&cleaned) {
        cleaned = BRACKETED_RE.replace_all(&cleaned, "").into_owned();
    }
    collapse_whitespace(&cleaned)
}

/// Decompose, drop combining marks, transliterate ligatures and drop whatever is still non-ASCII.
pub fn ascii_fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii() {
            out.push(c);
        } else if let Some(replacement) = transliterate(c) {
            out.push_str(replacement);
        } else if c.is_whitespace() {
            out.push(' ');
        }
    }
    out
}

/// Rejoin runs of two or more single letters: "u s a" becomes "usa".
pub fn normalize_word_splits(text: &str) -> String {
    SPLIT_LETTERS_RE
        .replace_all(text, |caps: &regex::Captures| caps[0].replace(' ', ""))
        .into_owned()
}

fn fold_and_strip(raw: &str) -> String {
    let folded = ascii_fold(&remove_bracketed_content(raw)).to_ascii_lowercase();
    let stripped: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&stripped)
}

/// Full normalization for titles and publishers.
///
/// Output is lowercase ASCII alphanumerics separated by single spaces. Idempotent.
pub fn normalize(raw: &str) -> String {
    normalize_word_splits(&fold_and_strip(raw))
}

/// Normalization for personal names. Same as [`normalize`] without split-letter repair,
/// so initials ("e m adams") survive.
pub fn normalize_name(raw: &str) -> String {
    fold_and_strip(raw)
}

/// Words of `text` not in `stopwords`, in order.
pub fn remove_stopwords<'a>(text: &'a str, stopwords: &AHashSet<String>) -> Vec<&'a str> {
    text.split_whitespace()
        .filter(|w| !stopwords.contains(*w))
        .collect()
}

/// Canonical LCCN: spaces removed, anything from `/` dropped, numeric serial after the
/// hyphen zero-padded to six digits, remaining hyphens removed.
///
/// `"n78-890351"` becomes `"n78890351"`, `"85-2"` becomes `"85000002"`.
pub fn normalize_lccn(raw: &str) -> String {
    let mut lccn: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(slash) = lccn.find('/') {
        lccn.truncate(slash);
    }
    if let Some((prefix, serial)) = lccn.split_once('-') {
        let serial = serial.replace('-', "");
        let serial = if !serial.is_empty()
            && serial.len() <= 6
            && serial.chars().all(|c| c.is_ascii_digit())
        {
            format!("{serial:0>6}")
        } else {
            serial
        };
        lccn = format!("{prefix}{serial}");
    }
    lccn.to_ascii_lowercase()
}

/// Alphabetic prefix of a normalized LCCN ("n" for "n78890351").
pub fn lccn_prefix(normalized: &str) -> &str {
    let end = normalized
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(normalized.len());
    &normalized[..end]
}

/// Year portion of a normalized LCCN: two digits before 2001, four after.
///
/// Only the ten-digit form carries a four-digit year, so "19123456" is year "19".
pub fn lccn_year(normalized: &str) -> &str {
    let digits = &normalized[lccn_prefix(normalized).len()..];
    let width = if digits.len() >= 10 { 4 } else { 2 };
    digits.get(..width).unwrap_or(digits)
}

/// Serial number portion of a normalized LCCN.
pub fn lccn_serial(normalized: &str) -> &str {
    let digits = &normalized[lccn_prefix(normalized).len()..];
    let year = lccn_year(normalized).len();
    digits.get(year..).unwrap_or("")
}

/// First four-digit year between 1800 and 2099 in a date string, tolerating a `c` prefix.
pub fn extract_year(pub_date: &str) -> Option<i32> {
    YEAR_RE.captures(pub_date)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_remove_bracketed_content() {
        assert_eq!(remove_bracketed_content("Title [microform]"), "Title");
        assert_eq!(
            remove_bracketed_content("A [electronic resource] history"),
            "A history"
        );
        assert_eq!(remove_bracketed_content("Nested [a [b] c] end"), "Nested end");
        assert_eq!(remove_bracketed_content("Open [bracket"), "Open [bracket");
        assert_eq!(remove_bracketed_content("Lone ] bracket"), "Lone ] bracket");
        assert_eq!(remove_bracketed_content(""), "");
    }

    #[test]
    fn test_ascii_fold() {
        assert_eq!(ascii_fold("café"), "cafe");
        assert_eq!(ascii_fold("Ærø"), "AEro");
        assert_eq!(ascii_fold("Straße"), "Strasse");
        assert_eq!(ascii_fold("Łódź"), "Lodz");
        assert_eq!(ascii_fold("ﬁnance"), "finance");
        assert_eq!(ascii_fold("日本 book"), " book");
    }

    #[test]
    fn test_normalize_word_splits() {
        assert_eq!(normalize_word_splits("a b c"), "abc");
        assert_eq!(normalize_word_splits("u s a amerikas"), "usa amerikas");
        assert_eq!(normalize_word_splits("volume v i"), "volume vi");
        assert_eq!(normalize_word_splits("a"), "a");
        assert_eq!(normalize_word_splits("ab cd"), "ab cd");
        assert_eq!(normalize_word_splits("before a b c after"), "before abc after");
    }

    #[test]
    fn test_normalize_pipeline() {
        assert_eq!(normalize("The Great Gatsby"), "the great gatsby");
        assert_eq!(
            normalize("Les Misérables [microform] : roman"),
            "les miserables roman"
        );
        assert_eq!(normalize("  Hello,   World!! "), "hello world");
        assert_eq!(normalize("Twenty-one stories"), "twenty one stories");
        assert_eq!(normalize("History of the U. S. A."), "history of the usa");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("[only annotation]"), "");
    }

    #[test]
    fn test_normalize_name_keeps_initials() {
        assert_eq!(normalize_name("Adams, E. M."), "adams e m");
        assert_eq!(normalize("Adams, E. M."), "adams em");
    }

    #[test]
    fn test_normalize_lccn() {
        assert_eq!(normalize_lccn("n78-890351"), "n78890351");
        assert_eq!(normalize_lccn("n78890351"), "n78890351");
        assert_eq!(normalize_lccn("85-2"), "85000002");
        assert_eq!(normalize_lccn("75-425165//r75"), "75425165");
        assert_eq!(normalize_lccn(" 79-139101 /AC/MN"), "79139101");
        assert_eq!(normalize_lccn("2001-000002"), "2001000002");
        assert_eq!(normalize_lccn(""), "");
    }

    #[test]
    fn test_lccn_components() {
        assert_eq!(lccn_prefix("n78890351"), "n");
        assert_eq!(lccn_year("n78890351"), "78");
        assert_eq!(lccn_serial("n78890351"), "890351");
        assert_eq!(lccn_year("2001000002"), "2001");
        assert_eq!(lccn_serial("2001000002"), "000002");
        assert_eq!(lccn_prefix(""), "");
    }

    #[test]
    fn test_lccn_year_width_follows_length() {
        assert_eq!(lccn_year("19123456"), "19");
        assert_eq!(lccn_serial("19123456"), "123456");
        assert_eq!(lccn_year("20012345"), "20");
        assert_eq!(lccn_year("n2005123456"), "2005");
        assert_eq!(lccn_serial("n2005123456"), "123456");
        assert_eq!(lccn_year("n7"), "7");
        assert_eq!(lccn_year("abc"), "");
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("1925"), Some(1925));
        assert_eq!(extract_year("c1950."), Some(1950));
        assert_eq!(extract_year("[1899?]"), Some(1899));
        assert_eq!(extract_year("n.d."), None);
        assert_eq!(extract_year("1750"), None);
        assert_eq!(extract_year(""), None);
    }

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(s in "\\PC*") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn test_normalize_output_is_ascii_lowercase(s in "\\PC*") {
            let out = normalize(&s);
            prop_assert!(out.is_ascii());
            prop_assert!(!out.contains("  "));
            prop_assert_eq!(out.to_ascii_lowercase(), out.clone());
            prop_assert_eq!(out.trim(), out.as_str());
        }

        #[test]
        fn test_bracket_removal_is_idempotent(s in "[a-z \\[\\]]{0,40}") {
            let once = remove_bracketed_content(&s);
            prop_assert_eq!(remove_bracketed_content(&once), once);
        }

        #[test]
        fn test_word_split_repair_is_idempotent(s in "[a-z ]{0,40}") {
            let once = normalize_word_splits(&s);
            prop_assert_eq!(normalize_word_splits(&once), once);
        }
    }
}
