//! Field-level similarity scores in `[0, 100]`.
//!
//! Every function here expects normalized input (see [`crate::text`]) and is
//! symmetric in its two arguments.

use ahash::{AHashMap, AHashSet};
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::config::{MatchingConfig, ScoreCombination};
use crate::publisher::strip_corporate_suffixes;
use crate::text::{normalize, remove_stopwords};

/// Below this many words in the shorter title, stopwords are kept for comparison.
const SHORT_TITLE_WORDS: usize = 6;
/// Edit similarity a title pair with no shared word needs to score above zero.
const TITLE_EDIT_FLOOR: f64 = 70.0;
const TITLE_OVERLAP_WEIGHT: f64 = 0.7;
/// Floor for a title whose words are all contained in the other (2 words / 3 or more).
const CONTAINMENT_TWO_WORDS: f64 = 60.0;
const CONTAINMENT_MANY_WORDS: f64 = 75.0;
/// Score given to a name pair that differs only by initials ("j smith" / "john smith").
const INITIALS_MATCH_SCORE: f64 = 90.0;

/// Tokenize and sort tokens alphabetically
fn tokenize_and_sort(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

/// Jaro-Winkler over alphabetically sorted tokens, scaled to 0-100.
pub fn token_sort_ratio(s1: &str, s2: &str) -> f64 {
    if s1.trim().is_empty() || s2.trim().is_empty() {
        return 0.0;
    }
    let sorted1 = tokenize_and_sort(s1).join(" ");
    let sorted2 = tokenize_and_sort(s2).join(" ");
    jaro_winkler(&sorted1, &sorted2) * 100.0
}

/// Order a pair so that `f(a, b)` and `f(b, a)` evaluate identically.
fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Normalized Levenshtein similarity of the sorted token strings, 0-100.
fn sorted_edit_similarity(a: &[&str], b: &[&str]) -> f64 {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    normalized_levenshtein(&a.join(" "), &b.join(" ")) * 100.0
}

fn jaccard(a: &AHashSet<&str>, b: &AHashSet<&str>) -> (f64, usize) {
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    if union == 0 {
        return (0.0, 0);
    }
    (shared as f64 / union as f64 * 100.0, shared)
}

/// Equal-weight blend of word overlap and edit similarity.
fn token_blend(a: &[&str], b: &[&str]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: AHashSet<&str> = a.iter().copied().collect();
    let set_b: AHashSet<&str> = b.iter().copied().collect();
    let (overlap, _) = jaccard(&set_a, &set_b);
    0.5 * overlap + 0.5 * sorted_edit_similarity(a, b)
}

/// Check if a name part is an initial (e.g., "E." or "E")
fn is_initial(name: &str) -> bool {
    let cleaned = name.trim_end_matches('.');
    cleaned.len() == 1 && cleaned.chars().next().is_some_and(|c| c.is_alphabetic())
}

/// Get the lowercase initial letter from a name part
fn get_initial_letter(name: &str) -> Option<char> {
    name.trim_end_matches('.')
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
}

/// Given names and surname of a name in natural order (last token is the surname).
fn extract_name_parts<'a>(tokens: &[&'a str]) -> (Vec<&'a str>, &'a str) {
    match tokens.split_last() {
        Some((surname, given)) => (given.to_vec(), surname),
        None => (Vec::new(), ""),
    }
}

/// True when one name abbreviates the other's given names to initials:
/// "e m adams" vs "ernest m adams", "j smith" vs "john smith".
fn check_initials_match(tokens1: &[&str], tokens2: &[&str]) -> bool {
    let (given1, surname1) = extract_name_parts(tokens1);
    let (given2, surname2) = extract_name_parts(tokens2);

    if get_initial_letter(surname1) != get_initial_letter(surname2) {
        return false;
    }
    if token_sort_ratio(surname1, surname2) < 80.0 {
        return false;
    }

    let initials_count1 = given1.iter().filter(|g| is_initial(g)).count();
    let initials_count2 = given2.iter().filter(|g| is_initial(g)).count();

    // Same number of initials means neither side is the abbreviated form
    if initials_count1 == initials_count2 {
        return false;
    }

    let (initial_given, full_given) = if initials_count1 > initials_count2 {
        (&given1, &given2)
    } else {
        (&given2, &given1)
    };

    let matches = initial_given
        .iter()
        .zip(full_given.iter())
        .filter(|(short, full)| get_initial_letter(short) == get_initial_letter(full))
        .count();

    // At least one agreeing initial, at most one disagreement
    let min_names = initial_given.len().min(full_given.len());
    matches > 0 && matches >= min_names.saturating_sub(1)
}

/// Which optional fields both sides of a comparison actually carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPresence {
    pub author: bool,
    pub publisher: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldScores {
    pub title: f64,
    pub author: f64,
    pub publisher: f64,
}

impl FieldScores {
    /// Combine into a single score.
    ///
    /// `Mean` is the arithmetic mean of all three fields. `Weighted` moves the weight of
    /// a field missing on either side onto the others: author weight goes 70/30 to
    /// title/publisher, publisher weight 60/40 to title/author.
    pub fn combine(&self, combination: ScoreCombination, presence: FieldPresence) -> f64 {
        match combination {
            ScoreCombination::Mean => (self.title + self.author + self.publisher) / 3.0,
            ScoreCombination::Weighted {
                title,
                author,
                publisher,
            } => {
                let (tw, aw, pw) = match (presence.author, presence.publisher) {
                    (true, true) => (title, author, publisher),
                    (false, true) => (title + author * 0.7, 0.0, publisher + author * 0.3),
                    (true, false) => (title + publisher * 0.6, author + publisher * 0.4, 0.0),
                    (false, false) => (1.0, 0.0, 0.0),
                };
                let total = tw + aw + pw;
                if total <= 0.0 {
                    return 0.0;
                }
                (self.title * tw + self.author * aw + self.publisher * pw) / total
            }
        }
    }
}

/// Absolute year difference when both years are known, saturating at `i32::MAX`.
pub fn year_difference(a: Option<i32>, b: Option<i32>) -> Option<i32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(i32::try_from(a.abs_diff(b)).unwrap_or(i32::MAX)),
        _ => None,
    }
}

/// Similarity calculator holding the word lists it needs.
#[derive(Debug, Clone, Default)]
pub struct SimilarityCalculator {
    stopwords: AHashSet<String>,
    author_stopwords: AHashSet<String>,
    publisher_stopwords: AHashSet<String>,
    abbreviations: AHashMap<String, String>,
}

impl SimilarityCalculator {
    pub fn from_config(config: &MatchingConfig) -> Self {
        SimilarityCalculator {
            stopwords: config.stopword_set(),
            author_stopwords: config.author_stopwords.iter().cloned().collect(),
            publisher_stopwords: config.publisher_stopwords.iter().cloned().collect(),
            abbreviations: config
                .abbreviations
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn expand<'a>(&'a self, word: &'a str) -> &'a str {
        self.abbreviations
            .get(word)
            .map(String::as_str)
            .unwrap_or(word)
    }

    /// Title words used for comparison. Short titles keep stopwords; one-letter
    /// words are dropped unless nothing else is left.
    fn title_words<'a>(&'a self, title: &'a str, keep_stopwords: bool) -> Vec<&'a str> {
        let expanded: Vec<&str> = title.split_whitespace().map(|w| self.expand(w)).collect();
        let filtered: Vec<&str> = expanded
            .iter()
            .copied()
            .filter(|w| w.len() >= 2 && (keep_stopwords || !self.stopwords.contains(*w)))
            .collect();
        if filtered.is_empty() {
            expanded
        } else {
            filtered
        }
    }

    /// Word-overlap score (Jaccard with a containment floor) blended with
    /// edit similarity of the sorted words.
    ///
    /// 100 for identical titles; 0 when no word is shared and the edit similarity
    /// is below the floor.
    pub fn title_similarity(&self, a: &str, b: &str) -> f64 {
        let (a, b) = canonical_pair(a, b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 100.0;
        }

        let shorter_len = a
            .split_whitespace()
            .count()
            .min(b.split_whitespace().count());
        let keep_stopwords = shorter_len <= SHORT_TITLE_WORDS;
        let words_a = self.title_words(a, keep_stopwords);
        let words_b = self.title_words(b, keep_stopwords);
        let set_a: AHashSet<&str> = words_a.iter().copied().collect();
        let set_b: AHashSet<&str> = words_b.iter().copied().collect();

        let (mut overlap, shared) = jaccard(&set_a, &set_b);
        let (small, large) = if set_a.len() <= set_b.len() {
            (&set_a, &set_b)
        } else {
            (&set_b, &set_a)
        };
        if small.len() >= 2 && small.is_subset(large) {
            let floor = if small.len() >= 3 {
                CONTAINMENT_MANY_WORDS
            } else {
                CONTAINMENT_TWO_WORDS
            };
            overlap = overlap.max(floor);
        }

        let edit = sorted_edit_similarity(&words_a, &words_b);
        if shared == 0 && edit < TITLE_EDIT_FLOOR {
            return 0.0;
        }
        (TITLE_OVERLAP_WEIGHT * overlap + (1.0 - TITLE_OVERLAP_WEIGHT) * edit).clamp(0.0, 100.0)
    }

    /// Name similarity after dropping role words ("edited", "by"). Initials that agree with
    /// the other side's given names lift the score to a near match.
    pub fn author_similarity(&self, a: &str, b: &str) -> f64 {
        let (a, b) = canonical_pair(a, b);
        let tokens_a = remove_stopwords(a, &self.author_stopwords);
        let tokens_b = remove_stopwords(b, &self.author_stopwords);
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return 0.0;
        }
        if tokens_a == tokens_b {
            return 100.0;
        }
        let blended = token_blend(&tokens_a, &tokens_b);
        if check_initials_match(&tokens_a, &tokens_b) {
            return blended.max(INITIALS_MATCH_SCORE);
        }
        blended
    }

    fn publisher_tokens<'a>(&self, stripped: &'a str) -> Vec<&'a str> {
        let tokens = remove_stopwords(stripped, &self.publisher_stopwords);
        if tokens.is_empty() {
            stripped.split_whitespace().collect()
        } else {
            tokens
        }
    }

    /// Publisher similarity with corporate designators and publishing stopwords removed.
    pub fn publisher_similarity(&self, a: &str, b: &str) -> f64 {
        let (a, b) = canonical_pair(a, b);
        let a = strip_corporate_suffixes(a);
        let b = strip_corporate_suffixes(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 100.0;
        }
        token_blend(&self.publisher_tokens(&a), &self.publisher_tokens(&b))
    }

    /// Best publisher similarity between `publisher` and any run of words in
    /// unstructured text of the same length.
    pub fn publisher_in_text_similarity(&self, publisher: &str, full_text: &str) -> f64 {
        let publisher = strip_corporate_suffixes(publisher);
        let text = normalize(full_text);
        let target: Vec<&str> = publisher.split_whitespace().collect();
        let words: Vec<&str> = text.split_whitespace().collect();
        if target.is_empty() || words.is_empty() {
            return 0.0;
        }
        let width = target.len().min(words.len());
        let target_joined = target.join(" ");
        words
            .windows(width)
            .map(|window| normalized_levenshtein(&target_joined, &window.join(" ")) * 100.0)
            .fold(0.0, f64::max)
    }
}
