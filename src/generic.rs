//! Detection of boilerplate titles ("Poems", "Annual report") that need corroboration.

use ahash::{AHashMap, AHashSet};

use crate::config::MatchingConfig;
use crate::keys::significant_words;

/// Only titles shorter than this (normalized) are considered for frequency detection.
const FREQUENCY_MAX_TITLE_LEN: usize = 20;
const LINGUISTIC_MAX_WORDS: usize = 4;
const LINGUISTIC_STOPWORD_RATIO: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericReason {
    /// Every significant word is bibliographic boilerplate ("collected poems").
    Pattern,
    /// The exact short title recurs throughout the reference corpus.
    Frequency,
    /// A very short title made mostly of stopwords.
    Linguistic,
}

impl GenericReason {
    pub fn as_str(self) -> &'static str {
        match self {
            GenericReason::Pattern => "pattern",
            GenericReason::Frequency => "frequency",
            GenericReason::Linguistic => "linguistic",
        }
    }
}

/// Flags titles too generic to match on title evidence alone.
#[derive(Debug, Clone, Default)]
pub struct GenericTitleDetector {
    terms: AHashSet<String>,
    stopwords: AHashSet<String>,
    frequency_threshold: usize,
    title_counts: AHashMap<String, usize>,
}

impl GenericTitleDetector {
    pub fn new(config: &MatchingConfig) -> Self {
        GenericTitleDetector {
            terms: config.generic_title_terms.iter().cloned().collect(),
            stopwords: config.stopword_set(),
            frequency_threshold: config.generic_frequency_threshold,
            title_counts: AHashMap::new(),
        }
    }

    /// Count a normalized reference title towards frequency detection.
    pub fn add_title(&mut self, normalized: &str) {
        if normalized.is_empty() || normalized.len() >= FREQUENCY_MAX_TITLE_LEN {
            return;
        }
        *self.title_counts.entry(normalized.to_string()).or_insert(0) += 1;
    }

    pub fn tracked_titles(&self) -> usize {
        self.title_counts.len()
    }

    /// Why a normalized title is generic, or `None` if it is not.
    pub fn detect(&self, normalized: &str) -> Option<GenericReason> {
        let words: Vec<&str> = normalized.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }

        let significant = significant_words(normalized, &self.stopwords);
        if significant.iter().all(|w| self.terms.contains(*w)) {
            return Some(GenericReason::Pattern);
        }

        if self.frequency_threshold > 0
            && self
                .title_counts
                .get(normalized)
                .is_some_and(|count| *count >= self.frequency_threshold)
        {
            return Some(GenericReason::Frequency);
        }

        if words.len() <= LINGUISTIC_MAX_WORDS {
            let stopword_count = words.iter().filter(|w| self.stopwords.contains(**w)).count();
            if stopword_count as f64 / words.len() as f64 > LINGUISTIC_STOPWORD_RATIO {
                return Some(GenericReason::Linguistic);
            }
        }
        None
    }

    pub fn is_generic(&self, normalized: &str) -> bool {
        self.detect(normalized).is_some()
    }
}
