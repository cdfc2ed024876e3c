//! Matching options with their defaults, loaded from JSON and validated up front.

use std::collections::BTreeMap;
use std::path::Path;

use ahash::AHashSet;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::publication::ReferenceType;

/// Published works are protected for 95 years after the end of the publication year.
const COPYRIGHT_TERM_YEARS: i32 = 96;

const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "into", "of", "on", "or", "the",
    "to", "with", "le", "la", "les", "der", "die", "das",
];

const DEFAULT_GENERIC_TITLE_TERMS: &[&str] = &[
    "works", "poems", "letters", "essays", "stories", "writings", "papers", "selections",
    "collected", "complete", "selected", "poetical", "dramatic", "prose", "verse", "plays",
    "novels", "tales", "sermons", "speeches", "addresses", "lectures", "report", "reports",
    "proceedings", "transactions", "bulletin", "journal", "annual", "catalog", "catalogue",
    "anthology", "collection", "miscellany", "volume", "edition",
];

const DEFAULT_AUTHOR_STOPWORDS: &[&str] = &[
    "by", "edited", "editor", "editors", "ed", "eds", "compiled", "compiler", "translated",
    "translator", "trans", "illustrated", "introduction", "foreword", "preface", "with", "and",
];

const DEFAULT_PUBLISHER_STOPWORDS: &[&str] = &[
    "publisher", "publishers", "publishing", "published", "press", "books", "company", "inc",
    "incorporated", "ltd", "limited", "co", "corp", "corporation", "llc", "sons", "and", "the",
];

const DEFAULT_ABBREVIATIONS: &[(&str, &str)] = &[
    ("vol", "volume"),
    ("ed", "edition"),
    ("rev", "revised"),
    ("pt", "part"),
    ("no", "number"),
    ("bk", "book"),
    ("intro", "introduction"),
    ("supp", "supplement"),
];

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

/// How title, author and publisher scores combine into the combined score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreCombination {
    #[default]
    Mean,
    Weighted { title: f64, author: f64, publisher: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldThresholds {
    pub title: f64,
    pub author: f64,
    pub publisher: f64,
}

impl Default for FieldThresholds {
    fn default() -> Self {
        Self {
            title: 40.0,
            author: 30.0,
            publisher: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinCombinedScore {
    pub registration: f64,
    pub renewal: f64,
}

impl Default for MinCombinedScore {
    fn default() -> Self {
        Self {
            registration: 40.0,
            renewal: 40.0,
        }
    }
}

impl MinCombinedScore {
    pub fn for_type(&self, reference_type: ReferenceType) -> f64 {
        match reference_type {
            ReferenceType::Registration => self.registration,
            ReferenceType::Renewal => self.renewal,
        }
    }
}

/// Year bounds used to derive a copyright status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusPolicy {
    /// Works published before this year are past their maximum term.
    pub copyright_expiration_year: i32,
    /// Last year covered by the registration and renewal datasets.
    pub max_data_year: i32,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            copyright_expiration_year: chrono::Utc::now().year() - COPYRIGHT_TERM_YEARS,
            max_data_year: 1991,
        }
    }
}

/// Every recognized matching option with its default.
///
/// Unknown keys are rejected when deserializing. Call [`MatchingConfig::validate`]
/// (the engine does) before processing any record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub year_tolerance: i32,
    pub early_exit_title_threshold: f64,
    pub early_exit_author_threshold: f64,
    pub min_combined_score: MinCombinedScore,
    pub field_thresholds: FieldThresholds,
    pub score_combination: ScoreCombination,
    pub generic_title_penalty: f64,
    pub generic_corroboration_score: f64,
    /// Occurrences of a short title in the reference corpus before it counts as generic. 0 disables.
    pub generic_frequency_threshold: usize,
    pub phonetic_keys: bool,
    pub full_scan_fallback: bool,
    pub stopwords: Vec<String>,
    pub generic_title_terms: Vec<String>,
    pub author_stopwords: Vec<String>,
    pub publisher_stopwords: Vec<String>,
    pub abbreviations: BTreeMap<String, String>,
    pub status: StatusPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            year_tolerance: 10,
            early_exit_title_threshold: 95.0,
            early_exit_author_threshold: 90.0,
            min_combined_score: MinCombinedScore::default(),
            field_thresholds: FieldThresholds::default(),
            score_combination: ScoreCombination::default(),
            generic_title_penalty: 0.8,
            generic_corroboration_score: 60.0,
            generic_frequency_threshold: 10,
            phonetic_keys: false,
            full_scan_fallback: true,
            stopwords: owned(DEFAULT_STOPWORDS),
            generic_title_terms: owned(DEFAULT_GENERIC_TITLE_TERMS),
            author_stopwords: owned(DEFAULT_AUTHOR_STOPWORDS),
            publisher_stopwords: owned(DEFAULT_PUBLISHER_STOPWORDS),
            abbreviations: DEFAULT_ABBREVIATIONS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            status: StatusPolicy::default(),
        }
    }
}

fn check_score(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be a non-negative number, got {value}"),
        });
    }
    Ok(())
}

fn check_percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_score(field, value)?;
    if value > 100.0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be within [0, 100], got {value}"),
        });
    }
    Ok(())
}

impl MatchingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Thresholds that never trigger early exit, for tooling that needs true best scores.
    pub fn without_early_exit(mut self) -> Self {
        self.early_exit_title_threshold = 101.0;
        self.early_exit_author_threshold = 101.0;
        self
    }

    pub fn with_year_tolerance(mut self, tolerance: i32) -> Self {
        self.year_tolerance = tolerance;
        self
    }

    pub fn with_score_combination(mut self, combination: ScoreCombination) -> Self {
        self.score_combination = combination;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.year_tolerance < 0 {
            return Err(ConfigError::InvalidValue {
                field: "year_tolerance",
                reason: format!("must be >= 0, got {}", self.year_tolerance),
            });
        }
        // Early exit thresholds above 100 are how a full scan is forced.
        check_score("early_exit_title_threshold", self.early_exit_title_threshold)?;
        check_score("early_exit_author_threshold", self.early_exit_author_threshold)?;
        check_percent(
            "min_combined_score.registration",
            self.min_combined_score.registration,
        )?;
        check_percent("min_combined_score.renewal", self.min_combined_score.renewal)?;
        check_percent("field_thresholds.title", self.field_thresholds.title)?;
        check_percent("field_thresholds.author", self.field_thresholds.author)?;
        check_percent("field_thresholds.publisher", self.field_thresholds.publisher)?;
        check_percent(
            "generic_corroboration_score",
            self.generic_corroboration_score,
        )?;

        if !(self.generic_title_penalty > 0.0 && self.generic_title_penalty <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "generic_title_penalty",
                reason: format!("must be within (0, 1], got {}", self.generic_title_penalty),
            });
        }

        if let ScoreCombination::Weighted {
            title,
            author,
            publisher,
        } = self.score_combination
        {
            check_score("score_combination.title", title)?;
            check_score("score_combination.author", author)?;
            check_score("score_combination.publisher", publisher)?;
            if title + author + publisher <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "score_combination",
                    reason: "weights must not all be zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn stopword_set(&self) -> AHashSet<String> {
        self.stopwords.iter().cloned().collect()
    }
}
