//! Best-match selection for one catalog record against a list of candidates.

use std::cmp::Ordering;

use crate::config::MatchingConfig;
use crate::error::ConfigError;
use crate::generic::GenericTitleDetector;
use crate::publication::{MatchResult, MatchType, Publication, ReferenceType};
use crate::publisher::extract_best_publisher_match;
use crate::similarity::{year_difference, FieldPresence, FieldScores, SimilarityCalculator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Field thresholds and the minimum combined score must be met.
    Thresholds,
    /// Diagnostic mode: return the top-scoring candidate whatever its scores.
    IgnoreThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub mode: MatchMode,
    /// Accept a candidate with an equal normalized LCCN without fuzzy scoring.
    pub lccn_fast_path: bool,
}

impl MatchOptions {
    pub const STANDARD: MatchOptions = MatchOptions {
        mode: MatchMode::Thresholds,
        lccn_fast_path: true,
    };

    pub const DIAGNOSTIC: MatchOptions = MatchOptions {
        mode: MatchMode::IgnoreThresholds,
        lccn_fast_path: true,
    };

    /// Ignore thresholds and skip the LCCN shortcut, so scores reflect text similarity only.
    pub const TEXT_ONLY: MatchOptions = MatchOptions {
        mode: MatchMode::IgnoreThresholds,
        lccn_fast_path: false,
    };
}

/// One candidate after scoring.
#[derive(Debug, Clone)]
struct Scored<'c> {
    candidate: &'c Publication,
    scores: FieldScores,
    combined: f64,
    year_difference: Option<i32>,
    generic: bool,
}

impl Scored<'_> {
    /// Higher combined score first, then smaller known year gap, then lower source id.
    fn ranks_above(&self, other: &Scored<'_>) -> bool {
        let by_score = self.combined.total_cmp(&other.combined);
        if by_score != Ordering::Equal {
            return by_score == Ordering::Greater;
        }
        let by_year = match (self.year_difference, other.year_difference) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if by_year != Ordering::Equal {
            return by_year == Ordering::Greater;
        }
        self.candidate.source_id() < other.candidate.source_id()
    }
}

/// Outcome of scanning one candidate list.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub result: Option<MatchResult>,
    /// Candidates that were fully scored.
    pub comparisons: usize,
    pub early_exit: bool,
}

/// Scores candidates for one catalog record and picks the best.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatchingConfig,
    similarity: SimilarityCalculator,
    patterns: GenericTitleDetector,
}

impl Matcher {
    pub fn new(config: MatchingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Matcher {
            similarity: SimilarityCalculator::from_config(&config),
            patterns: GenericTitleDetector::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn similarity(&self) -> &SimilarityCalculator {
        &self.similarity
    }

    /// Best accepted match among `candidates`, or `None`.
    pub fn find_best_match(
        &self,
        record: &Publication,
        candidates: &[Publication],
        reference_type: ReferenceType,
    ) -> Option<MatchResult> {
        self.find_match(record, candidates, reference_type, MatchOptions::STANDARD)
    }

    /// Top-scoring candidate with its scores, with no acceptance gate.
    pub fn find_best_match_ignore_thresholds(
        &self,
        record: &Publication,
        candidates: &[Publication],
        reference_type: ReferenceType,
    ) -> Option<MatchResult> {
        self.find_match(record, candidates, reference_type, MatchOptions::DIAGNOSTIC)
    }

    pub fn find_match(
        &self,
        record: &Publication,
        candidates: &[Publication],
        reference_type: ReferenceType,
        options: MatchOptions,
    ) -> Option<MatchResult> {
        if options.lccn_fast_path {
            if let Some(lccn) = record.normalized_lccn() {
                if let Some(hit) = candidates
                    .iter()
                    .find(|c| c.normalized_lccn() == Some(lccn))
                {
                    return Some(self.lccn_match(record, hit, reference_type));
                }
            }
        }
        self.select(record, candidates, reference_type, None, options.mode)
            .result
    }

    /// Result for an LCCN-equal pair. All scores are 100.
    pub fn lccn_match(
        &self,
        record: &Publication,
        candidate: &Publication,
        reference_type: ReferenceType,
    ) -> MatchResult {
        let scored = Scored {
            candidate,
            scores: FieldScores {
                title: 100.0,
                author: 100.0,
                publisher: 100.0,
            },
            combined: 100.0,
            year_difference: year_difference(record.year(), candidate.year()),
            generic: false,
        };
        self.build_result(record, &scored, reference_type, MatchType::Lccn)
    }

    /// Title, author and publisher scores of a pair, unaffected by thresholds.
    pub fn field_scores(
        &self,
        record: &Publication,
        candidate: &Publication,
        reference_type: ReferenceType,
    ) -> (FieldScores, FieldPresence) {
        let sim = &self.similarity;
        let title = sim.title_similarity(record.normalized_title(), candidate.normalized_title());

        let mut author = 0.0_f64;
        let mut has_author = false;
        for ours in [record.normalized_author(), record.normalized_main_author()] {
            for theirs in [candidate.normalized_author(), candidate.normalized_main_author()] {
                if ours.is_empty() || theirs.is_empty() {
                    continue;
                }
                has_author = true;
                author = author.max(sim.author_similarity(ours, theirs));
            }
        }

        let ours = record.normalized_publisher();
        let theirs = candidate.normalized_publisher();
        let (publisher, has_publisher) = if ours.is_empty() {
            (0.0, false)
        } else if !theirs.is_empty() {
            (sim.publisher_similarity(ours, theirs), true)
        } else if reference_type == ReferenceType::Renewal && !candidate.full_text().is_empty() {
            (sim.publisher_in_text_similarity(ours, candidate.full_text()), true)
        } else {
            (0.0, false)
        };

        (
            FieldScores {
                title,
                author,
                publisher,
            },
            FieldPresence {
                author: has_author,
                publisher: has_publisher,
            },
        )
    }

    fn score<'c>(
        &self,
        record: &Publication,
        candidate: &'c Publication,
        reference_type: ReferenceType,
        generic: bool,
    ) -> (Scored<'c>, FieldPresence) {
        let (scores, presence) = self.field_scores(record, candidate, reference_type);
        let mut combined = scores.combine(self.config.score_combination, presence);
        if generic {
            combined *= self.config.generic_title_penalty;
        }
        let scored = Scored {
            candidate,
            scores,
            combined,
            year_difference: year_difference(record.year(), candidate.year()),
            generic,
        };
        (scored, presence)
    }

    /// Similarity result for one pair regardless of year or thresholds.
    pub fn score_pair(
        &self,
        record: &Publication,
        candidate: &Publication,
        reference_type: ReferenceType,
    ) -> MatchResult {
        let generic = self.patterns.is_generic(record.normalized_title())
            || self.patterns.is_generic(candidate.normalized_title());
        let (scored, _) = self.score(record, candidate, reference_type, generic);
        self.build_result(record, &scored, reference_type, MatchType::Similarity)
    }

    fn meets_field_thresholds(
        &self,
        record: &Publication,
        candidate: &Publication,
        scored: &Scored<'_>,
        presence: FieldPresence,
    ) -> bool {
        let limits = &self.config.field_thresholds;
        let scores = &scored.scores;
        if scores.title < limits.title {
            return false;
        }
        if presence.author && scores.author < limits.author {
            return false;
        }
        // Gated only when both sides carry an explicit publisher
        if !record.normalized_publisher().is_empty()
            && !candidate.normalized_publisher().is_empty()
            && scores.publisher < limits.publisher
        {
            return false;
        }
        if scored.generic {
            let corroboration = self.config.generic_corroboration_score;
            return scores.author >= corroboration || scores.publisher >= corroboration;
        }
        true
    }

    /// Score `candidates` in order and pick the best under `mode`.
    ///
    /// Candidates outside the year tolerance are skipped. A candidate meeting both
    /// early-exit thresholds (and, in threshold mode, the field thresholds) ends the scan
    /// and is accepted, provided it outranks everything scored before it.
    pub fn select<'c, I>(
        &self,
        record: &Publication,
        candidates: I,
        reference_type: ReferenceType,
        detector: Option<&GenericTitleDetector>,
        mode: MatchMode,
    ) -> Selection
    where
        I: IntoIterator<Item = &'c Publication>,
    {
        let detector = detector.unwrap_or(&self.patterns);
        let record_generic = detector.is_generic(record.normalized_title());
        let config = &self.config;

        let mut best: Option<Scored<'c>> = None;
        let mut comparisons = 0;
        let mut early_exit = false;

        for candidate in candidates {
            let year_gap = year_difference(record.year(), candidate.year());
            if year_gap.is_some_and(|gap| gap > config.year_tolerance) {
                continue;
            }

            comparisons += 1;
            let generic = record_generic || detector.is_generic(candidate.normalized_title());
            let (scored, presence) = self.score(record, candidate, reference_type, generic);
            let scores = scored.scores;

            if mode == MatchMode::Thresholds
                && !self.meets_field_thresholds(record, candidate, &scored, presence)
            {
                continue;
            }

            let near_certain = presence.author
                && scores.title >= config.early_exit_title_threshold
                && scores.author >= config.early_exit_author_threshold;

            if best.as_ref().is_none_or(|b| scored.ranks_above(b)) {
                best = Some(scored);
                // Only a near-certain candidate that is also the new best ends the scan.
                if near_certain {
                    early_exit = true;
                    break;
                }
            }
        }

        let min_combined = config.min_combined_score.for_type(reference_type);
        let result = best
            .filter(|b| mode == MatchMode::IgnoreThresholds || b.combined >= min_combined)
            .map(|b| self.build_result(record, &b, reference_type, MatchType::Similarity));

        Selection {
            result,
            comparisons,
            early_exit,
        }
    }

    fn build_result(
        &self,
        record: &Publication,
        scored: &Scored<'_>,
        reference_type: ReferenceType,
        match_type: MatchType,
    ) -> MatchResult {
        let candidate = scored.candidate;
        let matched_publisher = if !candidate.publisher().is_empty() {
            Some(candidate.publisher().to_string())
        } else if reference_type == ReferenceType::Renewal && !candidate.full_text().is_empty() {
            extract_best_publisher_match(record.publisher(), candidate.full_text())
        } else {
            None
        };

        MatchResult {
            source_id: candidate.source_id().to_string(),
            source_type: reference_type,
            matched_title: candidate.title().to_string(),
            matched_author: candidate.author().to_string(),
            matched_publisher,
            title_score: scored.scores.title,
            author_score: scored.scores.author,
            publisher_score: scored.scores.publisher,
            similarity_score: scored.combined,
            year_difference: scored.year_difference,
            match_type,
            normalized_title: candidate.normalized_title().to_string(),
            normalized_author: candidate.normalized_author().to_string(),
            generic_title: scored.generic,
        }
    }
}
