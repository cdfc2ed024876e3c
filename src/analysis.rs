//! Score distributions over ground-truth pairs, used to calibrate matching thresholds.

use std::collections::BTreeMap;
use std::fmt;
use std::slice;

use rayon::prelude::*;
use tracing::{info, info_span};

use crate::config::MatchingConfig;
use crate::error::ConfigError;
use crate::ground_truth::GroundTruthPair;
use crate::matcher::{MatchOptions, Matcher};
use crate::publication::{MatchResult, ReferenceType};

/// Percentile of an ascending slice by linear interpolation between order
/// statistics (R-7). Empty input gives 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let k = last as f64 * p.clamp(0.0, 100.0) / 100.0;
    let f = k.floor() as usize;
    if f >= last {
        return sorted[last];
    }
    let c = k - f as f64;
    sorted[f] * (1.0 - c) + sorted[f + 1] * c
}

/// Summary statistics of one field's scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreDistribution {
    pub field: &'static str,
    scores: Vec<f64>,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for fewer than two scores.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
}

impl ScoreDistribution {
    /// NaN scores are dropped.
    pub fn from_scores(field: &'static str, scores: impl IntoIterator<Item = f64>) -> Self {
        let mut scores: Vec<f64> = scores.into_iter().filter(|s| !s.is_nan()).collect();
        if scores.is_empty() {
            return ScoreDistribution {
                field,
                ..ScoreDistribution::default()
            };
        }
        scores.sort_by(f64::total_cmp);

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std_dev = if scores.len() < 2 {
            0.0
        } else {
            let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };

        ScoreDistribution {
            field,
            mean,
            median: percentile(&scores, 50.0),
            std_dev,
            min: scores[0],
            max: scores[scores.len() - 1],
            percentile_5: percentile(&scores, 5.0),
            percentile_25: percentile(&scores, 25.0),
            percentile_75: percentile(&scores, 75.0),
            percentile_95: percentile(&scores, 95.0),
            scores,
        }
    }

    pub fn count(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Scores in ascending order.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn percentile(&self, p: f64) -> f64 {
        percentile(&self.scores, p)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruthAnalysis {
    pub total_pairs: usize,
    pub registration_pairs: usize,
    pub renewal_pairs: usize,
    /// Pairs with no score, because their years are further apart than the tolerance.
    pub unscored_pairs: usize,
    pub title: ScoreDistribution,
    pub author: ScoreDistribution,
    pub publisher: ScoreDistribution,
    pub combined: ScoreDistribution,
}

impl GroundTruthAnalysis {
    pub fn distributions(&self) -> [&ScoreDistribution; 4] {
        [&self.title, &self.author, &self.publisher, &self.combined]
    }
}

/// Text-only scoring of LCCN-verified pairs.
#[derive(Debug, Clone)]
pub struct ScoreAnalyzer {
    matcher: Matcher,
}

impl ScoreAnalyzer {
    /// Early exit is switched off so every pair gets its true best score.
    pub fn new(config: MatchingConfig) -> Result<Self, ConfigError> {
        Ok(ScoreAnalyzer {
            matcher: Matcher::new(config.without_early_exit())?,
        })
    }

    /// Scores of one pair as the matcher sees them without the LCCN shortcut.
    pub fn score(&self, pair: &GroundTruthPair) -> Option<MatchResult> {
        self.matcher.find_match(
            pair.marc_record(),
            slice::from_ref(pair.copyright_record()),
            pair.match_type(),
            MatchOptions::TEXT_ONLY,
        )
    }

    pub fn analyze(&self, pairs: &[GroundTruthPair]) -> GroundTruthAnalysis {
        let _span = info_span!("score_analysis", pairs = pairs.len()).entered();

        let results: Vec<Option<MatchResult>> = pairs.par_iter().map(|p| self.score(p)).collect();
        let scored: Vec<&MatchResult> = results.iter().flatten().collect();

        let registration_pairs = pairs
            .iter()
            .filter(|p| p.match_type() == ReferenceType::Registration)
            .count();

        let analysis = GroundTruthAnalysis {
            total_pairs: pairs.len(),
            registration_pairs,
            renewal_pairs: pairs.len() - registration_pairs,
            unscored_pairs: pairs.len() - scored.len(),
            title: ScoreDistribution::from_scores("title", scored.iter().map(|r| r.title_score)),
            author: ScoreDistribution::from_scores("author", scored.iter().map(|r| r.author_score)),
            publisher: ScoreDistribution::from_scores(
                "publisher",
                scored.iter().map(|r| r.publisher_score),
            ),
            combined: ScoreDistribution::from_scores(
                "combined",
                scored.iter().map(|r| r.similarity_score),
            ),
        };

        info!(
            registration_pairs = analysis.registration_pairs,
            renewal_pairs = analysis.renewal_pairs,
            unscored_pairs = analysis.unscored_pairs,
            title_min = analysis.title.min,
            title_max = analysis.title.max,
            combined_median = analysis.combined.median,
            "score analysis complete"
        );
        analysis
    }
}

/// The given percentile of each non-empty field distribution, a lower bound below
/// which true matches are rare.
pub fn recommended_thresholds(
    analysis: &GroundTruthAnalysis,
    percentile: f64,
) -> BTreeMap<&'static str, f64> {
    analysis
        .distributions()
        .into_iter()
        .filter(|d| !d.is_empty())
        .map(|d| (d.field, d.percentile(percentile)))
        .collect()
}

impl fmt::Display for ScoreDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = format!("{} Similarity Scores:", self.field.to_uppercase());
        writeln!(f, "{heading}")?;
        writeln!(f, "{}", "-".repeat(heading.len()))?;
        if self.is_empty() {
            return writeln!(f, "  No scores available");
        }
        writeln!(f, "  Count: {}", self.count())?;
        writeln!(f, "  Mean: {:.1}", self.mean)?;
        writeln!(f, "  Median: {:.1}", self.median)?;
        writeln!(f, "  Std Dev: {:.1}", self.std_dev)?;
        writeln!(f, "  Min: {:.1}", self.min)?;
        writeln!(f, "  Max: {:.1}", self.max)?;
        writeln!(f, "  5th percentile: {:.1}", self.percentile_5)?;
        writeln!(f, "  25th percentile: {:.1}", self.percentile_25)?;
        writeln!(f, "  75th percentile: {:.1}", self.percentile_75)?;
        writeln!(f, "  95th percentile: {:.1}", self.percentile_95)
    }
}

impl fmt::Display for GroundTruthAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LCCN Ground Truth Similarity Score Analysis")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Total ground truth pairs analyzed: {}", self.total_pairs)?;
        writeln!(f, "  Registration pairs: {}", self.registration_pairs)?;
        writeln!(f, "  Renewal pairs: {}", self.renewal_pairs)?;
        if self.unscored_pairs > 0 {
            writeln!(f, "  Unscored (outside year tolerance): {}", self.unscored_pairs)?;
        }
        for dist in self.distributions() {
            writeln!(f)?;
            write!(f, "{dist}")?;
        }
        Ok(())
    }
}

pub fn report(analysis: &GroundTruthAnalysis) -> String {
    analysis.to_string()
}
