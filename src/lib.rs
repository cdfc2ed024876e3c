//! Copyright status matching of library catalog records against registration
//! and renewal datasets.
//!
//! Records are normalized once ([`Publication`]), reference corpora are indexed
//! ([`ReferenceIndex`]) and each catalog record is matched in parallel
//! ([`MatchingEngine`]). LCCN-verified pairs ([`GroundTruthExtractor`]) feed the
//! [`ScoreAnalyzer`], whose distributions calibrate the matching thresholds.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod generic;
pub mod ground_truth;
pub mod index;
pub mod keys;
pub mod matcher;
pub mod publication;
pub mod publisher;
pub mod similarity;
pub mod text;

#[cfg(feature = "python")]
mod python;

pub use analysis::{recommended_thresholds, report, GroundTruthAnalysis, ScoreAnalyzer, ScoreDistribution};
pub use batch::{BatchStore, JsonLinesBatchStore, MemoryBatchStore};
pub use config::{MatchingConfig, ScoreCombination, StatusPolicy};
pub use engine::{BatchStats, CancellationToken, MatchingEngine, RunSummary};
pub use error::{BatchStoreError, ConfigError, MatchError, Result, ValidationError};
pub use generic::{GenericReason, GenericTitleDetector};
pub use ground_truth::{
    coverage, coverage_report, filter_by_year_range, GroundTruthExtractor, GroundTruthPair,
    GroundTruthStats,
};
pub use index::{IndexStats, ReferenceIndex};
pub use matcher::{MatchMode, MatchOptions, Matcher};
pub use publication::{
    filter_by_year, CopyrightStatus, CopyrightStatusRule, CountryClassification, MatchResult,
    MatchType, Publication, ReferenceType, Source, StatusCounts,
};
pub use similarity::SimilarityCalculator;
pub use text::{normalize, normalize_lccn};
