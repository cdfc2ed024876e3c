//! Python bindings, built with the `python` feature.

use std::collections::HashMap;

use ahash::AHashSet;
use once_cell::sync::Lazy;
use pyo3::prelude::*;

use crate::analysis::ScoreDistribution;
use crate::config::MatchingConfig;
use crate::keys::canonical_name;
use crate::similarity::SimilarityCalculator;
use crate::text::{lccn_prefix, lccn_serial, lccn_year};

static DEFAULT_CONFIG: Lazy<MatchingConfig> = Lazy::new(MatchingConfig::default);
static DEFAULT_CALCULATOR: Lazy<SimilarityCalculator> =
    Lazy::new(|| SimilarityCalculator::from_config(&DEFAULT_CONFIG));

fn sorted(keys: AHashSet<String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.into_iter().collect();
    keys.sort_unstable();
    keys
}

/// Canonical form of a title or other free text.
#[pyfunction]
fn normalize(text: &str) -> String {
    crate::text::normalize(text)
}

#[pyfunction]
fn normalize_lccn(lccn: &str) -> String {
    crate::text::normalize_lccn(lccn)
}

/// Prefix, year and serial of an LCCN, normalizing it first.
#[pyfunction]
fn lccn_parts(lccn: &str) -> (String, String, String) {
    let normalized = crate::text::normalize_lccn(lccn);
    (
        lccn_prefix(&normalized).to_string(),
        lccn_year(&normalized).to_string(),
        lccn_serial(&normalized).to_string(),
    )
}

/// Index keys of a title, sorted. Uses the default stopwords unless given.
#[pyfunction]
#[pyo3(signature = (title, stopwords=None, phonetic=false))]
fn generate_title_keys(title: &str, stopwords: Option<Vec<String>>, phonetic: bool) -> Vec<String> {
    let stopwords: AHashSet<String> = stopwords
        .unwrap_or_else(|| DEFAULT_CONFIG.stopwords.clone())
        .into_iter()
        .collect();
    sorted(crate::keys::generate_title_keys(title, &stopwords, phonetic))
}

#[pyfunction]
fn generate_author_keys(author: &str) -> Vec<String> {
    sorted(crate::keys::generate_author_keys(author))
}

#[pyfunction]
fn title_similarity(a: &str, b: &str) -> f64 {
    DEFAULT_CALCULATOR.title_similarity(&crate::text::normalize(a), &crate::text::normalize(b))
}

#[pyfunction]
fn author_similarity(a: &str, b: &str) -> f64 {
    DEFAULT_CALCULATOR.author_similarity(&canonical_name(a), &canonical_name(b))
}

#[pyfunction]
fn publisher_similarity(a: &str, b: &str) -> f64 {
    DEFAULT_CALCULATOR.publisher_similarity(&crate::text::normalize(a), &crate::text::normalize(b))
}

/// Jaro-Winkler similarity on sorted tokens (0-100)
#[pyfunction]
fn token_sort_ratio(s1: &str, s2: &str) -> f64 {
    crate::similarity::token_sort_ratio(s1, s2)
}

/// Mean, median, standard deviation, min, max and percentiles of a score list.
#[pyfunction]
fn score_distribution(scores: Vec<f64>) -> HashMap<&'static str, f64> {
    let dist = ScoreDistribution::from_scores("scores", scores);
    HashMap::from([
        ("count", dist.count() as f64),
        ("mean", dist.mean),
        ("median", dist.median),
        ("std_dev", dist.std_dev),
        ("min", dist.min),
        ("max", dist.max),
        ("percentile_5", dist.percentile_5),
        ("percentile_25", dist.percentile_25),
        ("percentile_75", dist.percentile_75),
        ("percentile_95", dist.percentile_95),
    ])
}

/// A Python module implemented in Rust. Its name must match the library name
/// so the interpreter finds `PyInit_marc_pd_core` in `marc_pd_core.so`.
#[pymodule]
fn marc_pd_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(normalize, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_lccn, m)?)?;
    m.add_function(wrap_pyfunction!(lccn_parts, m)?)?;
    m.add_function(wrap_pyfunction!(generate_title_keys, m)?)?;
    m.add_function(wrap_pyfunction!(generate_author_keys, m)?)?;
    m.add_function(wrap_pyfunction!(title_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(author_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(publisher_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(token_sort_ratio, m)?)?;
    m.add_function(wrap_pyfunction!(score_distribution, m)?)?;
    Ok(())
}
