//! LCCN ground truth: catalog and reference records that share a control number.

use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::batch::BatchStore;
use crate::config::MatchingConfig;
use crate::error::{ConfigError, ValidationError};
use crate::matcher::Matcher;
use crate::publication::{MatchType, Publication, ReferenceType};

/// A catalog record and a reference record with the same normalized LCCN.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruthPair {
    marc_record: Arc<Publication>,
    copyright_record: Arc<Publication>,
    match_type: ReferenceType,
    lccn: String,
}

impl GroundTruthPair {
    /// Fails unless both records carry the same normalized LCCN and `match_type`
    /// is `"registration"` or `"renewal"`.
    pub fn new(
        marc_record: Arc<Publication>,
        copyright_record: Arc<Publication>,
        match_type: &str,
    ) -> Result<Self, ValidationError> {
        let catalog = marc_record
            .normalized_lccn()
            .ok_or(ValidationError::MissingLccn { side: "catalog" })?;
        let reference = copyright_record
            .normalized_lccn()
            .ok_or(ValidationError::MissingLccn { side: "reference" })?;
        if catalog != reference {
            return Err(ValidationError::LccnMismatch {
                catalog: catalog.to_string(),
                reference: reference.to_string(),
            });
        }
        let match_type = match_type.parse::<ReferenceType>()?;
        let lccn = catalog.to_string();
        Ok(GroundTruthPair {
            marc_record,
            copyright_record,
            match_type,
            lccn,
        })
    }

    /// Build every valid pair, logging and skipping the rest.
    /// Returns the pairs and the number skipped.
    pub fn collect_valid<I, S>(candidates: I) -> (Vec<GroundTruthPair>, usize)
    where
        I: IntoIterator<Item = (Arc<Publication>, Arc<Publication>, S)>,
        S: AsRef<str>,
    {
        let mut pairs = Vec::new();
        let mut skipped = 0;
        for (marc, reference, match_type) in candidates {
            let built =
                GroundTruthPair::new(Arc::clone(&marc), Arc::clone(&reference), match_type.as_ref());
            match built {
                Ok(pair) => pairs.push(pair),
                Err(e) => {
                    warn!(
                        catalog_id = marc.source_id(),
                        reference_id = reference.source_id(),
                        error = %e,
                        "skipping invalid ground truth pair"
                    );
                    skipped += 1;
                }
            }
        }
        (pairs, skipped)
    }

    pub fn marc_record(&self) -> &Publication {
        &self.marc_record
    }

    pub fn copyright_record(&self) -> &Publication {
        &self.copyright_record
    }

    pub fn match_type(&self) -> ReferenceType {
        self.match_type
    }

    pub fn lccn(&self) -> &str {
        &self.lccn
    }

    /// Catalog year, else the reference year.
    pub fn year(&self) -> Option<i32> {
        self.marc_record.year().or(self.copyright_record.year())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruthStats {
    pub total_marc_records: usize,
    pub marc_with_lccn: usize,
    pub total_copyright_records: usize,
    pub copyright_with_lccn: usize,
    pub total_renewal_records: usize,
    pub renewal_with_lccn: usize,
    pub registration_matches: usize,
    pub renewal_matches: usize,
    pub unique_lccns_matched: usize,
    /// Distinct catalog LCCNs. Not tracked by streaming extraction.
    pub unique_lccns: Option<usize>,
    pub skipped_invalid: usize,
    pub failed_batches: usize,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl GroundTruthStats {
    pub fn total_matches(&self) -> usize {
        self.registration_matches + self.renewal_matches
    }

    pub fn marc_lccn_coverage(&self) -> f64 {
        percent(self.marc_with_lccn, self.total_marc_records)
    }

    pub fn copyright_lccn_coverage(&self) -> f64 {
        percent(self.copyright_with_lccn, self.total_copyright_records)
    }

    pub fn renewal_lccn_coverage(&self) -> f64 {
        percent(self.renewal_with_lccn, self.total_renewal_records)
    }
}

impl fmt::Display for GroundTruthStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ground truth extraction")?;
        writeln!(
            f,
            "  catalog records:       {} ({} with LCCN, {:.1}%)",
            self.total_marc_records,
            self.marc_with_lccn,
            self.marc_lccn_coverage()
        )?;
        writeln!(
            f,
            "  registration records:  {} ({} with LCCN, {:.1}%)",
            self.total_copyright_records,
            self.copyright_with_lccn,
            self.copyright_lccn_coverage()
        )?;
        writeln!(
            f,
            "  renewal records:       {} ({} with LCCN, {:.1}%)",
            self.total_renewal_records,
            self.renewal_with_lccn,
            self.renewal_lccn_coverage()
        )?;
        writeln!(f, "  registration matches:  {}", self.registration_matches)?;
        writeln!(f, "  renewal matches:       {}", self.renewal_matches)?;
        writeln!(f, "  total matches:         {}", self.total_matches())?;
        writeln!(f, "  unique LCCNs matched:  {}", self.unique_lccns_matched)?;
        if let Some(unique) = self.unique_lccns {
            writeln!(f, "  unique catalog LCCNs:  {unique}")?;
        }
        if self.skipped_invalid > 0 {
            writeln!(f, "  skipped invalid pairs: {}", self.skipped_invalid)?;
        }
        if self.failed_batches > 0 {
            writeln!(f, "  failed batches:        {}", self.failed_batches)?;
        }
        Ok(())
    }
}

/// Human-readable summary of an extraction.
pub fn coverage_report(stats: &GroundTruthStats) -> String {
    stats.to_string()
}

/// LCCN presence in one dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetCoverage {
    pub total: usize,
    pub with_lccn: usize,
}

impl DatasetCoverage {
    fn of(records: &[Publication]) -> Self {
        DatasetCoverage {
            total: records.len(),
            with_lccn: records
                .iter()
                .filter(|r| r.normalized_lccn().is_some())
                .count(),
        }
    }

    pub fn percent(&self) -> f64 {
        percent(self.with_lccn, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub catalog: DatasetCoverage,
    pub registration: DatasetCoverage,
    pub renewal: DatasetCoverage,
}

/// How many records of each dataset could take part in LCCN matching at all.
pub fn coverage(
    catalog: &[Publication],
    registrations: &[Publication],
    renewals: &[Publication],
) -> CoverageReport {
    CoverageReport {
        catalog: DatasetCoverage::of(catalog),
        registration: DatasetCoverage::of(registrations),
        renewal: DatasetCoverage::of(renewals),
    }
}

/// Keep pairs whose year lies in `[min_year, max_year]`. With any bound set,
/// pairs with no year on either side are dropped.
pub fn filter_by_year_range(
    pairs: Vec<GroundTruthPair>,
    min_year: Option<i32>,
    max_year: Option<i32>,
) -> Vec<GroundTruthPair> {
    if min_year.is_none() && max_year.is_none() {
        return pairs;
    }
    pairs
        .into_iter()
        .filter(|pair| {
            pair.year().is_some_and(|year| {
                min_year.is_none_or(|min| year >= min) && max_year.is_none_or(|max| year <= max)
            })
        })
        .collect()
}

type LccnIndex = AHashMap<String, Vec<Arc<Publication>>>;

fn build_lccn_index(records: &[Publication]) -> LccnIndex {
    let mut index = LccnIndex::new();
    for record in records {
        if let Some(lccn) = record.normalized_lccn() {
            index
                .entry(lccn.to_string())
                .or_default()
                .push(Arc::new(record.clone()));
        }
    }
    index
}

/// One catalog record with every reference record sharing its LCCN.
struct LccnHits {
    marc: Arc<Publication>,
    references: Vec<(Arc<Publication>, ReferenceType)>,
}

/// Running totals shared by the in-memory and streaming paths.
#[derive(Default)]
struct Accumulator {
    stats: GroundTruthStats,
    pairs: Vec<GroundTruthPair>,
    matched_lccns: AHashSet<String>,
}

impl Accumulator {
    fn add(&mut self, hits: LccnHits) {
        for (_, reference_type) in &hits.references {
            match reference_type {
                ReferenceType::Registration => self.stats.registration_matches += 1,
                ReferenceType::Renewal => self.stats.renewal_matches += 1,
            }
        }
        let marc = hits.marc;
        let (pairs, skipped) = GroundTruthPair::collect_valid(
            hits.references
                .into_iter()
                .map(|(reference, reference_type)| {
                    (Arc::clone(&marc), reference, reference_type.as_str())
                }),
        );
        self.stats.skipped_invalid += skipped;
        for pair in &pairs {
            self.matched_lccns.insert(pair.lccn().to_string());
        }
        self.pairs.extend(pairs);
    }
}

/// Joins catalog records to reference records on normalized LCCN.
#[derive(Debug, Clone)]
pub struct GroundTruthExtractor {
    matcher: Matcher,
}

impl GroundTruthExtractor {
    pub fn new(config: MatchingConfig) -> Result<Self, ConfigError> {
        Ok(GroundTruthExtractor {
            matcher: Matcher::new(config)?,
        })
    }

    /// Copy of `record` with LCCN match results (carrying real similarity scores) attached,
    /// plus the hits, or `None` when nothing shares its LCCN.
    fn lccn_hits(
        &self,
        record: &Publication,
        registrations: &LccnIndex,
        renewals: &LccnIndex,
    ) -> Option<LccnHits> {
        let lccn = record.normalized_lccn()?;
        let mut references = Vec::new();
        let mut marc = record.clone();

        for (index, reference_type) in [
            (registrations, ReferenceType::Registration),
            (renewals, ReferenceType::Renewal),
        ] {
            let Some(hits) = index.get(lccn) else {
                continue;
            };
            if let Some(first) = hits.first() {
                let mut result = self.matcher.score_pair(record, first, reference_type);
                result.match_type = MatchType::Lccn;
                marc.set_match(result);
            }
            references.extend(hits.iter().map(|hit| (Arc::clone(hit), reference_type)));
        }

        if references.is_empty() {
            return None;
        }
        Some(LccnHits {
            marc: Arc::new(marc),
            references,
        })
    }

    fn reference_stats(
        registrations: &[Publication],
        renewals: &[Publication],
    ) -> GroundTruthStats {
        let registration = DatasetCoverage::of(registrations);
        let renewal = DatasetCoverage::of(renewals);
        GroundTruthStats {
            total_copyright_records: registration.total,
            copyright_with_lccn: registration.with_lccn,
            total_renewal_records: renewal.total,
            renewal_with_lccn: renewal.with_lccn,
            ..GroundTruthStats::default()
        }
    }

    /// Every LCCN-verified pair between the catalog and both reference corpora.
    pub fn extract(
        &self,
        catalog: &[Publication],
        registrations: &[Publication],
        renewals: &[Publication],
    ) -> (Vec<GroundTruthPair>, GroundTruthStats) {
        let _span = info_span!("ground_truth", catalog = catalog.len()).entered();
        let registration_index = build_lccn_index(registrations);
        let renewal_index = build_lccn_index(renewals);

        let mut acc = Accumulator {
            stats: Self::reference_stats(registrations, renewals),
            ..Accumulator::default()
        };
        acc.stats.total_marc_records = catalog.len();
        acc.stats.marc_with_lccn = DatasetCoverage::of(catalog).with_lccn;
        acc.stats.unique_lccns = Some(
            catalog
                .iter()
                .filter_map(Publication::normalized_lccn)
                .collect::<AHashSet<_>>()
                .len(),
        );

        let hits: Vec<Option<LccnHits>> = catalog
            .par_iter()
            .map(|record| self.lccn_hits(record, &registration_index, &renewal_index))
            .collect();
        for hit in hits.into_iter().flatten() {
            acc.add(hit);
        }

        Self::finish(acc)
    }

    /// Same as [`extract`](Self::extract), loading catalog batches from `store` one at a
    /// time. A batch that fails to load is logged, counted and skipped.
    pub fn extract_streaming<S>(
        &self,
        store: &S,
        batch_ids: &[usize],
        registrations: &[Publication],
        renewals: &[Publication],
    ) -> (Vec<GroundTruthPair>, GroundTruthStats)
    where
        S: BatchStore + ?Sized,
    {
        let _span = info_span!("ground_truth", batches = batch_ids.len()).entered();
        let registration_index = build_lccn_index(registrations);
        let renewal_index = build_lccn_index(renewals);

        let mut acc = Accumulator {
            stats: Self::reference_stats(registrations, renewals),
            ..Accumulator::default()
        };

        for &batch_id in batch_ids {
            let batch = match store.load(batch_id) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(batch_id, error = %e, "skipping catalog batch");
                    acc.stats.failed_batches += 1;
                    continue;
                }
            };
            debug!(batch_id, records = batch.len(), "processing catalog batch");
            acc.stats.total_marc_records += batch.len();
            acc.stats.marc_with_lccn += DatasetCoverage::of(&batch).with_lccn;

            let hits: Vec<Option<LccnHits>> = batch
                .par_iter()
                .map(|record| self.lccn_hits(record, &registration_index, &renewal_index))
                .collect();
            for hit in hits.into_iter().flatten() {
                acc.add(hit);
            }
        }

        Self::finish(acc)
    }

    fn finish(mut acc: Accumulator) -> (Vec<GroundTruthPair>, GroundTruthStats) {
        acc.stats.unique_lccns_matched = acc.matched_lccns.len();
        let stats = acc.stats;
        info!(
            catalog_records = stats.total_marc_records,
            with_lccn = stats.marc_with_lccn,
            registration_matches = stats.registration_matches,
            renewal_matches = stats.renewal_matches,
            unique_lccns_matched = stats.unique_lccns_matched,
            skipped_invalid = stats.skipped_invalid,
            failed_batches = stats.failed_batches,
            "ground truth extraction complete"
        );
        (acc.pairs, stats)
    }
}
