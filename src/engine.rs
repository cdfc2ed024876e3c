//! Matching engine: catalog records against the registration and renewal indexes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::batch::BatchStore;
use crate::config::MatchingConfig;
use crate::error::{BatchStoreError, ConfigError};
use crate::index::ReferenceIndex;
use crate::matcher::{MatchMode, Matcher, Selection};
use crate::publication::{
    CountryClassification, MatchResult, MatchType, Publication, ReferenceType, StatusCounts,
};

/// Cooperative stop signal, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one matched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub records: usize,
    pub registration_matches: usize,
    pub renewal_matches: usize,
    pub lccn_matches: usize,
    /// Candidates fully scored across the batch.
    pub comparisons: usize,
    pub us_records: usize,
    pub non_us_records: usize,
    pub unknown_country_records: usize,
    pub statuses: StatusCounts,
}

impl BatchStats {
    pub fn merge(&mut self, other: &BatchStats) {
        self.records += other.records;
        self.registration_matches += other.registration_matches;
        self.renewal_matches += other.renewal_matches;
        self.lccn_matches += other.lccn_matches;
        self.comparisons += other.comparisons;
        self.us_records += other.us_records;
        self.non_us_records += other.non_us_records;
        self.unknown_country_records += other.unknown_country_records;
        self.statuses.merge(&other.statuses);
    }
}

/// Outcome of a whole run. Failed batches are listed, never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_processed: usize,
    pub batches_failed: usize,
    pub failed_batch_ids: Vec<usize>,
    pub cancelled: bool,
    pub totals: BatchStats,
}

/// Matches catalog records against prebuilt reference indexes.
///
/// Indexes are read-only once the engine exists, so `match_batch` shares them
/// across rayon workers without locking.
#[derive(Debug)]
pub struct MatchingEngine {
    matcher: Matcher,
    registration: ReferenceIndex,
    renewal: ReferenceIndex,
}

impl MatchingEngine {
    pub fn new(
        config: MatchingConfig,
        registration: ReferenceIndex,
        renewal: ReferenceIndex,
    ) -> Result<Self, ConfigError> {
        Ok(MatchingEngine {
            matcher: Matcher::new(config)?,
            registration,
            renewal,
        })
    }

    /// Validate `config`, then build both indexes.
    pub fn from_records(
        config: MatchingConfig,
        registrations: Vec<Publication>,
        renewals: Vec<Publication>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registration = ReferenceIndex::build(ReferenceType::Registration, registrations, &config);
        let renewal = ReferenceIndex::build(ReferenceType::Renewal, renewals, &config);
        Self::new(config, registration, renewal)
    }

    pub fn config(&self) -> &MatchingConfig {
        self.matcher.config()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn index(&self, reference_type: ReferenceType) -> &ReferenceIndex {
        match reference_type {
            ReferenceType::Registration => &self.registration,
            ReferenceType::Renewal => &self.renewal,
        }
    }

    fn match_against(
        &self,
        record: &Publication,
        index: &ReferenceIndex,
        mode: MatchMode,
    ) -> Selection {
        let reference_type = index.reference_type();
        if let Some(hit) = record
            .normalized_lccn()
            .and_then(|lccn| index.find_by_lccn(lccn))
        {
            return Selection {
                result: Some(self.matcher.lccn_match(record, hit, reference_type)),
                ..Selection::default()
            };
        }

        let ids = index.candidates_for(record, self.config().full_scan_fallback);
        let selection = self.matcher.select(
            record,
            ids.iter().filter_map(|id| index.get(*id)),
            reference_type,
            Some(index.generic_detector()),
            mode,
        );
        if selection.early_exit {
            debug!(
                source_id = record.source_id(),
                reference_type = %reference_type,
                comparisons = selection.comparisons,
                "early exit"
            );
        }
        selection
    }

    /// Match one record against both corpora and attach the results.
    /// Returns the number of candidates scored.
    pub fn match_record(&self, record: &mut Publication) -> usize {
        let registration = self.match_against(record, &self.registration, MatchMode::Thresholds);
        let renewal = self.match_against(record, &self.renewal, MatchMode::Thresholds);
        let comparisons = registration.comparisons + renewal.comparisons;
        record.apply_matches(registration.result, renewal.result);
        comparisons
    }

    /// Top-scored registration and renewal candidates without any acceptance gate.
    /// The record is left untouched.
    pub fn match_record_ignore_thresholds(
        &self,
        record: &Publication,
    ) -> (Option<MatchResult>, Option<MatchResult>) {
        let mode = MatchMode::IgnoreThresholds;
        let registration = self.match_against(record, &self.registration, mode);
        let renewal = self.match_against(record, &self.renewal, mode);
        (registration.result, renewal.result)
    }

    /// Match every record of a batch in parallel.
    pub fn match_batch(&self, records: &mut [Publication]) -> BatchStats {
        let _span = info_span!("match_batch", records = records.len()).entered();

        let comparisons = records
            .par_iter_mut()
            .map(|record| self.match_record(record))
            .sum();

        let policy = &self.config().status;
        let mut stats = BatchStats {
            records: records.len(),
            comparisons,
            ..BatchStats::default()
        };
        for record in records.iter() {
            match record.country_classification() {
                CountryClassification::Us => stats.us_records += 1,
                CountryClassification::NonUs => stats.non_us_records += 1,
                CountryClassification::Unknown => stats.unknown_country_records += 1,
            }
            for result in [record.registration_match(), record.renewal_match()]
                .into_iter()
                .flatten()
            {
                match result.source_type {
                    ReferenceType::Registration => stats.registration_matches += 1,
                    ReferenceType::Renewal => stats.renewal_matches += 1,
                }
                if result.match_type == MatchType::Lccn {
                    stats.lccn_matches += 1;
                }
            }
            stats.statuses.record(record.copyright_status(policy));
        }

        debug!(
            registration_matches = stats.registration_matches,
            renewal_matches = stats.renewal_matches,
            lccn_matches = stats.lccn_matches,
            comparisons = stats.comparisons,
            "matched batch"
        );
        stats
    }

    /// Match batches one at a time, handing each matched batch to `sink`.
    ///
    /// A batch that fails to load or that `sink` rejects is counted and skipped.
    /// `token` is checked before each batch.
    pub fn run_batches<I, F>(&self, batches: I, token: &CancellationToken, mut sink: F) -> RunSummary
    where
        I: IntoIterator<Item = (usize, Result<Vec<Publication>, BatchStoreError>)>,
        F: FnMut(usize, Vec<Publication>) -> Result<(), BatchStoreError>,
    {
        let mut summary = RunSummary::default();
        for (batch_id, batch) in batches {
            if token.is_cancelled() {
                info!(batch_id, "run cancelled");
                summary.cancelled = true;
                break;
            }

            let mut records = match batch {
                Ok(records) => records,
                Err(e) => {
                    warn!(batch_id, error = %e, "skipping batch that failed to load");
                    summary.batches_failed += 1;
                    summary.failed_batch_ids.push(batch_id);
                    continue;
                }
            };

            let stats = self.match_batch(&mut records);
            if let Err(e) = sink(batch_id, records) {
                warn!(batch_id, error = %e, "failed to emit matched batch");
                summary.batches_failed += 1;
                summary.failed_batch_ids.push(batch_id);
                continue;
            }
            summary.totals.merge(&stats);
            summary.batches_processed += 1;
        }

        info!(
            batches_processed = summary.batches_processed,
            batches_failed = summary.batches_failed,
            cancelled = summary.cancelled,
            records = summary.totals.records,
            registration_matches = summary.totals.registration_matches,
            renewal_matches = summary.totals.renewal_matches,
            "matching run finished"
        );
        summary
    }

    /// [`run_batches`](Self::run_batches) over in-memory batches numbered from 0.
    pub fn run<I, F>(&self, batches: I, token: &CancellationToken, sink: F) -> RunSummary
    where
        I: IntoIterator<Item = Vec<Publication>>,
        F: FnMut(usize, Vec<Publication>) -> Result<(), BatchStoreError>,
    {
        self.run_batches(
            batches.into_iter().enumerate().map(|(id, batch)| (id, Ok(batch))),
            token,
            sink,
        )
    }

    /// [`run_batches`](Self::run_batches) over batches loaded lazily from a store,
    /// so at most one batch is held at a time.
    pub fn run_from_store<S, F>(
        &self,
        store: &S,
        batch_ids: &[usize],
        token: &CancellationToken,
        sink: F,
    ) -> RunSummary
    where
        S: BatchStore + ?Sized,
        F: FnMut(usize, Vec<Publication>) -> Result<(), BatchStoreError>,
    {
        self.run_batches(
            batch_ids.iter().map(|id| (*id, store.load(*id))),
            token,
            sink,
        )
    }
}
