use std::io;
use std::sync::{Arc, Mutex};

use marc_pd_core::{
    filter_by_year_range, BatchStore, GroundTruthExtractor, GroundTruthPair, JsonLinesBatchStore,
    MatchingConfig, Publication, ReferenceType, ScoreAnalyzer, Source,
};

fn extractor() -> GroundTruthExtractor {
    GroundTruthExtractor::new(MatchingConfig::default()).unwrap()
}

fn catalog(id: &str, title: &str) -> Publication {
    Publication::new(Source::Catalog, id, title)
}

fn registration(id: &str, title: &str) -> Publication {
    Publication::new(Source::Registration, id, title)
}

fn renewal(id: &str, title: &str) -> Publication {
    Publication::new(Source::Renewal, id, title)
}

#[test]
fn test_single_registration_pair() {
    let marc = vec![catalog("C1", "The Great Gatsby").with_lccn("n78890351")];
    let regs = vec![registration("R1", "The Great Gatsby").with_lccn("n 78-890351")];

    let (pairs, stats) = extractor().extract(&marc, &regs, &[]);

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].match_type(), ReferenceType::Registration);
    assert_eq!(pairs[0].match_type().as_str(), "registration");
    assert_eq!(pairs[0].lccn(), "n78890351");
    assert_eq!(stats.marc_with_lccn, 1);
    assert_eq!(stats.registration_matches, 1);
    assert_eq!(stats.renewal_matches, 0);
}

#[test]
fn test_record_without_lccn_yields_no_pair() {
    let marc = vec![
        catalog("C1", "The Great Gatsby").with_lccn("n78890351"),
        catalog("C2", "The Great Gatsby"),
    ];
    let regs = vec![registration("R1", "The Great Gatsby").with_lccn("n78890351")];

    let (pairs, stats) = extractor().extract(&marc, &regs, &[]);

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].marc_record().source_id(), "C1");
    assert_eq!(stats.total_marc_records, 2);
    assert_eq!(stats.marc_with_lccn, 1);
    assert!((stats.marc_lccn_coverage() - 50.0).abs() < 1e-9);
}

#[test]
fn test_year_range_filter() {
    let pair = |id: &str, year: Option<i32>| {
        let mut marc = catalog(id, "Annals").with_lccn("50-1");
        if let Some(year) = year {
            marc = marc.with_year(year);
        }
        let reg = registration("R", "Annals").with_lccn("50000001");
        GroundTruthPair::new(Arc::new(marc), Arc::new(reg), "registration").unwrap()
    };
    let pairs = vec![
        pair("a", Some(1950)),
        pair("b", Some(1960)),
        pair("c", Some(1970)),
        pair("d", Some(1980)),
        pair("e", None),
    ];

    let kept = filter_by_year_range(pairs.clone(), Some(1960), Some(1970));
    let ids: Vec<&str> = kept.iter().map(|p| p.marc_record().source_id()).collect();
    assert_eq!(ids, vec!["b", "c"]);

    assert_eq!(filter_by_year_range(pairs.clone(), None, None).len(), 5);
    assert_eq!(filter_by_year_range(pairs, Some(1975), None).len(), 1);
}

#[test]
fn test_year_range_uses_reference_year_when_catalog_year_missing() {
    let marc = catalog("C", "Annals").with_lccn("50-1");
    let reg = registration("R", "Annals").with_lccn("50-1").with_year(1965);
    let pair = GroundTruthPair::new(Arc::new(marc), Arc::new(reg), "registration").unwrap();
    assert_eq!(pair.year(), Some(1965));
    assert_eq!(filter_by_year_range(vec![pair], Some(1960), Some(1970)).len(), 1);
}

#[test]
fn test_registration_and_renewal_on_same_lccn() {
    let marc = vec![catalog("C1", "The Caine Mutiny").with_lccn("51-1234")];
    let regs = vec![registration("A1", "The Caine Mutiny").with_lccn("51001234")];
    let rens = vec![renewal("R1", "The Caine Mutiny").with_lccn("51001234")];

    let (pairs, stats) = extractor().extract(&marc, &regs, &rens);

    assert_eq!(pairs.len(), 2);
    let types: Vec<ReferenceType> = pairs.iter().map(GroundTruthPair::match_type).collect();
    assert!(types.contains(&ReferenceType::Registration));
    assert!(types.contains(&ReferenceType::Renewal));
    assert!(std::ptr::eq(pairs[0].marc_record(), pairs[1].marc_record()));

    let marc_record = pairs[0].marc_record();
    assert!(marc_record.registration_match().is_some());
    assert!(marc_record.renewal_match().is_some());
    assert_eq!(stats.total_matches(), 2);
    assert_eq!(stats.unique_lccns_matched, 1);
}

#[test]
fn test_streaming_extraction_matches_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonLinesBatchStore::open(dir.path()).unwrap();

    let batch_a = vec![
        catalog("C1", "The Great Gatsby").with_lccn("25-10468"),
        catalog("C2", "Moby Dick"),
    ];
    let batch_b = vec![catalog("C3", "The Caine Mutiny").with_lccn("51-1234")];
    store.store(0, &batch_a).unwrap();
    store.store(1, &batch_b).unwrap();

    let regs = vec![
        registration("R1", "The Great Gatsby").with_lccn("25010468"),
        registration("R2", "The Caine Mutiny").with_lccn("51001234"),
    ];

    let (streamed, stream_stats) = extractor().extract_streaming(&store, &[0, 1, 2], &regs, &[]);

    let all: Vec<Publication> = batch_a.into_iter().chain(batch_b).collect();
    let (in_memory, memory_stats) = extractor().extract(&all, &regs, &[]);

    assert_eq!(streamed.len(), 2);
    assert_eq!(streamed, in_memory);
    assert_eq!(stream_stats.total_marc_records, 3);
    assert_eq!(stream_stats.marc_with_lccn, 2);
    assert_eq!(stream_stats.registration_matches, memory_stats.registration_matches);
    assert_eq!(stream_stats.failed_batches, 1);
    assert_eq!(stream_stats.unique_lccns, None);
    assert_eq!(memory_stats.unique_lccns, Some(2));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn test_invalid_pairs_are_logged_and_skipped() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let marc = Arc::new(catalog("C1", "A").with_lccn("12345678"));
    let good = Arc::new(renewal("R1", "A").with_lccn("12345678"));
    let bad = Arc::new(renewal("R2", "A").with_lccn("87654321"));

    let (pairs, skipped) = tracing::subscriber::with_default(subscriber, || {
        GroundTruthPair::collect_valid(vec![
            (marc.clone(), good, "renewal"),
            (marc.clone(), bad, "renewal"),
        ])
    });

    assert_eq!(pairs.len(), 1);
    assert_eq!(skipped, 1);
    let output = logs.contents();
    assert!(output.contains("skipping invalid ground truth pair"), "{output}");
    assert!(output.contains("R2"), "{output}");
}

#[test]
fn test_extracted_pairs_feed_score_analysis() {
    let marc = vec![
        catalog("C1", "The Great Gatsby")
            .with_author("Fitzgerald, F. Scott")
            .with_year(1925)
            .with_lccn("25-10468"),
        catalog("C2", "Tender is the night")
            .with_author("Fitzgerald, F. Scott")
            .with_year(1934)
            .with_lccn("34-12345"),
    ];
    let regs = vec![
        registration("R1", "The great Gatsby")
            .with_author("F. Scott Fitzgerald")
            .with_year(1925)
            .with_lccn("25010468"),
        registration("R2", "Tender is the night; a romance")
            .with_author("Fitzgerald, Francis Scott")
            .with_year(1934)
            .with_lccn("34012345"),
    ];

    let (pairs, _) = extractor().extract(&marc, &regs, &[]);
    let analysis = ScoreAnalyzer::new(MatchingConfig::default())
        .unwrap()
        .analyze(&pairs);

    assert_eq!(analysis.total_pairs, 2);
    assert_eq!(analysis.unscored_pairs, 0);
    assert_eq!(analysis.title.max, 100.0);
    assert!(analysis.title.min < 100.0);
    assert!(analysis.combined.mean > 0.0);
}
