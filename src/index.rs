//! Inverted index over one reference corpus, sharded by country classification.
//!
//! Built once before matching and read-only afterwards.

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info};

use crate::config::MatchingConfig;
use crate::generic::GenericTitleDetector;
use crate::keys::{generate_author_keys, generate_title_keys};
use crate::publication::{CountryClassification, Publication, ReferenceType};

/// Position of a record in the index arena.
pub type RecordId = usize;

type Postings = AHashMap<String, Vec<RecordId>>;

fn insert_postings(map: &mut Postings, keys: AHashSet<String>, id: RecordId) {
    for key in keys {
        let entry = map.entry(key).or_default();
        // Author and main author may yield the same key for one record
        if entry.last() != Some(&id) {
            entry.push(id);
        }
    }
}

/// Title and author keys of one query record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryKeys {
    pub title: AHashSet<String>,
    pub author: AHashSet<String>,
}

impl QueryKeys {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.author.is_empty()
    }
}

#[derive(Debug, Default)]
struct IndexShard {
    title: Postings,
    author: Postings,
    members: Vec<RecordId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub records: usize,
    pub shards: usize,
    pub title_keys: usize,
    pub author_keys: usize,
    pub lccn_keys: usize,
    pub generic_tracked_titles: usize,
}

/// Inverted index over one reference corpus, sharded by country classification.
///
/// Built once, then shared read-only by all matching workers.
#[derive(Debug)]
pub struct ReferenceIndex {
    reference_type: ReferenceType,
    records: Vec<Publication>,
    shards: AHashMap<CountryClassification, IndexShard>,
    lccn: AHashMap<String, Vec<RecordId>>,
    generic: GenericTitleDetector,
    stopwords: AHashSet<String>,
    phonetic: bool,
}

impl ReferenceIndex {
    pub fn build(
        reference_type: ReferenceType,
        records: Vec<Publication>,
        config: &MatchingConfig,
    ) -> Self {
        let stopwords = config.stopword_set();
        let mut shards: AHashMap<CountryClassification, IndexShard> = AHashMap::new();
        let mut lccn: AHashMap<String, Vec<RecordId>> = AHashMap::new();
        let mut generic = GenericTitleDetector::new(config);

        for (id, record) in records.iter().enumerate() {
            let shard = shards.entry(record.country_classification()).or_default();
            shard.members.push(id);

            let title_keys = generate_title_keys(record.title(), &stopwords, config.phonetic_keys);
            insert_postings(&mut shard.title, title_keys, id);
            insert_postings(&mut shard.author, generate_author_keys(record.author()), id);
            insert_postings(
                &mut shard.author,
                generate_author_keys(record.main_author()),
                id,
            );

            if let Some(key) = record.normalized_lccn() {
                lccn.entry(key.to_string()).or_default().push(id);
            }
            generic.add_title(record.normalized_title());
        }

        let index = ReferenceIndex {
            reference_type,
            records,
            shards,
            lccn,
            generic,
            stopwords,
            phonetic: config.phonetic_keys,
        };
        let stats = index.stats();
        info!(
            reference_type = %reference_type,
            records = stats.records,
            shards = stats.shards,
            title_keys = stats.title_keys,
            author_keys = stats.author_keys,
            lccn_keys = stats.lccn_keys,
            "built reference index"
        );
        index
    }

    pub fn reference_type(&self) -> ReferenceType {
        self.reference_type
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Publication> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[Publication] {
        &self.records
    }

    pub fn generic_detector(&self) -> &GenericTitleDetector {
        &self.generic
    }

    /// Keys a query record is looked up by, generated the same way as at build time.
    pub fn query_keys(&self, record: &Publication) -> QueryKeys {
        let mut author = generate_author_keys(record.author());
        author.extend(generate_author_keys(record.main_author()));
        QueryKeys {
            title: generate_title_keys(record.title(), &self.stopwords, self.phonetic),
            author,
        }
    }

    /// Shards searched for a query: its own plus the unclassified shard, or all of them
    /// when the query itself is unclassified.
    fn shards_for(
        &self,
        classification: CountryClassification,
    ) -> impl Iterator<Item = &IndexShard> + '_ {
        self.shards
            .iter()
            .filter(move |(shard, _)| {
                classification == CountryClassification::Unknown
                    || **shard == classification
                    || **shard == CountryClassification::Unknown
            })
            .map(|(_, shard)| shard)
    }

    /// Union of the postings of all keys, ascending and without duplicates.
    /// No keys means no candidates.
    pub fn lookup(&self, keys: &QueryKeys, classification: CountryClassification) -> Vec<RecordId> {
        if keys.is_empty() {
            return Vec::new();
        }
        let mut ids = Vec::new();
        for shard in self.shards_for(classification) {
            for key in &keys.title {
                if let Some(postings) = shard.title.get(key) {
                    ids.extend_from_slice(postings);
                }
            }
            for key in &keys.author {
                if let Some(postings) = shard.author.get(key) {
                    ids.extend_from_slice(postings);
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Every record in the shards a query would search, ascending.
    pub fn scan(&self, classification: CountryClassification) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .shards_for(classification)
            .flat_map(|shard| shard.members.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Candidates for a record via its keys, falling back to a scan when the keys
    /// miss and `full_scan_fallback` is set.
    pub fn candidates_for(&self, record: &Publication, full_scan_fallback: bool) -> Vec<RecordId> {
        let classification = record.country_classification();
        let ids = self.lookup(&self.query_keys(record), classification);
        if ids.is_empty() && full_scan_fallback {
            debug!(
                source_id = record.source_id(),
                reference_type = %self.reference_type,
                "index miss, scanning shard"
            );
            return self.scan(classification);
        }
        ids
    }

    /// First reference record (in load order) with this normalized LCCN.
    pub fn find_by_lccn(&self, normalized_lccn: &str) -> Option<&Publication> {
        self.lccn
            .get(normalized_lccn)
            .and_then(|ids| ids.first())
            .and_then(|id| self.records.get(*id))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            records: self.records.len(),
            shards: self.shards.len(),
            title_keys: self.shards.values().map(|s| s.title.len()).sum(),
            author_keys: self.shards.values().map(|s| s.author.len()).sum(),
            lccn_keys: self.lccn.len(),
            generic_tracked_titles: self.generic.tracked_titles(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publication::Source;

    fn registration(id: &str, title: &str, author: &str) -> Publication {
        Publication::new(Source::Registration, id, title).with_author(author)
    }

    fn build(records: Vec<Publication>) -> ReferenceIndex {
        ReferenceIndex::build(ReferenceType::Registration, records, &MatchingConfig::default())
    }

    #[test]
    fn test_lookup_finds_record_sharing_a_key() {
        let index = build(vec![
            registration("R1", "The Great Gatsby", "Fitzgerald, F. Scott"),
            registration("R2", "Tender Is the Night", "Fitzgerald, F. Scott"),
            registration("R3", "Moby Dick", "Melville, Herman"),
        ]);
        let query = Publication::new(Source::Catalog, "C1", "Great Gatsby");
        let ids = index.lookup(&index.query_keys(&query), CountryClassification::Unknown);
        assert_eq!(ids, vec![0]);

        let query = Publication::new(Source::Catalog, "C2", "Unrelated").with_author("F. Scott Fitzgerald");
        let ids = index.lookup(&index.query_keys(&query), CountryClassification::Unknown);
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_empty_keys_return_nothing() {
        let index = build(vec![registration("R1", "Poems", "")]);
        assert!(index
            .lookup(&QueryKeys::default(), CountryClassification::Unknown)
            .is_empty());
    }

    #[test]
    fn test_candidates_fall_back_to_scan() {
        let index = build(vec![
            registration("R1", "Poems", ""),
            registration("R2", "Letters", ""),
        ]);
        let query = Publication::new(Source::Catalog, "C1", "Zzyzx");
        assert_eq!(index.candidates_for(&query, true), vec![0, 1]);
        assert!(index.candidates_for(&query, false).is_empty());
    }

    #[test]
    fn test_sharding_by_classification() {
        let index = build(vec![
            registration("R1", "Annals", "").with_country_code("nyu"),
            registration("R2", "Annals", "").with_country_code("enk"),
            registration("R3", "Annals", ""),
        ]);
        let keys = index.query_keys(&Publication::new(Source::Catalog, "C", "Annals"));
        assert_eq!(index.lookup(&keys, CountryClassification::Us), vec![0, 2]);
        assert_eq!(index.lookup(&keys, CountryClassification::NonUs), vec![1, 2]);
        assert_eq!(index.lookup(&keys, CountryClassification::Unknown), vec![0, 1, 2]);
        assert_eq!(index.stats().shards, 3);
    }

    #[test]
    fn test_main_author_is_indexed() {
        let index = build(vec![registration("R1", "Essays", "")
            .with_main_author("Emerson, Ralph Waldo")]);
        let query = Publication::new(Source::Catalog, "C", "Nature").with_author("Emerson");
        let ids = index.lookup(&index.query_keys(&query), CountryClassification::Unknown);
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn test_find_by_lccn_returns_first_loaded() {
        let index = build(vec![
            registration("R1", "A", "").with_lccn("n78-890351"),
            registration("R2", "B", "").with_lccn("n78890351"),
        ]);
        assert_eq!(
            index.find_by_lccn("n78890351").map(Publication::source_id),
            Some("R1")
        );
        assert!(index.find_by_lccn("99999999").is_none());
        assert_eq!(index.stats().lccn_keys, 1);
    }
}
