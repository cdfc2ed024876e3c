use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::StatusPolicy;
use crate::error::ValidationError;
use crate::keys::canonical_name;
use crate::text::{extract_year, normalize, normalize_lccn};

/// Last publication year for which renewal was required.
const RENEWAL_PERIOD_END: i32 = 1977;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Catalog,
    Registration,
    Renewal,
}

/// Reference corpus a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Registration,
    Renewal,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceType::Registration => "registration",
            ReferenceType::Renewal => "renewal",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(ReferenceType::Registration),
            "renewal" => Ok(ReferenceType::Renewal),
            other => Err(ValidationError::UnknownMatchType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Lccn,
    Similarity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountryClassification {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "Non-US")]
    NonUs,
    #[default]
    Unknown,
}

impl CountryClassification {
    /// Classify a MARC country code. US codes are the three-letter state codes ending in `u`.
    pub fn from_country_code(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return CountryClassification::Unknown;
        }
        if code.len() == 3 && code.to_ascii_lowercase().ends_with('u') {
            CountryClassification::Us
        } else {
            CountryClassification::NonUs
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CountryClassification::Us => "US",
            CountryClassification::NonUs => "Non-US",
            CountryClassification::Unknown => "Unknown",
        }
    }
}

/// Copyright status derived from country, year and attached matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyrightStatus {
    /// No matching pass has run yet.
    Undetermined,
    UsPreExpiration,
    ForeignPreExpiration,
    CountryUnknownPreExpiration,
    OutOfDataRange,
    UsRenewed,
    UsRegisteredNotRenewed,
    UsNoMatch,
    ForeignRenewed,
    ForeignRegisteredNotRenewed,
    ForeignNoMatch,
    CountryUnknownRenewed,
    CountryUnknownRegisteredNotRenewed,
    CountryUnknownNoMatch,
}

impl CopyrightStatus {
    pub const ALL: [CopyrightStatus; 14] = [
        CopyrightStatus::Undetermined,
        CopyrightStatus::UsPreExpiration,
        CopyrightStatus::ForeignPreExpiration,
        CopyrightStatus::CountryUnknownPreExpiration,
        CopyrightStatus::OutOfDataRange,
        CopyrightStatus::UsRenewed,
        CopyrightStatus::UsRegisteredNotRenewed,
        CopyrightStatus::UsNoMatch,
        CopyrightStatus::ForeignRenewed,
        CopyrightStatus::ForeignRegisteredNotRenewed,
        CopyrightStatus::ForeignNoMatch,
        CopyrightStatus::CountryUnknownRenewed,
        CopyrightStatus::CountryUnknownRegisteredNotRenewed,
        CopyrightStatus::CountryUnknownNoMatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CopyrightStatus::Undetermined => "UNDETERMINED",
            CopyrightStatus::UsPreExpiration => "US_PRE_EXPIRATION",
            CopyrightStatus::ForeignPreExpiration => "FOREIGN_PRE_EXPIRATION",
            CopyrightStatus::CountryUnknownPreExpiration => "COUNTRY_UNKNOWN_PRE_EXPIRATION",
            CopyrightStatus::OutOfDataRange => "OUT_OF_DATA_RANGE",
            CopyrightStatus::UsRenewed => "US_RENEWED",
            CopyrightStatus::UsRegisteredNotRenewed => "US_REGISTERED_NOT_RENEWED",
            CopyrightStatus::UsNoMatch => "US_NO_MATCH",
            CopyrightStatus::ForeignRenewed => "FOREIGN_RENEWED",
            CopyrightStatus::ForeignRegisteredNotRenewed => "FOREIGN_REGISTERED_NOT_RENEWED",
            CopyrightStatus::ForeignNoMatch => "FOREIGN_NO_MATCH",
            CopyrightStatus::CountryUnknownRenewed => "COUNTRY_UNKNOWN_RENEWED",
            CopyrightStatus::CountryUnknownRegisteredNotRenewed => {
                "COUNTRY_UNKNOWN_REGISTERED_NOT_RENEWED"
            }
            CopyrightStatus::CountryUnknownNoMatch => "COUNTRY_UNKNOWN_NO_MATCH",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }

    /// Status for a record with the given classification, year and match flags,
    /// with the rule that produced it.
    pub fn determine(
        classification: CountryClassification,
        year: Option<i32>,
        has_registration: bool,
        has_renewal: bool,
        policy: &StatusPolicy,
    ) -> (Self, CopyrightStatusRule) {
        use CopyrightStatus::*;
        use CopyrightStatusRule as Rule;
        use CountryClassification::*;

        if let Some(year) = year {
            if year < policy.copyright_expiration_year {
                return match classification {
                    Us => (UsPreExpiration, Rule::UsPreCopyrightExpiration),
                    NonUs => (ForeignPreExpiration, Rule::ForeignPreCopyrightExpiration),
                    // Unknown countries fall under the US rule.
                    Unknown => (CountryUnknownPreExpiration, Rule::UsPreCopyrightExpiration),
                };
            }
            if year > policy.max_data_year {
                return (OutOfDataRange, Rule::OutOfDataRange);
            }
        }

        let renewal_period = year.is_some_and(|year| Self::in_renewal_period(year, policy));
        match (classification, has_registration, has_renewal) {
            (Us, true, false) if renewal_period => {
                (UsRegisteredNotRenewed, Rule::UsRenewalPeriodNotRenewed)
            }
            (Us, _, true) if renewal_period => (UsRenewed, Rule::UsRenewalPeriodRenewed),
            (Us, false, false) if renewal_period => (UsNoMatch, Rule::UsRenewalPeriodNoMatch),
            (Us, true, false) => (UsRegisteredNotRenewed, Rule::UsRegisteredNoRenewal),
            (Us, false, true) => (UsRenewed, Rule::UsRenewalFound),
            (Us, true, true) => (UsRenewed, Rule::UsBothRegistrationAndRenewal),
            (Us, false, false) => (UsNoMatch, Rule::UsNoMatch),
            (NonUs, _, true) => (ForeignRenewed, Rule::ForeignRenewed),
            (NonUs, true, false) => (ForeignRegisteredNotRenewed, Rule::ForeignRegisteredNotRenewed),
            (NonUs, false, false) => (ForeignNoMatch, Rule::ForeignNoMatch),
            (Unknown, _, true) => (CountryUnknownRenewed, Rule::CountryUnknownRenewed),
            (Unknown, true, false) => (
                CountryUnknownRegisteredNotRenewed,
                Rule::CountryUnknownRegistered,
            ),
            (Unknown, false, false) => (CountryUnknownNoMatch, Rule::CountryUnknownNoMatch),
        }
    }

    /// True when the year falls inside the window where non-renewal put a work into the public domain.
    pub fn in_renewal_period(year: i32, policy: &StatusPolicy) -> bool {
        (policy.copyright_expiration_year..=RENEWAL_PERIOD_END).contains(&year)
    }
}

/// Legal reasoning behind a [`CopyrightStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyrightStatusRule {
    UsPreCopyrightExpiration,
    ForeignPreCopyrightExpiration,
    /// Published between the expiration year and 1977, registered, never renewed.
    UsRenewalPeriodNotRenewed,
    UsRenewalPeriodRenewed,
    UsRenewalPeriodNoMatch,
    UsRegisteredNoRenewal,
    UsRenewalFound,
    UsBothRegistrationAndRenewal,
    UsNoMatch,
    ForeignRenewed,
    ForeignRegisteredNotRenewed,
    ForeignNoMatch,
    CountryUnknownRenewed,
    CountryUnknownRegistered,
    CountryUnknownNoMatch,
    OutOfDataRange,
}

impl CopyrightStatusRule {
    pub fn description(self) -> &'static str {
        match self {
            Self::UsPreCopyrightExpiration => "Published before copyright expiration year",
            Self::ForeignPreCopyrightExpiration => {
                "Foreign work published before copyright expiration year"
            }
            Self::UsRenewalPeriodNotRenewed => "US renewal period: Registered but not renewed",
            Self::UsRenewalPeriodRenewed => "US renewal period: Registered and renewed",
            Self::UsRenewalPeriodNoMatch => "US renewal period: No registration data found",
            Self::UsRegisteredNoRenewal => "US: Registered but no renewal found",
            Self::UsRenewalFound => "US: Renewal record found",
            Self::UsBothRegistrationAndRenewal => "US: Both registration and renewal found",
            Self::UsNoMatch => "US: No registration or renewal data found",
            Self::ForeignRenewed => "Foreign work with US renewal",
            Self::ForeignRegisteredNotRenewed => "Foreign work with US registration only",
            Self::ForeignNoMatch => "Foreign work with no US copyright records",
            Self::CountryUnknownRenewed => "Unknown country with renewal found",
            Self::CountryUnknownRegistered => "Unknown country with registration only",
            Self::CountryUnknownNoMatch => "Unknown country with no matches",
            Self::OutOfDataRange => "Publication year beyond available copyright data",
        }
    }
}

impl fmt::Display for CopyrightStatusRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for CopyrightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size per-status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    counts: [usize; CopyrightStatus::ALL.len()],
}

impl StatusCounts {
    pub fn record(&mut self, status: CopyrightStatus) {
        self.counts[status.slot()] += 1;
    }

    pub fn get(&self, status: CopyrightStatus) -> usize {
        self.counts[status.slot()]
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Non-zero counters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (CopyrightStatus, usize)> + '_ {
        CopyrightStatus::ALL
            .iter()
            .map(|status| (*status, self.get(*status)))
            .filter(|(_, count)| *count > 0)
    }
}

/// Binding of a catalog record to one reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub source_id: String,
    pub source_type: ReferenceType,
    pub matched_title: String,
    pub matched_author: String,
    pub matched_publisher: Option<String>,
    pub title_score: f64,
    pub author_score: f64,
    pub publisher_score: f64,
    pub similarity_score: f64,
    /// Absolute year difference, absent when either year is unknown.
    pub year_difference: Option<i32>,
    pub match_type: MatchType,
    pub normalized_title: String,
    pub normalized_author: String,
    #[serde(default)]
    pub generic_title: bool,
}

/// A bibliographic record with its normalized forms.
///
/// Normalized fields are recomputed whenever the original changes, and are
/// not part of the serialized form. Author names are normalized into natural
/// order ("Smith, John" becomes "john smith").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PublicationRecord", into = "PublicationRecord")]
pub struct Publication {
    source: Source,
    source_id: String,
    title: String,
    author: String,
    main_author: String,
    publisher: String,
    place: String,
    pub_date: String,
    year: Option<i32>,
    lccn: String,
    full_text: String,
    country_code: String,
    country_classification: CountryClassification,

    normalized_title: String,
    normalized_author: String,
    normalized_main_author: String,
    normalized_publisher: String,
    normalized_place: String,
    normalized_lccn: Option<String>,

    registration_match: Option<MatchResult>,
    renewal_match: Option<MatchResult>,
    matched: bool,
}

/// Serialized layout of a [`Publication`]: original fields and match results only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationRecord {
    pub source: Option<Source>,
    pub source_id: String,
    pub title: String,
    pub author: String,
    pub main_author: String,
    pub publisher: String,
    pub place: String,
    pub pub_date: String,
    pub year: Option<i32>,
    pub lccn: String,
    pub full_text: String,
    pub country_code: String,
    pub country_classification: CountryClassification,
    pub registration_match: Option<MatchResult>,
    pub renewal_match: Option<MatchResult>,
    pub matched: bool,
}

impl From<PublicationRecord> for Publication {
    fn from(record: PublicationRecord) -> Self {
        let mut publication = Publication::new(
            record.source.unwrap_or(Source::Catalog),
            record.source_id,
            &record.title,
        )
        .with_author(&record.author)
        .with_main_author(&record.main_author)
        .with_publisher(&record.publisher)
        .with_place(&record.place)
        .with_pub_date(&record.pub_date)
        .with_lccn(&record.lccn)
        .with_full_text(&record.full_text)
        .with_country(&record.country_code, record.country_classification);
        if record.year.is_some() {
            publication.year = record.year;
        }
        publication.registration_match = record.registration_match;
        publication.renewal_match = record.renewal_match;
        publication.matched = record.matched;
        publication
    }
}

impl From<Publication> for PublicationRecord {
    fn from(publication: Publication) -> Self {
        PublicationRecord {
            source: Some(publication.source),
            source_id: publication.source_id,
            title: publication.title,
            author: publication.author,
            main_author: publication.main_author,
            publisher: publication.publisher,
            place: publication.place,
            pub_date: publication.pub_date,
            year: publication.year,
            lccn: publication.lccn,
            full_text: publication.full_text,
            country_code: publication.country_code,
            country_classification: publication.country_classification,
            registration_match: publication.registration_match,
            renewal_match: publication.renewal_match,
            matched: publication.matched,
        }
    }
}

impl Publication {
    pub fn new(source: Source, source_id: impl Into<String>, title: &str) -> Self {
        Publication {
            source,
            source_id: source_id.into(),
            title: title.to_string(),
            author: String::new(),
            main_author: String::new(),
            publisher: String::new(),
            place: String::new(),
            pub_date: String::new(),
            year: None,
            lccn: String::new(),
            full_text: String::new(),
            country_code: String::new(),
            country_classification: CountryClassification::Unknown,
            normalized_title: normalize(title),
            normalized_author: String::new(),
            normalized_main_author: String::new(),
            normalized_publisher: String::new(),
            normalized_place: String::new(),
            normalized_lccn: None,
            registration_match: None,
            renewal_match: None,
            matched: false,
        }
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self.normalized_author = canonical_name(author);
        self
    }

    pub fn with_main_author(mut self, main_author: &str) -> Self {
        self.main_author = main_author.to_string();
        self.normalized_main_author = canonical_name(main_author);
        self
    }

    pub fn with_publisher(mut self, publisher: &str) -> Self {
        self.publisher = publisher.to_string();
        self.normalized_publisher = normalize(publisher);
        self
    }

    pub fn with_place(mut self, place: &str) -> Self {
        self.place = place.to_string();
        self.normalized_place = normalize(place);
        self
    }

    /// Sets the raw date and the year parsed from it. Unparseable dates leave the year unknown.
    pub fn with_pub_date(mut self, pub_date: &str) -> Self {
        self.pub_date = pub_date.to_string();
        self.year = extract_year(pub_date);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_lccn(mut self, lccn: &str) -> Self {
        self.lccn = lccn.to_string();
        let normalized = normalize_lccn(lccn);
        self.normalized_lccn = (!normalized.is_empty()).then_some(normalized);
        self
    }

    pub fn with_full_text(mut self, full_text: &str) -> Self {
        self.full_text = full_text.to_string();
        self
    }

    pub fn with_country(mut self, code: &str, classification: CountryClassification) -> Self {
        self.country_code = code.to_string();
        self.country_classification = classification;
        self
    }

    /// Sets the country code and derives its classification.
    pub fn with_country_code(self, code: &str) -> Self {
        let classification = CountryClassification::from_country_code(code);
        self.with_country(code, classification)
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn main_author(&self) -> &str {
        &self.main_author
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn pub_date(&self) -> &str {
        &self.pub_date
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn lccn(&self) -> &str {
        &self.lccn
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn country_classification(&self) -> CountryClassification {
        self.country_classification
    }

    pub fn normalized_title(&self) -> &str {
        &self.normalized_title
    }

    pub fn normalized_author(&self) -> &str {
        &self.normalized_author
    }

    pub fn normalized_main_author(&self) -> &str {
        &self.normalized_main_author
    }

    pub fn normalized_publisher(&self) -> &str {
        &self.normalized_publisher
    }

    pub fn normalized_place(&self) -> &str {
        &self.normalized_place
    }

    pub fn normalized_lccn(&self) -> Option<&str> {
        self.normalized_lccn.as_deref()
    }

    pub fn registration_match(&self) -> Option<&MatchResult> {
        self.registration_match.as_ref()
    }

    pub fn renewal_match(&self) -> Option<&MatchResult> {
        self.renewal_match.as_ref()
    }

    /// Attach the outcome of one matching pass, replacing any earlier one.
    pub fn apply_matches(
        &mut self,
        registration: Option<MatchResult>,
        renewal: Option<MatchResult>,
    ) {
        self.registration_match = registration;
        self.renewal_match = renewal;
        self.matched = true;
    }

    /// Attach a match to a single slot. Marks the record as having been through matching.
    pub fn set_match(&mut self, result: MatchResult) {
        match result.source_type {
            ReferenceType::Registration => self.registration_match = Some(result),
            ReferenceType::Renewal => self.renewal_match = Some(result),
        }
        self.matched = true;
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// Current copyright status. Derived on every call so it always reflects the match slots.
    pub fn copyright_status(&self, policy: &StatusPolicy) -> CopyrightStatus {
        self.status_with_rule(policy)
            .map_or(CopyrightStatus::Undetermined, |(status, _)| status)
    }

    /// Rule behind [`copyright_status`](Self::copyright_status); `None` before matching.
    pub fn status_rule(&self, policy: &StatusPolicy) -> Option<CopyrightStatusRule> {
        self.status_with_rule(policy).map(|(_, rule)| rule)
    }

    fn status_with_rule(&self, policy: &StatusPolicy) -> Option<(CopyrightStatus, CopyrightStatusRule)> {
        if !self.matched {
            return None;
        }
        Some(CopyrightStatus::determine(
            self.country_classification,
            self.year,
            self.registration_match.is_some(),
            self.renewal_match.is_some(),
            policy,
        ))
    }
}

/// Keep records whose year is within `[min_year, max_year]`. Records without a year are kept.
pub fn filter_by_year(
    records: Vec<Publication>,
    min_year: Option<i32>,
    max_year: Option<i32>,
) -> Vec<Publication> {
    if min_year.is_none() && max_year.is_none() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| match record.year {
            None => true,
            Some(year) => {
                min_year.is_none_or(|min| year >= min) && max_year.is_none_or(|max| year <= max)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> StatusPolicy {
        StatusPolicy {
            copyright_expiration_year: 1930,
            max_data_year: 1991,
        }
    }

    fn result(source_type: ReferenceType) -> MatchResult {
        MatchResult {
            source_id: "R1".to_string(),
            source_type,
            matched_title: "Title".to_string(),
            matched_author: String::new(),
            matched_publisher: None,
            title_score: 90.0,
            author_score: 0.0,
            publisher_score: 0.0,
            similarity_score: 30.0,
            year_difference: Some(0),
            match_type: MatchType::Similarity,
            normalized_title: "title".to_string(),
            normalized_author: String::new(),
            generic_title: false,
        }
    }

    #[test]
    fn test_normalized_fields_follow_originals() {
        let publication = Publication::new(Source::Catalog, "1", "Les Misérables [microform]")
            .with_author("Hugo, Victor")
            .with_publisher("Little, Brown & Co.")
            .with_pub_date("c1931.")
            .with_lccn("n78-890351");
        assert_eq!(publication.normalized_title(), "les miserables");
        assert_eq!(publication.normalized_author(), "victor hugo");
        assert_eq!(publication.normalized_publisher(), "little brown co");
        assert_eq!(publication.year(), Some(1931));
        assert_eq!(publication.normalized_lccn(), Some("n78890351"));
    }

    #[test]
    fn test_unparseable_fields_degrade_to_absent() {
        let publication = Publication::new(Source::Catalog, "1", "Title")
            .with_pub_date("n.d.")
            .with_lccn("  ");
        assert_eq!(publication.year(), None);
        assert_eq!(publication.normalized_lccn(), None);
    }

    #[test]
    fn test_reference_type_parsing() {
        assert_eq!(
            "registration".parse::<ReferenceType>().unwrap(),
            ReferenceType::Registration
        );
        assert_eq!("renewal".parse::<ReferenceType>().unwrap(), ReferenceType::Renewal);
        assert_eq!(
            "catalog".parse::<ReferenceType>().unwrap_err(),
            ValidationError::UnknownMatchType("catalog".to_string())
        );
    }

    #[test]
    fn test_country_classification() {
        assert_eq!(CountryClassification::from_country_code("nyu"), CountryClassification::Us);
        assert_eq!(CountryClassification::from_country_code("xxu"), CountryClassification::Us);
        assert_eq!(CountryClassification::from_country_code("enk"), CountryClassification::NonUs);
        assert_eq!(CountryClassification::from_country_code("fr"), CountryClassification::NonUs);
        assert_eq!(CountryClassification::from_country_code("|||"), CountryClassification::Unknown);
        assert_eq!(CountryClassification::from_country_code(""), CountryClassification::Unknown);
    }

    #[test]
    fn test_status_undetermined_until_matched() {
        let mut publication = Publication::new(Source::Catalog, "1", "Title")
            .with_year(1950)
            .with_country_code("nyu");
        assert_eq!(publication.copyright_status(&policy()), CopyrightStatus::Undetermined);

        publication.apply_matches(None, None);
        assert_eq!(publication.copyright_status(&policy()), CopyrightStatus::UsNoMatch);

        publication.set_match(result(ReferenceType::Registration));
        assert_eq!(
            publication.copyright_status(&policy()),
            CopyrightStatus::UsRegisteredNotRenewed
        );

        publication.set_match(result(ReferenceType::Renewal));
        assert_eq!(publication.copyright_status(&policy()), CopyrightStatus::UsRenewed);
    }

    #[test]
    fn test_status_year_bounds() {
        let p = policy();
        assert_eq!(
            CopyrightStatus::determine(CountryClassification::NonUs, Some(1900), true, true, &p),
            (
                CopyrightStatus::ForeignPreExpiration,
                CopyrightStatusRule::ForeignPreCopyrightExpiration
            )
        );
        assert_eq!(
            CopyrightStatus::determine(CountryClassification::Us, Some(1995), false, false, &p),
            (CopyrightStatus::OutOfDataRange, CopyrightStatusRule::OutOfDataRange)
        );
        assert_eq!(
            CopyrightStatus::determine(CountryClassification::Unknown, None, true, false, &p),
            (
                CopyrightStatus::CountryUnknownRegisteredNotRenewed,
                CopyrightStatusRule::CountryUnknownRegistered
            )
        );
        assert!(CopyrightStatus::in_renewal_period(1950, &p));
        assert!(!CopyrightStatus::in_renewal_period(1980, &p));
    }

    #[test]
    fn test_renewal_period_rules() {
        let p = policy();
        let us = CountryClassification::Us;
        assert_eq!(
            CopyrightStatus::determine(us, Some(1950), true, false, &p),
            (
                CopyrightStatus::UsRegisteredNotRenewed,
                CopyrightStatusRule::UsRenewalPeriodNotRenewed
            )
        );
        assert_eq!(
            CopyrightStatus::determine(us, Some(1977), true, true, &p).1,
            CopyrightStatusRule::UsRenewalPeriodRenewed
        );
        assert_eq!(
            CopyrightStatus::determine(us, Some(1960), false, false, &p).1,
            CopyrightStatusRule::UsRenewalPeriodNoMatch
        );

        // Same flags after 1977 or with no year use the general US rules.
        assert_eq!(
            CopyrightStatus::determine(us, Some(1980), true, false, &p),
            (
                CopyrightStatus::UsRegisteredNotRenewed,
                CopyrightStatusRule::UsRegisteredNoRenewal
            )
        );
        assert_eq!(
            CopyrightStatus::determine(us, None, true, true, &p).1,
            CopyrightStatusRule::UsBothRegistrationAndRenewal
        );
        assert_eq!(
            CopyrightStatus::determine(us, Some(1985), false, true, &p).1,
            CopyrightStatusRule::UsRenewalFound
        );
        assert_eq!(
            CopyrightStatus::determine(us, None, false, false, &p).1,
            CopyrightStatusRule::UsNoMatch
        );
        assert_eq!(
            CopyrightStatus::determine(CountryClassification::Unknown, Some(1900), false, false, &p),
            (
                CopyrightStatus::CountryUnknownPreExpiration,
                CopyrightStatusRule::UsPreCopyrightExpiration
            )
        );
    }

    #[test]
    fn test_status_rule_follows_matches() {
        let mut publication = Publication::new(Source::Catalog, "1", "Title")
            .with_year(1950)
            .with_country_code("nyu");
        assert_eq!(publication.status_rule(&policy()), None);

        publication.apply_matches(Some(result(ReferenceType::Registration)), None);
        let rule = publication.status_rule(&policy()).unwrap();
        assert_eq!(rule, CopyrightStatusRule::UsRenewalPeriodNotRenewed);
        assert_eq!(rule.to_string(), "US renewal period: Registered but not renewed");
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.record(CopyrightStatus::UsRenewed);
        counts.record(CopyrightStatus::UsRenewed);
        counts.record(CopyrightStatus::ForeignNoMatch);
        let mut other = StatusCounts::default();
        other.record(CopyrightStatus::UsRenewed);
        counts.merge(&other);

        assert_eq!(counts.get(CopyrightStatus::UsRenewed), 3);
        assert_eq!(counts.total(), 4);
        let listed: Vec<_> = counts.iter().collect();
        assert_eq!(
            listed,
            vec![
                (CopyrightStatus::UsRenewed, 3),
                (CopyrightStatus::ForeignNoMatch, 1)
            ]
        );
    }

    #[test]
    fn test_serde_recomputes_normalized_fields() {
        let mut publication = Publication::new(Source::Renewal, "R9", "Café Society")
            .with_author("Smith, J.")
            .with_lccn("85-2")
            .with_full_text("Doubleday & Company");
        publication.set_match(result(ReferenceType::Registration));

        let json = serde_json::to_string(&publication).unwrap();
        assert!(!json.contains("normalized_lccn"));
        let restored: Publication = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, publication);
        assert_eq!(restored.normalized_title(), "cafe society");
        assert_eq!(restored.normalized_lccn(), Some("85000002"));
    }

    #[test]
    fn test_filter_by_year_keeps_unknown_years() {
        let records = vec![
            Publication::new(Source::Catalog, "a", "A").with_year(1920),
            Publication::new(Source::Catalog, "b", "B").with_year(1950),
            Publication::new(Source::Catalog, "c", "C"),
            Publication::new(Source::Catalog, "d", "D").with_year(1990),
        ];
        let kept = filter_by_year(records, Some(1930), Some(1960));
        let ids: Vec<&str> = kept.iter().map(Publication::source_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
