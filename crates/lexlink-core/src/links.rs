//! Interpretation links: the statute → case-paragraph graph.
//!
//! An interpretation link is a directed, typed edge from a statute provision
//! to the case paragraph that judicially construes it. Links drive two of
//! the system's behaviours: the retriever boosts (or injects) interpretive
//! cases when their statute surfaces in the fused ranking, and the
//! hallucination detector verifies interpretation claims extracted from
//! generated answers against the same graph.
//!
//! Links are written by offline extraction jobs and read within a query
//! lifetime; the store keeps secondary indexes for every lookup path the
//! retriever and validator use.

use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Lowest admissible boost factor.
pub const MIN_BOOST: f64 = 1.0;
/// Highest admissible boost factor.
pub const MAX_BOOST: f64 = 3.0;

/// How a case construes the statutory provision it links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpretationType {
    /// Restricts the provision's scope
    Narrow,
    /// Extends the provision's scope
    Broad,
    /// Resolves an ambiguity without changing scope
    Clarify,
    /// Construes by legislative purpose
    Purposive,
    /// Construes by plain text
    Literal,
    /// Applies the provision to new facts without construing it
    Apply,
}

impl fmt::Display for InterpretationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Narrow => "NARROW",
            Self::Broad => "BROAD",
            Self::Clarify => "CLARIFY",
            Self::Purposive => "PURPOSIVE",
            Self::Literal => "LITERAL",
            Self::Apply => "APPLY",
        };
        write!(f, "{s}")
    }
}

/// Legal weight of the interpreting holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    /// Ratio of a superior court; must be followed
    Binding,
    /// Holding of a coordinate or foreign court
    Persuasive,
    /// Remarks in passing, not part of the ratio
    Obiter,
    /// Dissenting opinion
    Dissent,
}

impl Authority {
    /// Default retrieval boost for links carrying this authority.
    pub fn default_boost(&self) -> f64 {
        match self {
            Authority::Binding => 2.8,
            Authority::Persuasive => 2.0,
            Authority::Obiter => 1.5,
            Authority::Dissent => 1.2,
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Binding => "BINDING",
            Self::Persuasive => "PERSUASIVE",
            Self::Obiter => "OBITER",
            Self::Dissent => "DISSENT",
        };
        write!(f, "{s}")
    }
}

/// How a link was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionMethod {
    /// Pattern-based extraction from case text
    RuleBased,
    /// Extraction assisted by a language model
    LlmAssisted,
    /// Entered by a human curator
    Manual,
}

/// Errors raised by the link store.
#[derive(Debug, Error)]
pub enum LinkStoreError {
    #[error("link {statute_id} -> {case_id}: boost_factor {boost} outside [1.0, 3.0]")]
    BoostOutOfRange {
        statute_id: String,
        case_id: String,
        boost: f64,
    },

    #[error("link {statute_id} -> {case_id}: {field} {value} outside [0, 1]")]
    ScoreOutOfRange {
        statute_id: String,
        case_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("link references unknown document: {0}")]
    UnknownDocument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A directed edge from a statute provision to an interpreting case paragraph.
///
/// Case and statute details are denormalized onto the link so hits can be
/// displayed (and claims verified) without a join back to the documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretationLink {
    /// Statute document id (the provision construed)
    pub statute_id: String,
    /// Case document id (the paragraph construing it)
    pub case_id: String,

    // Denormalized statute details
    /// Full statute name
    pub statute_name: String,
    /// Section number within the statute
    pub statute_section: String,

    // Denormalized case details
    /// Case citation, e.g. `[2013] SGCA 36`
    pub case_citation: String,
    /// Paragraph number of the interpreting passage
    pub case_para_no: u32,
    /// Court abbreviation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    /// Year of decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    // Interpretation metadata
    /// How the case construes the statute
    pub interpretation_type: InterpretationType,
    /// Legal weight of the holding
    pub authority: Authority,
    /// Brief description of the interpretation
    pub holding: String,

    // Fact-pattern awareness
    /// Tags describing the fact pattern the interpretation arose from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fact_pattern_tags: Vec<String>,
    /// Primary legal issue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_of_action: Option<String>,
    /// How broadly the interpretation applies to other fact patterns (0–1)
    pub applicability_score: f64,

    // Retrieval configuration
    /// Score multiplier applied when the statute anchors a retrieval
    pub boost_factor: f64,
    /// Whether a human has confirmed the link
    pub verified: bool,
    /// Who verified it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    /// When it was verified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,

    // Extraction metadata
    /// How the link was produced
    pub extraction_method: ExtractionMethod,
    /// Extractor confidence (0–1)
    pub confidence: f64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl InterpretationLink {
    /// Starts a builder for a link between the given documents.
    pub fn builder(
        statute_id: impl Into<String>,
        case_id: impl Into<String>,
    ) -> InterpretationLinkBuilder {
        InterpretationLinkBuilder::new(statute_id, case_id)
    }

    /// Boost adjusted by applicability; used for ranking link lists.
    pub fn effective_boost(&self) -> f64 {
        if self.applicability_score > 0.0 {
            self.boost_factor * self.applicability_score
        } else {
            self.boost_factor
        }
    }

    /// Whether the holding carries binding authority.
    pub fn is_binding(&self) -> bool {
        self.authority == Authority::Binding
    }

    /// Jaccard overlap between this link's fact-pattern tags and the given ones.
    pub fn fact_overlap(&self, tags: &[String]) -> f64 {
        if self.fact_pattern_tags.is_empty() || tags.is_empty() {
            return 0.0;
        }
        let ours: HashSet<&str> = self.fact_pattern_tags.iter().map(String::as_str).collect();
        let theirs: HashSet<&str> = tags.iter().map(String::as_str).collect();
        let intersection = ours.intersection(&theirs).count();
        let union = ours.union(&theirs).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Marks the link as verified by the given reviewer.
    pub fn verify(&mut self, by: impl Into<String>) {
        self.verified = true;
        self.verified_by = Some(by.into());
        self.verified_at = Some(Utc::now());
    }

    /// Range-checks the link's numeric fields.
    pub fn validate(&self) -> Result<(), LinkStoreError> {
        if !(MIN_BOOST..=MAX_BOOST).contains(&self.boost_factor) {
            return Err(LinkStoreError::BoostOutOfRange {
                statute_id: self.statute_id.clone(),
                case_id: self.case_id.clone(),
                boost: self.boost_factor,
            });
        }
        for (field, value) in [
            ("applicability_score", self.applicability_score),
            ("confidence", self.confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LinkStoreError::ScoreOutOfRange {
                    statute_id: self.statute_id.clone(),
                    case_id: self.case_id.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`InterpretationLink`].
#[derive(Debug, Clone)]
pub struct InterpretationLinkBuilder {
    link: InterpretationLink,
}

impl InterpretationLinkBuilder {
    fn new(statute_id: impl Into<String>, case_id: impl Into<String>) -> Self {
        Self {
            link: InterpretationLink {
                statute_id: statute_id.into(),
                case_id: case_id.into(),
                statute_name: String::new(),
                statute_section: String::new(),
                case_citation: String::new(),
                case_para_no: 0,
                court: None,
                year: None,
                interpretation_type: InterpretationType::Apply,
                authority: Authority::Persuasive,
                holding: String::new(),
                fact_pattern_tags: Vec::new(),
                cause_of_action: None,
                applicability_score: 0.7,
                boost_factor: Authority::Persuasive.default_boost(),
                verified: false,
                verified_by: None,
                verified_at: None,
                extraction_method: ExtractionMethod::Manual,
                confidence: 1.0,
                created_at: Utc::now(),
            },
        }
    }

    /// Sets the denormalized statute details.
    #[must_use]
    pub fn statute(mut self, name: impl Into<String>, section: impl Into<String>) -> Self {
        self.link.statute_name = name.into();
        self.link.statute_section = section.into();
        self
    }

    /// Sets the denormalized case details.
    #[must_use]
    pub fn case(mut self, citation: impl Into<String>, para_no: u32) -> Self {
        self.link.case_citation = citation.into();
        self.link.case_para_no = para_no;
        self
    }

    /// Sets the deciding court and year.
    #[must_use]
    pub fn court(mut self, court: impl Into<String>, year: i32) -> Self {
        self.link.court = Some(court.into());
        self.link.year = Some(year);
        self
    }

    /// Sets the interpretation metadata; the boost defaults from authority.
    #[must_use]
    pub fn interpretation(
        mut self,
        interpretation_type: InterpretationType,
        authority: Authority,
        holding: impl Into<String>,
    ) -> Self {
        self.link.interpretation_type = interpretation_type;
        self.link.authority = authority;
        self.link.holding = holding.into();
        self.link.boost_factor = authority.default_boost();
        self
    }

    /// Sets the fact-pattern metadata.
    #[must_use]
    pub fn fact_pattern(
        mut self,
        tags: Vec<String>,
        applicability_score: f64,
        cause_of_action: Option<String>,
    ) -> Self {
        self.link.fact_pattern_tags = tags;
        self.link.applicability_score = applicability_score;
        self.link.cause_of_action = cause_of_action;
        self
    }

    /// Overrides the boost factor.
    #[must_use]
    pub fn boost(mut self, boost_factor: f64) -> Self {
        self.link.boost_factor = boost_factor;
        self
    }

    /// Sets the extraction provenance.
    #[must_use]
    pub fn extraction(mut self, method: ExtractionMethod, confidence: f64) -> Self {
        self.link.extraction_method = method;
        self.link.confidence = confidence;
        self
    }

    /// Marks the link as verified.
    #[must_use]
    pub fn verified(mut self, by: impl Into<String>) -> Self {
        self.link.verify(by);
        self
    }

    /// Finishes the builder, range-checking numeric fields.
    pub fn build(self) -> Result<InterpretationLink, LinkStoreError> {
        self.link.validate()?;
        Ok(self.link)
    }
}

/// Relational-style table of interpretation links with secondary indexes.
///
/// `(statute_id, case_id)` pairs are unique; re-inserting a pair keeps the
/// higher-confidence record (re-extraction merge semantics).
#[derive(Debug, Default)]
pub struct LinkStore {
    links: Vec<InterpretationLink>,
    by_pair: HashMap<(String, String), usize>,
    by_statute: HashMap<String, Vec<usize>>,
    by_case: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
    verified_idx: HashSet<usize>,
}

impl LinkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of links in the store.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Iterates over all links.
    pub fn iter(&self) -> impl Iterator<Item = &InterpretationLink> {
        self.links.iter()
    }

    /// Upserts a link.
    ///
    /// If the `(statute_id, case_id)` pair already exists, the record with
    /// the higher extraction confidence wins. Returns whether the store
    /// changed.
    pub fn upsert(&mut self, link: InterpretationLink) -> Result<bool, LinkStoreError> {
        link.validate()?;
        let key = (link.statute_id.clone(), link.case_id.clone());

        if let Some(&idx) = self.by_pair.get(&key) {
            if link.confidence > self.links[idx].confidence {
                tracing::debug!(
                    statute = %link.statute_id,
                    case = %link.case_id,
                    "replacing link with higher-confidence extraction"
                );
                if link.verified {
                    self.verified_idx.insert(idx);
                } else {
                    self.verified_idx.remove(&idx);
                }
                self.reindex_tags(idx, &link);
                self.links[idx] = link;
                return Ok(true);
            }
            return Ok(false);
        }

        let idx = self.links.len();
        self.by_pair.insert(key, idx);
        self.by_statute
            .entry(link.statute_id.clone())
            .or_default()
            .push(idx);
        self.by_case
            .entry(link.case_id.clone())
            .or_default()
            .push(idx);
        for tag in &link.fact_pattern_tags {
            self.by_tag.entry(tag.clone()).or_default().push(idx);
        }
        if link.verified {
            self.verified_idx.insert(idx);
        }
        self.links.push(link);
        Ok(true)
    }

    fn reindex_tags(&mut self, idx: usize, new_link: &InterpretationLink) {
        for indexes in self.by_tag.values_mut() {
            indexes.retain(|&i| i != idx);
        }
        for tag in &new_link.fact_pattern_tags {
            self.by_tag.entry(tag.clone()).or_default().push(idx);
        }
    }

    /// Links whose statute is one of `statute_ids`, ordered by
    /// `boost_factor` descending then `applicability_score` descending.
    pub fn links_for_statutes(
        &self,
        statute_ids: &[String],
        verified_only: bool,
    ) -> Vec<&InterpretationLink> {
        let mut out: Vec<&InterpretationLink> = Vec::new();
        for statute_id in statute_ids {
            if let Some(indexes) = self.by_statute.get(statute_id) {
                for &idx in indexes {
                    if verified_only && !self.verified_idx.contains(&idx) {
                        continue;
                    }
                    out.push(&self.links[idx]);
                }
            }
        }
        out.sort_by(|a, b| {
            b.boost_factor
                .partial_cmp(&a.boost_factor)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.applicability_score
                        .partial_cmp(&a.applicability_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        out
    }

    /// Links whose interpreting case is `case_id`.
    pub fn links_for_case(&self, case_id: &str) -> Vec<&InterpretationLink> {
        self.by_case
            .get(case_id)
            .map(|indexes| indexes.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// Links carrying the given authority.
    pub fn links_with_authority(&self, authority: Authority) -> Vec<&InterpretationLink> {
        self.links
            .iter()
            .filter(|l| l.authority == authority)
            .collect()
    }

    /// Links whose fact-pattern tags contain `tag`.
    pub fn links_with_tag(&self, tag: &str) -> Vec<&InterpretationLink> {
        self.by_tag
            .get(tag)
            .map(|indexes| indexes.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// Finds the link backing an interpretation claim.
    ///
    /// Matches on a normalized case citation, the statute section, and a
    /// loose statute-name comparison (case-insensitive containment either
    /// way), mirroring how claims come out of generated answers.
    pub fn find_link(
        &self,
        case_citation: &str,
        statute_name: &str,
        statute_section: &str,
    ) -> Option<&InterpretationLink> {
        let wanted_citation = normalize_citation(case_citation);
        let wanted_name = statute_name.trim().to_lowercase();
        let wanted_section = statute_section.trim().to_lowercase();

        self.links.iter().find(|link| {
            if normalize_citation(&link.case_citation) != wanted_citation {
                return false;
            }
            if link.statute_section.trim().to_lowercase() != wanted_section {
                return false;
            }
            let link_name = link.statute_name.trim().to_lowercase();
            link_name.contains(&wanted_name) || wanted_name.contains(&link_name)
        })
    }

    /// Checks that every link references documents present in `store`.
    pub fn validate_references(&self, store: &DocumentStore) -> Result<(), LinkStoreError> {
        for link in &self.links {
            if !store.contains(&link.statute_id) {
                return Err(LinkStoreError::UnknownDocument(link.statute_id.clone()));
            }
            if !store.contains(&link.case_id) {
                return Err(LinkStoreError::UnknownDocument(link.case_id.clone()));
            }
        }
        Ok(())
    }

    /// Persists all links to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), LinkStoreError> {
        let json = serde_json::to_string_pretty(&self.links)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads links from a JSON file written by [`LinkStore::save`] (or a
    /// curated link list in the same shape).
    pub fn load(path: &Path) -> Result<Self, LinkStoreError> {
        let json = std::fs::read_to_string(path)?;
        let links: Vec<InterpretationLink> = serde_json::from_str(&json)?;
        let mut store = Self::new();
        for link in links {
            store.upsert(link)?;
        }
        Ok(store)
    }
}

/// Collapses whitespace and case so `[2013]  SGCA 36` matches `[2013] SGCA 36`.
fn normalize_citation(citation: &str) -> String {
    citation
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
