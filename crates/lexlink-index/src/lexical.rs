//! Multi-field BM25 inverted index.
//!
//! Each index unit contributes three fields: `title` (boost 2.0), `text`
//! (1.0) and `citation` (1.5). A query is scored per field with BM25
//! (k1 = 1.2, b = 0.75) and the fields are combined best-field style: the
//! top field counts fully, the others at a tie-break weight of 0.3.

use crate::analyzer::Analyzer;
use crate::{IndexError, SearchHit};
use lexlink_core::IndexUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// Per-field score multipliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBoosts {
    pub title: f64,
    pub text: f64,
    pub citation: f64,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            title: 2.0,
            text: 1.0,
            citation: 1.5,
        }
    }
}

/// Weight of non-best fields in the combined score.
const TIE_BREAKER: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum Field {
    Title,
    Text,
    Citation,
}

const FIELDS: [Field; 3] = [Field::Title, Field::Text, Field::Citation];

/// One field's inverted index: term → (doc ordinal, term frequency).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FieldIndex {
    postings: HashMap<String, Vec<(u32, u32)>>,
    lengths: Vec<u32>,
    total_len: u64,
}

impl FieldIndex {
    fn avg_len(&self) -> f64 {
        if self.lengths.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.lengths.len() as f64
        }
    }

    fn add_document(&mut self, ordinal: u32, tokens: &[String]) {
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }
        for (term, tf) in counts {
            self.postings
                .entry(term.to_string())
                .or_default()
                .push((ordinal, tf));
        }
        self.lengths.push(tokens.len() as u32);
        self.total_len += tokens.len() as u64;
    }

    /// Accumulates BM25 contributions for one query term into `scores`.
    fn score_term(&self, term: &str, doc_count: usize, scores: &mut HashMap<u32, f64>) {
        let Some(postings) = self.postings.get(term) else {
            return;
        };
        let df = postings.len() as f64;
        let n = doc_count as f64;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        let avg_len = self.avg_len();

        for &(ordinal, tf) in postings {
            let len = self.lengths[ordinal as usize] as f64;
            let tf = tf as f64;
            let norm = if avg_len > 0.0 { len / avg_len } else { 1.0 };
            let contribution = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * norm));
            *scores.entry(ordinal).or_default() += contribution;
        }
    }
}

/// Immutable lexical index over a corpus snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalIndex {
    unit_ids: Vec<String>,
    title: FieldIndex,
    text: FieldIndex,
    citation: FieldIndex,
    boosts: FieldBoosts,
}

impl LexicalIndex {
    /// Number of indexed units.
    pub fn len(&self) -> usize {
        self.unit_ids.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.unit_ids.is_empty()
    }

    fn field(&self, field: Field) -> &FieldIndex {
        match field {
            Field::Title => &self.title,
            Field::Text => &self.text,
            Field::Citation => &self.citation,
        }
    }

    fn boost(&self, field: Field) -> f64 {
        match field {
            Field::Title => self.boosts.title,
            Field::Text => self.boosts.text,
            Field::Citation => self.boosts.citation,
        }
    }

    /// Scores the query against all units, returning the top `k` hits.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }

        let analyzer = Analyzer::new();
        let terms = analyzer.tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let doc_count = self.unit_ids.len();
        let mut per_field: Vec<HashMap<u32, f64>> = Vec::with_capacity(FIELDS.len());
        for field in FIELDS {
            let mut scores = HashMap::new();
            for term in &terms {
                self.field(field).score_term(term, doc_count, &mut scores);
            }
            let boost = self.boost(field);
            for value in scores.values_mut() {
                *value *= boost;
            }
            per_field.push(scores);
        }

        // Best-field combination with tie-breaker.
        let mut combined: HashMap<u32, f64> = HashMap::new();
        let mut touched: Vec<u32> = per_field
            .iter()
            .flat_map(|scores| scores.keys().copied())
            .collect();
        touched.sort_unstable();
        touched.dedup();

        for ordinal in touched {
            let mut field_scores: Vec<f64> = per_field
                .iter()
                .filter_map(|scores| scores.get(&ordinal).copied())
                .collect();
            field_scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            let best = field_scores[0];
            let rest: f64 = field_scores[1..].iter().sum();
            combined.insert(ordinal, best + TIE_BREAKER * rest);
        }

        let mut hits: Vec<SearchHit> = combined
            .into_iter()
            .map(|(ordinal, score)| SearchHit::new(self.unit_ids[ordinal as usize].clone(), score))
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.unit_id.cmp(&b.unit_id))
        });
        hits.truncate(k);
        hits
    }

    /// Serializes the index to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads an index written by [`LexicalIndex::save`].
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Builds a [`LexicalIndex`] from index units.
#[derive(Debug, Default)]
pub struct LexicalIndexBuilder {
    boosts: FieldBoosts,
    units: Vec<IndexUnit>,
}

impl LexicalIndexBuilder {
    /// Creates a builder with default field boosts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the field boosts.
    #[must_use]
    pub fn with_boosts(mut self, boosts: FieldBoosts) -> Self {
        self.boosts = boosts;
        self
    }

    /// Adds a unit to the index.
    pub fn add(&mut self, unit: IndexUnit) {
        self.units.push(unit);
    }

    /// Adds many units.
    pub fn add_all(&mut self, units: impl IntoIterator<Item = IndexUnit>) {
        self.units.extend(units);
    }

    /// Tokenizes all units and finishes the index.
    pub fn build(self) -> LexicalIndex {
        let analyzer = Analyzer::new();
        let mut index = LexicalIndex {
            unit_ids: Vec::with_capacity(self.units.len()),
            title: FieldIndex::default(),
            text: FieldIndex::default(),
            citation: FieldIndex::default(),
            boosts: self.boosts,
        };

        for (ordinal, unit) in self.units.into_iter().enumerate() {
            let ordinal = ordinal as u32;
            index.title.add_document(ordinal, &analyzer.tokenize(&unit.title));
            index.text.add_document(ordinal, &analyzer.tokenize(&unit.text));
            let citation_tokens = unit
                .citation
                .as_deref()
                .map(|c| analyzer.tokenize(c))
                .unwrap_or_default();
            index.citation.add_document(ordinal, &citation_tokens);
            index.unit_ids.push(unit.unit_id);
        }

        tracing::debug!(units = index.unit_ids.len(), "built lexical index");
        index
    }
}
