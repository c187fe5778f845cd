//! Lexlink-Ingest: corpus ingestion for the lexlink retrieval system.
//!
//! Turns raw legal source texts (statutes, judgments, Rules of Court) into
//! hierarchical [`Document`](lexlink_core::Document) trees and loads them
//! into the document store. The ingester consumes already-extracted plain
//! text; PDF decoding happens upstream.
//!
//! Parsing is resilient by design: section and paragraph headers in real
//! corpora come out of OCR with spacing and punctuation variations, so each
//! parser tries an ordered list of patterns with declining confidence and
//! keeps the one whose matches are most nearly sequential. Nodes that fail
//! invariant checks are skipped with a recorded reason rather than aborting
//! the batch; ingestion is idempotent via content-hash deduplication.

pub mod case;
pub mod extract;
pub mod pipeline;
pub mod rules;
pub mod segment;
pub mod statute;

pub use case::CaseParser;
pub use extract::RuleBasedLinkExtractor;
pub use pipeline::{IngestConfig, IngestPipeline, IngestReport, SkipRecord};
pub use rules::RulesParser;
pub use segment::{MatchKind, ParagraphMatcher, SectionMatcher, SegmentMatch};
pub use statute::StatuteParser;

use lexlink_core::DocType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("parse error in {source_path}: {message}")]
    Parse { source_path: String, message: String },

    #[error("no parser accepts {0}")]
    UnsupportedSource(String),

    #[error("store error: {0}")]
    Store(#[from] lexlink_core::StoreError),
}

/// Provenance of a raw source's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Born-digital plain text
    PlainText,
    /// Text recovered by OCR; header formats are less reliable
    OcrText,
}

/// A raw source document handed to the ingester.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path or logical name of the source (used for id/citation fallbacks)
    pub path: String,
    /// The full extracted text
    pub raw_text: String,
    /// Declared type, when the operator knows it
    pub declared_type: Option<DocType>,
    /// Provenance of the text
    pub format: SourceFormat,
}

impl SourceDocument {
    /// Creates a plain-text source.
    pub fn new(path: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            raw_text: raw_text.into(),
            declared_type: None,
            format: SourceFormat::PlainText,
        }
    }

    /// Declares the document type.
    #[must_use]
    pub fn with_declared_type(mut self, doc_type: DocType) -> Self {
        self.declared_type = Some(doc_type);
        self
    }

    /// Marks the text as OCR output.
    #[must_use]
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    /// File stem of the source path, without extension.
    pub fn file_stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }
}

/// A parser for one kind of legal source.
pub trait DocumentParser {
    /// Whether this parser can handle the source.
    fn supports(&self, source: &SourceDocument) -> bool;

    /// Parses the source into documents, parents before children.
    fn parse(&self, source: &SourceDocument) -> Result<Vec<lexlink_core::Document>, IngestError>;
}

/// Lowercases and collapses a name into an id slug.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}
