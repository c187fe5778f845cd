//! Hierarchical document model for the legal corpus.
//!
//! A corpus is a forest of document trees. Each source (an Act, a judgment,
//! a Rules book) contributes exactly one root at level 0; descendants sit at
//! levels 1–3 with `level(child) = level(parent) + 1`:
//!
//! | Level | Statute | Case | Rule |
//! |-------|-------------|-----------|----------|
//! | 0 | Act | Judgment | Rules book |
//! | 1 | Section | Paragraph | Order |
//! | 2 | Subsection | | Rule |
//! | 3 | | | Sub-rule |
//!
//! Statute sections (level 1) must carry a `section_number`; case paragraphs
//! (level 1) must carry a `para_no`. Content is deduplicated by a SHA-256
//! digest of the node's full text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Maximum tree depth; levels are 0 through 3 inclusive.
pub const MAX_LEVEL: u8 = 3;

/// Kind of legal source a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    /// Act of Parliament and its sections/subsections.
    Statute,
    /// Court judgment and its numbered paragraphs.
    Case,
    /// Rules of Court book, Orders, Rules and sub-rules.
    Rule,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocType::Statute => write!(f, "statute"),
            DocType::Case => write!(f, "case"),
            DocType::Rule => write!(f, "rule"),
        }
    }
}

/// Errors raised by document-level invariant checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document {id}: level {level} exceeds maximum 3")]
    LevelOutOfRange { id: String, level: u8 },

    #[error("document {id}: level {level} requires a parent_id")]
    MissingParent { id: String, level: u8 },

    #[error("document {id}: root documents must not have a parent_id")]
    RootWithParent { id: String },

    #[error("statute section {id} is missing a section_number")]
    MissingSectionNumber { id: String },

    #[error("case paragraph {id} is missing a para_no")]
    MissingParaNo { id: String },

    #[error("document {id} has empty full_text")]
    EmptyText { id: String },
}

/// One node in the corpus tree.
///
/// Statute-, case- and rule-specific attributes are optional fields rather
/// than enum variants so a single relational row maps onto one record; the
/// [`Document::validate`] method enforces which fields are required at which
/// level for which type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (a normalized slug, e.g. `misrepresentation_act_s2`)
    pub id: String,
    /// Kind of legal source
    pub doc_type: DocType,
    /// Depth in the tree (0 = root)
    pub level: u8,
    /// Parent document id; present iff `level > 0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Human-readable title or heading
    pub title: String,
    /// Full text of this node
    pub full_text: String,
    /// SHA-256 digest of `full_text`, lowercase hex
    pub hash: String,

    // Statute fields
    /// Name of the Act (statutes and rules)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_name: Option<String>,
    /// Section number within the Act (statute level 1+), or Order/Rule number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_number: Option<String>,
    /// Subsection label, e.g. `1` or `a` (statute level 2)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,

    // Case fields
    /// Neutral citation, e.g. `[2013] SGCA 36`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    /// Court abbreviation, e.g. `SGCA`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    /// Year of decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Party names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parties: Option<String>,
    /// Paragraph number (case level 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub para_no: Option<u32>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a new document; the content hash is derived from `full_text`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        doc_type: DocType,
        level: u8,
        title: impl Into<String>,
        full_text: impl Into<String>,
    ) -> Self {
        let full_text = full_text.into();
        let hash = content_hash(&full_text);
        let now = Utc::now();
        Self {
            id: id.into(),
            doc_type,
            level,
            parent_id: None,
            title: title.into(),
            full_text,
            hash,
            act_name: None,
            section_number: None,
            subsection: None,
            citation: None,
            court: None,
            year: None,
            parties: None,
            para_no: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the parent document id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the Act name.
    #[must_use]
    pub fn with_act_name(mut self, act_name: impl Into<String>) -> Self {
        self.act_name = Some(act_name.into());
        self
    }

    /// Sets the section number.
    #[must_use]
    pub fn with_section_number(mut self, section_number: impl Into<String>) -> Self {
        self.section_number = Some(section_number.into());
        self
    }

    /// Sets the subsection label.
    #[must_use]
    pub fn with_subsection(mut self, subsection: impl Into<String>) -> Self {
        self.subsection = Some(subsection.into());
        self
    }

    /// Sets the case citation.
    #[must_use]
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citation = Some(citation.into());
        self
    }

    /// Sets the deciding court.
    #[must_use]
    pub fn with_court(mut self, court: impl Into<String>) -> Self {
        self.court = Some(court.into());
        self
    }

    /// Sets the decision year.
    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Sets the party names.
    #[must_use]
    pub fn with_parties(mut self, parties: impl Into<String>) -> Self {
        self.parties = Some(parties.into());
        self
    }

    /// Sets the paragraph number.
    #[must_use]
    pub fn with_para_no(mut self, para_no: u32) -> Self {
        self.para_no = Some(para_no);
        self
    }

    /// Whether this is a root node.
    pub fn is_root(&self) -> bool {
        self.level == 0
    }

    /// Checks node-local invariants.
    ///
    /// Cross-document invariants (parent existence, hash uniqueness) are
    /// enforced by the store on insert.
    pub fn validate(&self) -> Vec<DocumentError> {
        let mut errors = Vec::new();

        if self.level > MAX_LEVEL {
            errors.push(DocumentError::LevelOutOfRange {
                id: self.id.clone(),
                level: self.level,
            });
        }

        match (self.level, &self.parent_id) {
            (0, Some(_)) => errors.push(DocumentError::RootWithParent {
                id: self.id.clone(),
            }),
            (l, None) if l > 0 => errors.push(DocumentError::MissingParent {
                id: self.id.clone(),
                level: l,
            }),
            _ => {}
        }

        if self.level == 1 {
            match self.doc_type {
                DocType::Statute if self.section_number.is_none() => {
                    errors.push(DocumentError::MissingSectionNumber {
                        id: self.id.clone(),
                    });
                }
                DocType::Case if self.para_no.is_none() => {
                    errors.push(DocumentError::MissingParaNo {
                        id: self.id.clone(),
                    });
                }
                _ => {}
            }
        }

        if self.full_text.trim().is_empty() {
            errors.push(DocumentError::EmptyText {
                id: self.id.clone(),
            });
        }

        errors
    }
}

/// Projection of a [`Document`] used by the retrieval indexes.
///
/// Ingestion populates both the document store and the indexes; retrieval
/// only ever reads index units plus the documents they point back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexUnit {
    /// Same id as the backing document
    pub unit_id: String,
    /// Kind of legal source
    pub doc_type: DocType,
    /// Title or heading (boosted in lexical scoring)
    pub title: String,
    /// Searchable body text
    pub text: String,
    /// Case citation, if any (boosted in lexical scoring)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    /// Court abbreviation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    /// Year of decision, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Paragraph number, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub para_no: Option<u32>,
}

impl IndexUnit {
    /// Projects a document into its retrieval view.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            unit_id: doc.id.clone(),
            doc_type: doc.doc_type,
            title: doc.title.clone(),
            text: doc.full_text.clone(),
            citation: doc.citation.clone(),
            court: doc.court.clone(),
            year: doc.year,
            para_no: doc.para_no,
        }
    }
}

/// SHA-256 content digest as lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = content_hash("Where a person has entered into a contract");
        let b = content_hash("Where a person has entered into a contract");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new(
            "misrepresentation_act_s2",
            DocType::Statute,
            1,
            "Damages for misrepresentation",
            "2. Where a person has entered into a contract...",
        )
        .with_parent("misrepresentation_act")
        .with_act_name("Misrepresentation Act")
        .with_section_number("2");

        assert_eq!(doc.level, 1);
        assert_eq!(doc.parent_id.as_deref(), Some("misrepresentation_act"));
        assert!(doc.validate().is_empty());
    }

    #[test]
    fn test_statute_section_requires_number() {
        let doc = Document::new("act_s1", DocType::Statute, 1, "Title", "text")
            .with_parent("act");
        let errors = doc.validate();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, DocumentError::MissingSectionNumber { .. }))
        );
    }

    #[test]
    fn test_case_paragraph_requires_para_no() {
        let doc = Document::new("c_para_1", DocType::Case, 1, "¶1", "The court held...")
            .with_parent("c")
            .with_citation("[2013] SGCA 36");
        let errors = doc.validate();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, DocumentError::MissingParaNo { .. }))
        );
    }

    #[test]
    fn test_root_must_not_have_parent() {
        let doc = Document::new("act", DocType::Statute, 0, "Act", "text").with_parent("other");
        let errors = doc.validate();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, DocumentError::RootWithParent { .. }))
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_hash_is_64_hex_chars(text in ".{0,500}") {
            let hash = content_hash(&text);
            proptest::prop_assert_eq!(hash.len(), 64);
            proptest::prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        }
    }

    #[test]
    fn test_index_unit_projection() {
        let doc = Document::new("c_para_5", DocType::Case, 1, "¶5", "Paragraph text")
            .with_parent("c")
            .with_citation("[2020] SGCA 48")
            .with_court("SGCA")
            .with_year(2020)
            .with_para_no(5);

        let unit = IndexUnit::from_document(&doc);
        assert_eq!(unit.unit_id, "c_para_5");
        assert_eq!(unit.citation.as_deref(), Some("[2020] SGCA 48"));
        assert_eq!(unit.para_no, Some(5));
    }
}
