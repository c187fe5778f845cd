//! In-process document repository with referential-integrity checks.
//!
//! The store is the arena of the arena-plus-id model: documents are owned
//! here, and everything else refers to them by id. Secondary indexes cover
//! the lookups the ingester, retriever and tree utilities need: by parent,
//! by content hash, and roots.
//!
//! Writers are offline jobs (ingest); query-time consumers only read. A
//! snapshot can be persisted to and reloaded from a JSON file, which is the
//! backing layout for the operator CLI.

use crate::document::{DocType, Document, IndexUnit};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document {id}: parent {parent_id} does not exist")]
    MissingParent { id: String, parent_id: String },

    #[error("document {id}: parent {parent_id} has level {parent_level}, expected {expected}")]
    LevelMismatch {
        id: String,
        parent_id: String,
        parent_level: u8,
        expected: u8,
    },

    #[error("document {id} duplicates content of {existing}")]
    DuplicateHash { id: String, existing: String },

    #[error("document {0} already exists")]
    AlreadyExists(String),

    #[error("document {id} failed invariant checks: {reasons}")]
    Invalid { id: String, reasons: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Allow two documents with identical content hashes
    pub allow_duplicates: bool,
    /// Replace an existing document with the same id instead of erroring
    pub overwrite_existing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            allow_duplicates: false,
            overwrite_existing: false,
        }
    }
}

/// Corpus statistics, as reported by the operator CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_documents: usize,
    pub statutes: usize,
    pub cases: usize,
    pub rules: usize,
    pub roots: usize,
    pub sections: usize,
    pub leaves_below_section: usize,
}

/// Document repository keyed by id.
#[derive(Debug, Default)]
pub struct DocumentStore {
    config: StoreConfig,
    docs: IndexMap<String, Document>,
    by_hash: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl DocumentStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of documents in the store.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Looks up a document by id.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    /// Looks up a document by id, erroring when absent.
    pub fn get_required(&self, id: &str) -> Result<&Document, StoreError> {
        self.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Whether a document with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Looks up a document by content hash.
    pub fn get_by_hash(&self, hash: &str) -> Option<&Document> {
        self.by_hash.get(hash).and_then(|id| self.docs.get(id))
    }

    /// Ids of the direct children of `id`, in insertion order.
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All root documents (level 0), in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = &Document> {
        self.docs.values().filter(|d| d.is_root())
    }

    /// Iterates over all documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    /// Inserts a document, enforcing node and referential invariants.
    ///
    /// - The document must pass [`Document::validate`].
    /// - A non-root document's parent must already be present, one level up.
    /// - Content hashes must be unique unless `allow_duplicates` is set.
    pub fn insert(&mut self, doc: Document) -> Result<(), StoreError> {
        let node_errors = doc.validate();
        if !node_errors.is_empty() {
            let reasons = node_errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StoreError::Invalid {
                id: doc.id.clone(),
                reasons,
            });
        }

        if self.docs.contains_key(&doc.id) && !self.config.overwrite_existing {
            return Err(StoreError::AlreadyExists(doc.id.clone()));
        }

        if let Some(parent_id) = &doc.parent_id {
            match self.docs.get(parent_id) {
                None => {
                    return Err(StoreError::MissingParent {
                        id: doc.id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
                Some(parent) if parent.level + 1 != doc.level => {
                    return Err(StoreError::LevelMismatch {
                        id: doc.id.clone(),
                        parent_id: parent_id.clone(),
                        parent_level: parent.level,
                        expected: doc.level.saturating_sub(1),
                    });
                }
                Some(_) => {}
            }
        }

        if !self.config.allow_duplicates {
            if let Some(existing) = self.by_hash.get(&doc.hash) {
                if existing != &doc.id {
                    return Err(StoreError::DuplicateHash {
                        id: doc.id.clone(),
                        existing: existing.clone(),
                    });
                }
            }
        }

        if let Some(previous) = self.docs.get(&doc.id) {
            self.by_hash.remove(&previous.hash);
        }
        if let Some(parent_id) = &doc.parent_id {
            let siblings = self.children.entry(parent_id.clone()).or_default();
            if !siblings.contains(&doc.id) {
                siblings.push(doc.id.clone());
            }
        }
        self.by_hash.insert(doc.hash.clone(), doc.id.clone());
        self.docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    /// Projects every document into its retrieval view.
    pub fn index_units(&self) -> Vec<IndexUnit> {
        self.docs.values().map(IndexUnit::from_document).collect()
    }

    /// Corpus statistics by type and level.
    pub fn statistics(&self) -> StoreStatistics {
        let mut stats = StoreStatistics {
            total_documents: self.docs.len(),
            ..Default::default()
        };
        for doc in self.docs.values() {
            match doc.doc_type {
                DocType::Statute => stats.statutes += 1,
                DocType::Case => stats.cases += 1,
                DocType::Rule => stats.rules += 1,
            }
            match doc.level {
                0 => stats.roots += 1,
                1 => stats.sections += 1,
                _ => stats.leaves_below_section += 1,
            }
        }
        stats
    }

    /// Persists a JSON snapshot of the store.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let docs: Vec<&Document> = self.docs.values().collect();
        let json = serde_json::to_string_pretty(&docs)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a JSON snapshot written by [`DocumentStore::save`].
    ///
    /// Documents are replayed in ascending level order so parents precede
    /// children regardless of snapshot ordering.
    pub fn load(path: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        let mut docs: Vec<Document> = serde_json::from_str(&json)?;
        docs.sort_by_key(|d| d.level);

        let mut store = Self::with_config(config);
        for doc in docs {
            store.insert(doc)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocType;

    fn statute_tree() -> Vec<Document> {
        vec![
            Document::new("act", DocType::Statute, 0, "Misrepresentation Act", "full act text")
                .with_act_name("Misrepresentation Act"),
            Document::new("act_s2", DocType::Statute, 1, "Damages", "2. Where a person...")
                .with_parent("act")
                .with_act_name("Misrepresentation Act")
                .with_section_number("2"),
        ]
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = DocumentStore::new();
        for doc in statute_tree() {
            store.insert(doc).unwrap();
        }
        assert_eq!(store.len(), 2);
        assert!(store.get("act_s2").is_some());
        assert_eq!(store.children_of("act"), ["act_s2".to_string()]);
        assert_eq!(store.roots().count(), 1);
        assert!(matches!(
            store.get_required("act_s9"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_parent_rejected() {
        let mut store = DocumentStore::new();
        let orphan = Document::new("act_s9", DocType::Statute, 1, "Orphan", "9. text")
            .with_parent("missing_act")
            .with_section_number("9");
        let err = store.insert(orphan).unwrap_err();
        assert!(matches!(err, StoreError::MissingParent { .. }));
    }

    #[test]
    fn test_level_mismatch_rejected() {
        let mut store = DocumentStore::new();
        store
            .insert(Document::new("act", DocType::Statute, 0, "Act", "text"))
            .unwrap();
        let skipping = Document::new("act_s1_a", DocType::Statute, 2, "Sub", "sub text")
            .with_parent("act")
            .with_section_number("1")
            .with_subsection("a");
        let err = store.insert(skipping).unwrap_err();
        assert!(matches!(err, StoreError::LevelMismatch { .. }));
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let mut store = DocumentStore::new();
        store
            .insert(Document::new("a", DocType::Statute, 0, "A", "same text"))
            .unwrap();
        let err = store
            .insert(Document::new("b", DocType::Statute, 0, "B", "same text"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHash { .. }));
    }

    #[test]
    fn test_duplicate_hash_allowed_when_configured() {
        let mut store = DocumentStore::with_config(StoreConfig {
            allow_duplicates: true,
            overwrite_existing: false,
        });
        store
            .insert(Document::new("a", DocType::Statute, 0, "A", "same text"))
            .unwrap();
        store
            .insert(Document::new("b", DocType::Statute, 0, "B", "same text"))
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_statistics() {
        let mut store = DocumentStore::new();
        for doc in statute_tree() {
            store.insert(doc).unwrap();
        }
        let stats = store.statistics();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.statutes, 2);
        assert_eq!(stats.roots, 1);
        assert_eq!(stats.sections, 1);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");

        let mut store = DocumentStore::new();
        for doc in statute_tree() {
            store.insert(doc).unwrap();
        }
        store.save(&path).unwrap();

        let reloaded = DocumentStore::load(&path, StoreConfig::default()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get("act_s2").unwrap().section_number.as_deref(),
            Some("2")
        );
    }
}
