//! Ingestion pipeline: source → parser → store, with per-node outcomes.
//!
//! Per-node failures are recorded, never raised: an invalid section is
//! skipped with a reason while the root and its valid siblings still land.
//! Ingestion is idempotent: a document whose content hash already exists
//! in the store is skipped (configurable), so re-running a source inserts
//! nothing new.

use crate::case::CaseParser;
use crate::rules::RulesParser;
use crate::statute::StatuteParser;
use crate::{DocumentParser, IngestError, SourceDocument};
use chrono::{DateTime, Utc};
use lexlink_core::{DocType, Document, DocumentStore, StoreError};
use serde::{Deserialize, Serialize};

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum characters of source text stored on a root document
    pub max_root_text: usize,
    /// Skip (rather than error on) documents whose hash already exists
    pub skip_existing: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_root_text: 200_000,
            skip_existing: true,
        }
    }
}

/// Why a parsed node was not inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRecord {
    /// Document id of the skipped node
    pub doc_id: String,
    /// Human-readable reason
    pub reason: String,
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Source path or logical name
    pub source: String,
    /// Ids inserted, parents before children
    pub inserted: Vec<String>,
    /// Nodes skipped with reasons
    pub skipped: Vec<SkipRecord>,
    /// Errors that did not abort the batch
    pub errors: Vec<String>,
    /// When ingestion of this source started
    pub started_at: DateTime<Utc>,
    /// When it finished
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    fn new(source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            source: source.into(),
            inserted: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn skip(&mut self, doc_id: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkipRecord {
            doc_id: doc_id.into(),
            reason: reason.into(),
        });
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} inserted, {} skipped, {} errors",
            self.source,
            self.inserted.len(),
            self.skipped.len(),
            self.errors.len()
        )
    }
}

/// Parses sources and loads the resulting trees into a document store.
pub struct IngestPipeline {
    config: IngestConfig,
    statute_parser: StatuteParser,
    case_parser: CaseParser,
    rules_parser: RulesParser,
}

impl IngestPipeline {
    /// Creates a pipeline with the given configuration.
    pub fn new(config: IngestConfig) -> Self {
        let max = config.max_root_text;
        Self {
            config,
            statute_parser: StatuteParser::new(max),
            case_parser: CaseParser::new(max),
            rules_parser: RulesParser::default(),
        }
    }

    fn parser_for(&self, source: &SourceDocument) -> Option<&dyn DocumentParser> {
        match source.declared_type {
            Some(DocType::Statute) => return Some(&self.statute_parser),
            Some(DocType::Case) => return Some(&self.case_parser),
            Some(DocType::Rule) => return Some(&self.rules_parser),
            None => {}
        }
        if self.rules_parser.supports(source) {
            Some(&self.rules_parser)
        } else if self.case_parser.supports(source) {
            Some(&self.case_parser)
        } else if self.statute_parser.supports(source) {
            Some(&self.statute_parser)
        } else {
            None
        }
    }

    /// Parses one source into documents, parents before children.
    pub fn parse(&self, source: &SourceDocument) -> Result<Vec<Document>, IngestError> {
        let parser = self
            .parser_for(source)
            .ok_or_else(|| IngestError::UnsupportedSource(source.path.clone()))?;
        let mut documents = parser.parse(source)?;
        documents.sort_by_key(|d| d.level);
        Ok(documents)
    }

    /// Parses a source and loads it into the store, recording per-node
    /// outcomes.
    pub fn ingest(
        &self,
        source: &SourceDocument,
        store: &mut DocumentStore,
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::new(&source.path);
        let documents = self.parse(source)?;

        tracing::info!(source = %source.path, parsed = documents.len(), "loading parsed documents");

        for doc in documents {
            let doc_id = doc.id.clone();
            let node_errors = doc.validate();
            if !node_errors.is_empty() {
                let reason = node_errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                report.skip(&doc_id, reason);
                continue;
            }

            if self.config.skip_existing {
                if let Some(existing) = store.get_by_hash(&doc.hash) {
                    report.skip(&doc_id, format!("duplicate of {}", existing.id));
                    continue;
                }
            }

            match store.insert(doc) {
                Ok(()) => report.inserted.push(doc_id),
                Err(StoreError::MissingParent { parent_id, .. }) => {
                    report.skip(&doc_id, format!("parent {parent_id} not found"));
                }
                Err(StoreError::AlreadyExists(_)) => {
                    report.skip(&doc_id, "already exists");
                }
                Err(StoreError::DuplicateHash { existing, .. }) => {
                    report.skip(&doc_id, format!("duplicate of {existing}"));
                }
                Err(other) => {
                    tracing::warn!(doc = %doc_id, error = %other, "insert failed");
                    report.errors.push(format!("{doc_id}: {other}"));
                }
            }
        }

        report.finished_at = Utc::now();
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Ingests several sources in order.
    pub fn ingest_all(
        &self,
        sources: &[SourceDocument],
        store: &mut DocumentStore,
    ) -> Vec<Result<IngestReport, IngestError>> {
        sources
            .iter()
            .map(|source| self.ingest(source, store))
            .collect()
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(IngestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUTE_RAW: &str = "\
MISREPRESENTATION ACT

[12 March 1967]

1.Where a person has entered into a contract after a misrepresentation has been made to him the agreement remains binding subject to the provisions of this Act.
2.Where a person has entered into a contract after a misrepresentation has been made to him by another party thereto and he has suffered loss, that other party shall be liable to damages.
";

    const CASE_RAW: &str = "\
Tan Ah Kow v Lim Boon Keng [2013] SGCA 36

1  The appellant entered into a deed of settlement with the respondent before the proceedings commenced below.
2  The central question was whether silence can amount to an actionable misrepresentation in these circumstances.
";

    fn statute_source() -> SourceDocument {
        SourceDocument::new("acts/misrepresentation_act.txt", STATUTE_RAW)
            .with_declared_type(DocType::Statute)
    }

    fn case_source() -> SourceDocument {
        SourceDocument::new("cases/Tan Ah Kow v Lim Boon Keng [2013] SGCA 36.txt", CASE_RAW)
            .with_declared_type(DocType::Case)
    }

    #[test]
    fn test_ingest_statute_and_case() {
        let pipeline = IngestPipeline::default();
        let mut store = DocumentStore::new();

        let report = pipeline.ingest(&statute_source(), &mut store).unwrap();
        assert!(report.errors.is_empty());
        assert!(report.inserted.contains(&"misrepresentation_act".to_string()));
        assert!(report.inserted.contains(&"misrepresentation_act_s2".to_string()));

        let report = pipeline.ingest(&case_source(), &mut store).unwrap();
        assert!(report.inserted.contains(&"2013_sgca_36_para_2".to_string()));
        assert_eq!(store.statistics().cases, 3);
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let pipeline = IngestPipeline::default();
        let mut store = DocumentStore::new();

        let first = pipeline.ingest(&statute_source(), &mut store).unwrap();
        let inserted_first = first.inserted.len();
        assert!(inserted_first > 0);

        let second = pipeline.ingest(&statute_source(), &mut store).unwrap();
        assert!(second.inserted.is_empty(), "second run inserted {:?}", second.inserted);
        assert_eq!(second.skipped.len(), inserted_first);
        assert_eq!(store.len(), inserted_first);
    }

    #[test]
    fn test_autodetect_parser() {
        let pipeline = IngestPipeline::default();
        let source = SourceDocument::new(
            "cases/Tan Ah Kow v Lim Boon Keng [2013] SGCA 36.txt",
            CASE_RAW,
        );
        let docs = pipeline.parse(&source).unwrap();
        assert_eq!(docs[0].doc_type, DocType::Case);
    }

    #[test]
    fn test_unsupported_source() {
        let pipeline = IngestPipeline::default();
        let source = SourceDocument::new("notes.txt", "just some prose without structure");
        let err = pipeline.parse(&source).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedSource(_)));
    }

    #[test]
    fn test_parents_inserted_before_children() {
        let pipeline = IngestPipeline::default();
        let mut store = DocumentStore::new();
        let report = pipeline.ingest(&statute_source(), &mut store).unwrap();
        // No child should have been skipped for a missing parent.
        assert!(
            report
                .skipped
                .iter()
                .all(|s| !s.reason.contains("parent")),
            "{:?}",
            report.skipped
        );
    }
}
