//! Case parser: judgment → numbered paragraphs.

use crate::segment::ParagraphMatcher;
use crate::{DocumentParser, IngestError, SourceDocument, slugify};
use lexlink_core::{DocType, Document};
use regex::Regex;

/// Parses judgments into a two-level hierarchy: the judgment root (level 0)
/// and numbered paragraphs (level 1).
///
/// The neutral citation and party names are taken from the filename when
/// present there, falling back to the first lines of the text.
pub struct CaseParser {
    paragraphs: ParagraphMatcher,
    citation_pattern: Regex,
    max_root_text: usize,
}

impl CaseParser {
    /// Creates a parser with the given cap on stored root text.
    pub fn new(max_root_text: usize) -> Self {
        Self {
            paragraphs: ParagraphMatcher::new(),
            citation_pattern: Regex::new(r"\[(\d{4})\]\s+([A-Z]+(?:\([A-Z]+\))?)\s+(\d+)")
                .expect("valid regex"),
            max_root_text: max_root_text.max(1),
        }
    }

    fn extract_citation(&self, source: &SourceDocument) -> Option<String> {
        if let Some(m) = self.citation_pattern.find(source.file_stem()) {
            return Some(m.as_str().to_string());
        }
        for line in source.raw_text.lines().take(10) {
            if let Some(m) = self.citation_pattern.find(line) {
                return Some(m.as_str().to_string());
            }
        }
        None
    }

    fn extract_parties(&self, source: &SourceDocument) -> Option<String> {
        let from_stem = self
            .citation_pattern
            .replace_all(source.file_stem(), "")
            .trim()
            .trim_matches(|c: char| c == '-' || c == '_')
            .trim()
            .to_string();
        if !from_stem.is_empty() {
            return Some(from_stem);
        }
        let first_line = source.raw_text.lines().next().unwrap_or_default();
        let from_text = self
            .citation_pattern
            .replace_all(first_line, "")
            .trim()
            .to_string();
        if from_text.is_empty() {
            None
        } else {
            Some(from_text)
        }
    }

    fn court_and_year(&self, citation: &str) -> (Option<String>, Option<i32>) {
        match self.citation_pattern.captures(citation) {
            Some(caps) => {
                let year = caps.get(1).and_then(|m| m.as_str().parse().ok());
                let court = caps.get(2).map(|m| m.as_str().to_string());
                (court, year)
            }
            None => (None, None),
        }
    }
}

impl Default for CaseParser {
    fn default() -> Self {
        Self::new(200_000)
    }
}

impl DocumentParser for CaseParser {
    fn supports(&self, source: &SourceDocument) -> bool {
        if source.declared_type == Some(DocType::Case) {
            return true;
        }
        let head: String = source.raw_text.chars().take(2000).collect();
        self.citation_pattern.is_match(&head) || self.citation_pattern.is_match(&source.path)
    }

    fn parse(&self, source: &SourceDocument) -> Result<Vec<Document>, IngestError> {
        let text = source.raw_text.trim();
        if text.is_empty() {
            return Err(IngestError::Parse {
                source_path: source.path.clone(),
                message: "empty source text".into(),
            });
        }

        let citation = self
            .extract_citation(source)
            .unwrap_or_else(|| source.file_stem().to_string());
        let parties = self.extract_parties(source);
        let (court, year) = self.court_and_year(&citation);
        let case_id = slugify(&citation);
        let root_text: String = text.chars().take(self.max_root_text).collect();

        let mut root = Document::new(&case_id, DocType::Case, 0, &citation, root_text)
            .with_citation(&citation);
        if let Some(parties) = &parties {
            root = root.with_parties(parties);
        }
        if let Some(court) = &court {
            root = root.with_court(court);
        }
        if let Some(year) = year {
            root = root.with_year(year);
        }
        let mut documents = vec![root];

        let paragraphs = self.paragraphs.find_paragraphs(text);
        if paragraphs.is_empty() {
            tracing::warn!(source = %source.path, citation = %citation, "no paragraphs recognized");
        }

        for para in &paragraphs {
            let Ok(para_no) = para.number.parse::<u32>() else {
                continue;
            };
            let para_id = format!("{case_id}_para_{para_no}");
            let preview: String = para
                .text
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(100)
                .collect();
            let title = format!("¶{para_no}: {preview}");

            let mut doc = Document::new(&para_id, DocType::Case, 1, title, &para.text)
                .with_parent(&case_id)
                .with_citation(&citation)
                .with_para_no(para_no);
            if let Some(parties) = &parties {
                doc = doc.with_parties(parties);
            }
            if let Some(court) = &court {
                doc = doc.with_court(court);
            }
            if let Some(year) = year {
                doc = doc.with_year(year);
            }
            documents.push(doc);
        }

        tracing::debug!(
            source = %source.path,
            citation = %citation,
            documents = documents.len(),
            "parsed case"
        );
        Ok(documents)
    }
}
