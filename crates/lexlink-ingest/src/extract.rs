//! Rule-based interpretation-link extraction.
//!
//! An offline job that scans case paragraphs for sentences construing a
//! statutory provision ("… Section 2 of the Misrepresentation Act …") and
//! emits candidate links when the referenced provision exists in the
//! corpus. Candidates carry `RULE_BASED` provenance and a confidence
//! heuristic; they enter the store unverified and wait for a curator.

use lexlink_core::{
    Authority, DocType, DocumentStore, ExtractionMethod, InterpretationLink, InterpretationType,
    LinkStoreError,
};
use regex::Regex;

/// Extracts candidate links from case paragraphs against a corpus.
pub struct RuleBasedLinkExtractor {
    section_of_act: Regex,
    construe_verb: Regex,
    narrow_marker: Regex,
    broad_marker: Regex,
}

impl RuleBasedLinkExtractor {
    /// Creates an extractor.
    pub fn new() -> Self {
        Self {
            section_of_act: Regex::new(
                r"(?i)\bsection\s+(\d+[A-Z]?)(?:\(\d+\))?\s+of\s+the\s+((?:[A-Z][A-Za-z]*\s+)+Act)",
            )
            .expect("valid regex"),
            construe_verb: Regex::new(
                r"(?i)\b(construe[ds]?|interpret(?:ed|s)?|clarif(?:y|ied|ies)|held|holds)\b",
            )
            .expect("valid regex"),
            narrow_marker: Regex::new(r"(?i)\b(narrow(?:ly|ed|s)?|limited to|confined to)\b")
                .expect("valid regex"),
            broad_marker: Regex::new(r"(?i)\b(broad(?:ly|ened|er)?|extend(?:ed|s)?\s+to)\b")
                .expect("valid regex"),
        }
    }

    /// Scans every case paragraph in the store and returns candidate links
    /// for provisions that exist in the same store.
    pub fn extract(&self, store: &DocumentStore) -> Result<Vec<InterpretationLink>, LinkStoreError> {
        let mut candidates = Vec::new();

        for doc in store.iter() {
            if doc.doc_type != DocType::Case || doc.level != 1 {
                continue;
            }
            let Some(para_no) = doc.para_no else { continue };
            let Some(citation) = doc.citation.as_deref() else {
                continue;
            };

            for caps in self.section_of_act.captures_iter(&doc.full_text) {
                let section = caps.get(1).expect("group 1").as_str();
                let act = caps.get(2).expect("group 2").as_str().trim();

                let Some(statute) = self.find_provision(store, act, section) else {
                    tracing::debug!(case = %doc.id, act, section, "mentioned provision not in corpus");
                    continue;
                };

                let text = &doc.full_text;
                let construes = self.construe_verb.is_match(text);
                let interpretation_type = if self.narrow_marker.is_match(text) {
                    InterpretationType::Narrow
                } else if self.broad_marker.is_match(text) {
                    InterpretationType::Broad
                } else if construes {
                    InterpretationType::Clarify
                } else {
                    InterpretationType::Apply
                };

                // A bare mention is weak evidence; an interpretive verb in
                // the same paragraph strengthens it.
                let confidence = if construes { 0.75 } else { 0.45 };
                let authority = match doc.court.as_deref() {
                    Some("SGCA") => Authority::Binding,
                    _ => Authority::Persuasive,
                };

                let mut builder = InterpretationLink::builder(&statute.id, &doc.id)
                    .statute(act, section)
                    .case(citation, para_no)
                    .interpretation(
                        interpretation_type,
                        authority,
                        first_sentence(&doc.full_text),
                    )
                    .extraction(ExtractionMethod::RuleBased, confidence);
                if let (Some(court), Some(year)) = (doc.court.as_deref(), doc.year) {
                    builder = builder.court(court, year);
                }
                candidates.push(builder.build()?);
            }
        }

        tracing::info!(candidates = candidates.len(), "rule-based extraction complete");
        Ok(candidates)
    }

    /// Finds the statute section document for an Act name + section number.
    fn find_provision<'a>(
        &self,
        store: &'a DocumentStore,
        act: &str,
        section: &str,
    ) -> Option<&'a lexlink_core::Document> {
        let act_lower = act.to_lowercase();
        let section_lower = section.to_lowercase();
        store.iter().find(|doc| {
            doc.doc_type == DocType::Statute
                && doc.level == 1
                && doc
                    .section_number
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase() == section_lower)
                && doc
                    .act_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&act_lower)
                        || act_lower.contains(&name.to_lowercase()))
        })
    }
}

impl Default for RuleBasedLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.find(". ") {
        Some(position) => trimmed[..position + 1].to_string(),
        None => trimmed.chars().take(200).collect(),
    }
}
