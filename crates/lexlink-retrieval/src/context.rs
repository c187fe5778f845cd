//! Context formatting for the external generation layer.
//!
//! Results are grouped by source kind (statutory provisions first, then
//! case law, then anything else) and numbered continuously so the answer
//! can cite by number. Interpretive cases carry an explicit
//! `[INTERPRETS STATUTE: …]` marker, which the generation prompt treats as
//! a priority signal and the validator recognizes downstream.

use crate::RetrievedDoc;
use lexlink_core::DocType;

/// Characters of each document included in the context block.
const SNIPPET_BUDGET: usize = 1_000;

fn snippet(content: &str) -> &str {
    match content.char_indices().nth(SNIPPET_BUDGET) {
        Some((offset, _)) => &content[..offset],
        None => content,
    }
}

/// Renders ranked results into the numbered context block consumed by the
/// LLM-serving layer.
pub fn format_context(results: &[RetrievedDoc]) -> String {
    let statutes: Vec<&RetrievedDoc> = results
        .iter()
        .filter(|r| matches!(r.doc_type, DocType::Statute | DocType::Rule))
        .collect();
    let cases: Vec<&RetrievedDoc> = results
        .iter()
        .filter(|r| r.doc_type == DocType::Case)
        .collect();

    let mut lines: Vec<String> = Vec::new();
    let mut counter = 1usize;

    if !statutes.is_empty() {
        lines.push("**STATUTORY PROVISIONS:**".to_string());
        for doc in &statutes {
            lines.push(format!(
                "[{counter}] {}: \"{}\"",
                doc.title,
                snippet(&doc.content)
            ));
            counter += 1;
        }
    }

    if !cases.is_empty() {
        lines.push("**CASE LAW:**".to_string());
        for doc in &cases {
            let citation = doc.citation.as_deref().unwrap_or("Unknown Citation");
            match &doc.interprets_statute {
                Some(statute_id) => lines.push(format!(
                    "[{counter}] {citation} [INTERPRETS STATUTE: {statute_id}]: \"{}\"",
                    snippet(&doc.content)
                )),
                None => lines.push(format!(
                    "[{counter}] {citation}: \"{}\"",
                    snippet(&doc.content)
                )),
            }
            counter += 1;
        }
    }

    lines.join("\n\n")
}
