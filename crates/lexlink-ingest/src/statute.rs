//! Statute parser: Act → sections → subsections.

use crate::segment::{SectionMatcher, SegmentMatch};
use crate::{DocumentParser, IngestError, SourceDocument, slugify};
use lexlink_core::{DocType, Document};
use regex::Regex;

/// Parses statutes into a three-level hierarchy: the Act root (level 0),
/// sections (level 1) and subsections (level 2).
///
/// Section headers are recognized by the fuzzy [`SectionMatcher`]; the
/// table-of-contents prefix is skipped by anchoring on the bracketed
/// enactment date that follows it (e.g. `[12 March 1967]`).
pub struct StatuteParser {
    sections: SectionMatcher,
    subsection_pattern: Regex,
    date_anchor: Regex,
    act_line: Regex,
    max_root_text: usize,
}

impl StatuteParser {
    /// Creates a parser with the given cap on stored root text.
    pub fn new(max_root_text: usize) -> Self {
        Self {
            sections: SectionMatcher::new(),
            // "(1) ...", "(a) ..." and the "2.—(1)" joint form
            subsection_pattern: Regex::new(r"(?m)^\s*(?:\d+[A-Z]?\.—)?\(([a-z0-9]+)\)\s+")
                .expect("valid regex"),
            date_anchor: Regex::new(r"\[\d{1,2}\s+\w+\s+\d{4}\]").expect("valid regex"),
            act_line: Regex::new(r"(?i)\bact\b").expect("valid regex"),
            max_root_text: max_root_text.max(1),
        }
    }

    fn extract_act_name(&self, source: &SourceDocument) -> String {
        for line in source.raw_text.lines().take(20) {
            let line = line.trim();
            if line.len() < 100 && !line.is_empty() && self.act_line.is_match(line) {
                let cleaned = line
                    .replace("REVISED EDITION", "")
                    .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
                    .to_string();
                if !cleaned.is_empty() {
                    return cleaned;
                }
            }
        }
        source.file_stem().replace('_', " ")
    }

    /// Skips the table-of-contents prefix by anchoring on the enactment date.
    fn body_after_toc<'a>(&self, text: &'a str) -> &'a str {
        match self.date_anchor.find(text) {
            Some(m) => &text[m.start()..],
            None => text,
        }
    }

    fn subsections(
        &self,
        section: &SegmentMatch,
        section_id: &str,
        section_number: &str,
        act_name: &str,
    ) -> Vec<Document> {
        let text = &section.text;
        let matches: Vec<_> = self.subsection_pattern.captures_iter(text).collect();
        let mut out = Vec::new();

        for (i, caps) in matches.iter().enumerate() {
            let whole = caps.get(0).expect("capture 0 always present");
            let label = caps.get(1).expect("group 1 in pattern").as_str();
            let start = whole.start();
            let end = matches
                .get(i + 1)
                .map(|next| next.get(0).expect("capture 0 always present").start())
                .unwrap_or(text.len());
            let sub_text = text[start..end].trim();
            if sub_text.is_empty() {
                continue;
            }

            let title: String = sub_text.chars().take(100).collect();
            out.push(
                Document::new(
                    format!("{section_id}_{label}"),
                    DocType::Statute,
                    2,
                    title,
                    sub_text,
                )
                .with_parent(section_id)
                .with_act_name(act_name)
                .with_section_number(section_number)
                .with_subsection(label),
            );
        }
        out
    }
}

impl Default for StatuteParser {
    fn default() -> Self {
        Self::new(200_000)
    }
}

impl DocumentParser for StatuteParser {
    fn supports(&self, source: &SourceDocument) -> bool {
        if source.declared_type == Some(DocType::Statute) {
            return true;
        }
        let head: String = source.raw_text.chars().take(2000).collect();
        head.to_uppercase().contains("ACT")
            && (head.contains("Section") || self.sections.find_sections(&head).len() > 1)
    }

    fn parse(&self, source: &SourceDocument) -> Result<Vec<Document>, IngestError> {
        let text = source.raw_text.trim();
        if text.is_empty() {
            return Err(IngestError::Parse {
                source_path: source.path.clone(),
                message: "empty source text".into(),
            });
        }

        let act_name = self.extract_act_name(source);
        let act_id = slugify(&act_name);
        let root_text: String = text.chars().take(self.max_root_text).collect();

        let mut documents = vec![
            Document::new(&act_id, DocType::Statute, 0, &act_name, root_text)
                .with_act_name(&act_name),
        ];

        let body = self.body_after_toc(text);
        let sections = self.sections.find_sections(body);
        if sections.is_empty() {
            tracing::warn!(source = %source.path, "no sections recognized in statute body");
        }

        let mut seen = std::collections::HashSet::new();
        seen.insert(act_id.clone());

        for section in &sections {
            let number = section.number.to_lowercase();
            let section_id = format!("{act_id}_s{number}");
            if !seen.insert(section_id.clone()) {
                continue;
            }

            let title = section
                .text
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(150)
                .collect::<String>();

            documents.push(
                Document::new(&section_id, DocType::Statute, 1, title, &section.text)
                    .with_parent(&act_id)
                    .with_act_name(&act_name)
                    .with_section_number(&section.number),
            );

            for sub in self.subsections(section, &section_id, &section.number, &act_name) {
                if seen.insert(sub.id.clone()) {
                    documents.push(sub);
                }
            }
        }

        tracing::debug!(
            source = %source.path,
            act = %act_name,
            documents = documents.len(),
            "parsed statute"
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "\
MISREPRESENTATION ACT
1967 REVISED EDITION

ARRANGEMENT OF SECTIONS
1. Removal of certain bars
2. Damages for misrepresentation

[12 March 1967]

1.Where a person has entered into a contract after a misrepresentation has been made to him the agreement remains binding subject to the provisions of this Act.
2.—(1) Where a person has entered into a contract after a misrepresentation has been made to him by another party thereto and he has suffered loss, that other party shall be liable to damages.
(2) Liability under subsection (1) arises notwithstanding that the misrepresentation was not made fraudulently, unless reasonable ground to believe is proved.
3.An agreement purporting to exclude or restrict liability for misrepresentation is of no effect except to the extent that it satisfies the requirement of reasonableness.
";

    fn parse() -> Vec<Document> {
        let source = SourceDocument::new("acts/misrepresentation_act.txt", RAW)
            .with_declared_type(DocType::Statute);
        StatuteParser::default().parse(&source).unwrap()
    }

    #[test]
    fn test_root_and_sections() {
        let docs = parse();
        assert_eq!(docs[0].level, 0);
        assert_eq!(docs[0].id, "misrepresentation_act");

        let sections: Vec<_> = docs.iter().filter(|d| d.level == 1).collect();
        let numbers: Vec<_> = sections
            .iter()
            .map(|d| d.section_number.as_deref().unwrap())
            .collect();
        assert!(numbers.contains(&"2"));
        assert!(numbers.contains(&"3"));
    }

    #[test]
    fn test_toc_is_skipped() {
        let docs = parse();
        // The TOC lists "1. Removal of certain bars" but the parsed section 1
        // must come from the body after the date anchor.
        let s1 = docs
            .iter()
            .find(|d| d.id == "misrepresentation_act_s1")
            .unwrap();
        assert!(s1.full_text.contains("entered into a contract"));
    }

    #[test]
    fn test_subsections_extracted() {
        let docs = parse();
        let subs: Vec<_> = docs.iter().filter(|d| d.level == 2).collect();
        assert!(!subs.is_empty());
        let s2_1 = docs.iter().find(|d| d.id == "misrepresentation_act_s2_1");
        assert!(s2_1.is_some());
        assert_eq!(s2_1.unwrap().subsection.as_deref(), Some("1"));
    }

    #[test]
    fn test_parents_precede_children() {
        let docs = parse();
        let mut seen = std::collections::HashSet::new();
        for doc in &docs {
            if let Some(parent) = &doc.parent_id {
                assert!(seen.contains(parent.as_str()), "parent {parent} after child");
            }
            seen.insert(doc.id.as_str());
        }
    }

    #[test]
    fn test_empty_source_is_parse_error() {
        let source = SourceDocument::new("acts/empty.txt", "   ");
        let err = StatuteParser::default().parse(&source).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn test_act_name_from_header_line() {
        let docs = parse();
        assert_eq!(docs[0].act_name.as_deref(), Some("MISREPRESENTATION ACT"));
    }
}
