//! Rules of Court parser: book → Orders → Rules → sub-rules.

use crate::{DocumentParser, IngestError, SourceDocument};
use lexlink_core::{DocType, Document};
use regex::Regex;
use std::collections::BTreeMap;

/// Parses a Rules of Court book into a four-level hierarchy: the book root
/// (level 0), Orders (level 1), Rules (level 2) and numbered sub-rules
/// (level 3).
///
/// Rule headers carry the `(O. N, r. M)` marker; a header only counts when
/// the following body begins with the rule's own number (`M.—`), checked in
/// code since the marker alone also appears in cross-references.
pub struct RulesParser {
    header_pattern: Regex,
    order_title_pattern: Regex,
    subrule_pattern: Regex,
    page_anchor: Regex,
    book_id: String,
    book_title: String,
}

impl RulesParser {
    /// Creates a parser for the given Rules book identity.
    pub fn new(book_id: impl Into<String>, book_title: impl Into<String>) -> Self {
        Self {
            header_pattern: Regex::new(r"(?m)^([^\n]*?)\(O\.\s*(\d+),\s*r\.\s*(\d+)\)\s*$")
                .expect("valid regex"),
            order_title_pattern: Regex::new(r"(?m)^ORDER\s+(\d+)\s*\n([A-Z][^\n]+)")
                .expect("valid regex"),
            subrule_pattern: Regex::new(r"(?m)^\s*(?:\d+\.—)?\((\d+)\)\s+").expect("valid regex"),
            page_anchor: Regex::new(r"\n\d{1,3}\n").expect("valid regex"),
            book_id: book_id.into(),
            book_title: book_title.into(),
        }
    }

    /// Skips the table of contents by jumping past the first page-number
    /// token that precedes the first ORDER heading.
    fn body_after_toc<'a>(&self, text: &'a str) -> &'a str {
        let first_order = match self.order_title_pattern.find(text) {
            Some(m) => m.start(),
            None => return text,
        };
        let mut cut = 0;
        for m in self.page_anchor.find_iter(&text[..first_order]) {
            cut = m.end();
        }
        &text[cut..]
    }

    fn subrules(
        &self,
        rule_text: &str,
        rule_id: &str,
        order_num: &str,
        rule_num: &str,
    ) -> Vec<Document> {
        let matches: Vec<_> = self.subrule_pattern.captures_iter(rule_text).collect();
        let mut out = Vec::new();

        for (i, caps) in matches.iter().enumerate() {
            let whole = caps.get(0).expect("capture 0 always present");
            let label = caps.get(1).expect("group 1 in pattern").as_str();
            let start = whole.start();
            let end = matches
                .get(i + 1)
                .map(|next| next.get(0).expect("capture 0 always present").start())
                .unwrap_or(rule_text.len());
            let sub_text = rule_text[start..end].trim();
            if sub_text.is_empty() {
                continue;
            }

            out.push(
                Document::new(
                    format!("{rule_id}_{label}"),
                    DocType::Rule,
                    3,
                    format!("Order {order_num} Rule {rule_num}({label})"),
                    sub_text,
                )
                .with_parent(rule_id)
                .with_act_name(format!("Order {order_num}"))
                .with_section_number(rule_num)
                .with_subsection(label),
            );
        }
        out
    }
}

impl Default for RulesParser {
    fn default() -> Self {
        Self::new("rules_of_court_2021", "Rules of Court 2021")
    }
}

struct RuleEntry {
    rule_num: String,
    label: String,
    content: String,
}

impl DocumentParser for RulesParser {
    fn supports(&self, source: &SourceDocument) -> bool {
        if source.declared_type == Some(DocType::Rule) {
            return true;
        }
        self.header_pattern.is_match(&source.raw_text)
    }

    fn parse(&self, source: &SourceDocument) -> Result<Vec<Document>, IngestError> {
        let text = source.raw_text.trim();
        if text.is_empty() {
            return Err(IngestError::Parse {
                source_path: source.path.clone(),
                message: "empty source text".into(),
            });
        }

        let body = self.body_after_toc(text);

        // Order number -> title
        let order_titles: BTreeMap<String, String> = self
            .order_title_pattern
            .captures_iter(body)
            .map(|caps| {
                (
                    caps.get(1).expect("group 1").as_str().to_string(),
                    caps.get(2).expect("group 2").as_str().trim().to_string(),
                )
            })
            .collect();

        // Collect rule headers whose body opens with the rule's own number.
        let headers: Vec<_> = self.header_pattern.captures_iter(body).collect();
        let mut rules_by_order: BTreeMap<u64, Vec<RuleEntry>> = BTreeMap::new();

        for (i, caps) in headers.iter().enumerate() {
            let whole = caps.get(0).expect("capture 0 always present");
            let label = caps.get(1).expect("group 1").as_str().trim();
            let order_num = caps.get(2).expect("group 2").as_str();
            let rule_num = caps.get(3).expect("group 3").as_str();

            let content_start = whole.end();
            let content_end = headers
                .get(i + 1)
                .map(|next| next.get(0).expect("capture 0 always present").start())
                .unwrap_or(body.len());
            let content = body[content_start..content_end].trim();

            let expected_opening = format!("{rule_num}.—");
            let relaxed_opening = format!("{rule_num}.");
            if !(content.starts_with(&expected_opening) || content.starts_with(&relaxed_opening)) {
                tracing::debug!(order = order_num, rule = rule_num, "marker without body, skipping");
                continue;
            }

            let Ok(order_key) = order_num.parse::<u64>() else {
                continue;
            };
            let label = label
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ')
                .to_string();
            rules_by_order.entry(order_key).or_default().push(RuleEntry {
                rule_num: rule_num.to_string(),
                label,
                content: content.to_string(),
            });
        }

        if rules_by_order.is_empty() {
            return Err(IngestError::Parse {
                source_path: source.path.clone(),
                message: "no rules recognized".into(),
            });
        }

        let root_text: String = text.chars().take(500).collect();
        let mut documents = vec![Document::new(
            &self.book_id,
            DocType::Rule,
            0,
            &self.book_title,
            root_text,
        )];

        for (order_key, rules) in &rules_by_order {
            let order_num = order_key.to_string();
            let order_title = order_titles
                .get(&order_num)
                .cloned()
                .unwrap_or_else(|| format!("Order {order_num}"));
            let order_id = format!("{}_o_{order_num}", self.book_id);

            let mut order_text = format!("ORDER {order_num}\n{order_title}\n\n");
            for rule in rules {
                order_text.push_str(&format!("Rule {}: {}\n", rule.rule_num, rule.label));
            }

            documents.push(
                Document::new(
                    &order_id,
                    DocType::Rule,
                    1,
                    format!("Order {order_num}: {order_title}"),
                    order_text,
                )
                .with_parent(&self.book_id)
                .with_act_name(&self.book_title)
                .with_section_number(&order_num),
            );

            for rule in rules {
                let rule_id = format!("{order_id}_r_{}", rule.rule_num);
                documents.push(
                    Document::new(
                        &rule_id,
                        DocType::Rule,
                        2,
                        format!("Rule {}: {}", rule.rule_num, rule.label),
                        &rule.content,
                    )
                    .with_parent(&order_id)
                    .with_act_name(format!("Order {order_num}"))
                    .with_section_number(&rule.rule_num),
                );

                documents.extend(self.subrules(&rule.content, &rule_id, &order_num, &rule.rule_num));
            }
        }

        tracing::debug!(
            source = %source.path,
            orders = rules_by_order.len(),
            documents = documents.len(),
            "parsed rules book"
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "\
RULES OF COURT 2021

Contents
Order 9 — Case conferences
34

ORDER 9
CASE CONFERENCES

Striking out claims (O. 9, r. 16)
16.—(1) The Court may order any or part of any claim to be struck out where it discloses no reasonable cause of action.
(2) The Court may make such an order where the claim is an abuse of the process of the Court.

Summary judgment (O. 9, r. 17)
17.—(1) The claimant may apply for summary judgment where the defendant has no real prospect of success.
";

    fn parse() -> Vec<Document> {
        let source =
            SourceDocument::new("rules/roc_2021.txt", RAW).with_declared_type(DocType::Rule);
        RulesParser::new("roc_2021", "Rules of Court 2021")
            .parse(&source)
            .unwrap()
    }

    #[test]
    fn test_hierarchy_levels() {
        let docs = parse();
        assert_eq!(docs[0].id, "roc_2021");
        assert_eq!(docs[0].level, 0);

        let order = docs.iter().find(|d| d.id == "roc_2021_o_9").unwrap();
        assert_eq!(order.level, 1);
        assert!(order.title.contains("CASE CONFERENCES"));

        let rule = docs.iter().find(|d| d.id == "roc_2021_o_9_r_16").unwrap();
        assert_eq!(rule.level, 2);
        assert!(rule.full_text.contains("struck out"));
        assert_eq!(rule.section_number.as_deref(), Some("16"));
    }

    #[test]
    fn test_subrules() {
        let docs = parse();
        let sub = docs.iter().find(|d| d.id == "roc_2021_o_9_r_16_2").unwrap();
        assert_eq!(sub.level, 3);
        assert!(sub.full_text.contains("abuse of the process"));
    }

    #[test]
    fn test_both_rules_found() {
        let docs = parse();
        assert!(docs.iter().any(|d| d.id == "roc_2021_o_9_r_17"));
    }

    #[test]
    fn test_rule_label() {
        let docs = parse();
        let rule = docs.iter().find(|d| d.id == "roc_2021_o_9_r_16").unwrap();
        assert!(rule.title.contains("Striking out claims"));
    }
}
