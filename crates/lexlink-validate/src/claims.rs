//! Sentence segmentation and interpretation-claim extraction.
//!
//! A *claim* is an assertion that a case construed a statutory provision:
//! a sentence mentioning a case citation near a statute or section token.
//! Claims are ephemeral; they live only for the duration of one
//! validation call.

use lexlink_core::{Authority, InterpretationType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Verification status of one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ClaimStatus {
    /// Backed by an interpretation link
    Verified {
        /// Link's interpretation type
        interpretation_type: InterpretationType,
        /// Link's authority
        authority: Authority,
        /// Link's retrieval boost
        boost_factor: f64,
    },
    /// No link, but the cited case was in the generation context
    Unverified,
    /// No link and the case never appeared in context
    Hallucinated,
}

/// One extracted interpretation claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Index of the sentence the claim came from
    pub sentence_index: usize,
    /// The sentence verbatim
    pub sentence: String,
    /// Cited case, e.g. `[2013] SGCA 36`
    pub case_citation: String,
    /// Pinpoint paragraph, when given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_para_no: Option<u32>,
    /// Statute (or Act) name as asserted; may be empty when only a bare
    /// section token appears
    pub statute_name: String,
    /// Section number as asserted
    pub statute_section: String,
    /// Interpretation type the answer implies, when its wording shows one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asserted_type: Option<InterpretationType>,
    /// Verification outcome (filled by the detector)
    pub status: ClaimStatus,
}

struct Patterns {
    citation: Regex,
    pinpoint: Regex,
    section: Regex,
    rule: Regex,
    act_name: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        citation: Regex::new(r"\[\d{4}\]\s+[A-Z]+(?:\([A-Z]+\))?\s+\d+").expect("valid regex"),
        pinpoint: Regex::new(r"¶\s*(\d+)|\bat\s+\[(\d+)\]").expect("valid regex"),
        section: Regex::new(r"(?i)\bsection\s+(\d+[A-Z]?)(?:\((\d+)\))?").expect("valid regex"),
        rule: Regex::new(r"(?i)\border\s+(\d+)\s+rule\s+(\d+)").expect("valid regex"),
        act_name: Regex::new(r"(?:[A-Z][A-Za-z]*\s+)+Act(?:\s+\d{4})?").expect("valid regex"),
    })
}

/// Splits text into sentences.
///
/// A boundary is a `.`, `!` or `?` followed by whitespace and a capital,
/// bracket or markdown marker. Periods inside citations and short
/// abbreviations do not split because what follows them is lowercase or a
/// digit.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        current.push(c);

        if matches!(c, '.' | '!' | '?') {
            // A trailing close-quote or bracket travels with the sentence.
            while i + 1 < chars.len() && matches!(chars[i + 1], '"' | '”' | ')' | ']') {
                i += 1;
                current.push(chars[i]);
            }
            // Look ahead: whitespace then an opener.
            let mut j = i + 1;
            let mut saw_space = false;
            while j < chars.len() && chars[j].is_whitespace() {
                saw_space = true;
                j += 1;
            }
            let opens_sentence = j >= chars.len()
                || (saw_space
                    && (chars[j].is_uppercase() || matches!(chars[j], '[' | '*' | '“' | '"')));
            if opens_sentence {
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
        i += 1;
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn asserted_type(sentence_lower: &str) -> Option<InterpretationType> {
    if sentence_lower.contains("narrow") {
        Some(InterpretationType::Narrow)
    } else if sentence_lower.contains("broaden") || sentence_lower.contains("extend") {
        Some(InterpretationType::Broad)
    } else if sentence_lower.contains("clarif") {
        Some(InterpretationType::Clarify)
    } else if sentence_lower.contains("purposive") {
        Some(InterpretationType::Purposive)
    } else if sentence_lower.contains("literal") || sentence_lower.contains("plain meaning") {
        Some(InterpretationType::Literal)
    } else if sentence_lower.contains("appli") {
        Some(InterpretationType::Apply)
    } else {
        None
    }
}

/// Extracts interpretation claims from an answer.
///
/// A sentence yields a claim when it contains a case citation together
/// with a statute token (a section reference, an Order/Rule reference, or
/// an Act name).
pub fn extract_claims(answer: &str) -> Vec<Claim> {
    let patterns = patterns();
    let mut claims = Vec::new();

    for (index, sentence) in split_sentences(answer).into_iter().enumerate() {
        let Some(citation) = patterns.citation.find(&sentence) else {
            continue;
        };

        let section_caps = patterns.section.captures(&sentence);
        let rule_caps = patterns.rule.captures(&sentence);
        let act = patterns.act_name.find(&sentence);

        let (statute_name, statute_section) = if let Some(caps) = &section_caps {
            let section = caps.get(1).expect("group 1").as_str().to_string();
            let name = act.map(|m| m.as_str().trim().to_string()).unwrap_or_default();
            (name, section)
        } else if let Some(caps) = &rule_caps {
            let order = caps.get(1).expect("group 1").as_str();
            let rule = caps.get(2).expect("group 2").as_str();
            (format!("Order {order}"), rule.to_string())
        } else if let Some(act) = act {
            (act.as_str().trim().to_string(), String::new())
        } else {
            continue;
        };

        let para_no = patterns.pinpoint.captures(&sentence).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse().ok())
        });

        let lower = sentence.to_lowercase();
        claims.push(Claim {
            sentence_index: index,
            sentence: sentence.clone(),
            case_citation: citation.as_str().to_string(),
            case_para_no: para_no,
            statute_name,
            statute_section,
            asserted_type: asserted_type(&lower),
            status: ClaimStatus::Unverified,
        });
    }

    claims
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_sentences() {
        let sentences = split_sentences(
            "The first point is settled. The second point is not! Is the third open?",
        );
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[1], "The second point is not!");
    }

    #[test]
    fn test_split_after_closing_quote() {
        let text = "The provision states: \"the other party shall be liable to damages.\" The court disagreed.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].ends_with("damages.\""));
    }

    #[test]
    fn test_split_keeps_citations_whole() {
        let text = "In Wee [2013] SGCA 36, ¶158, the Court held that s. 2 applies narrowly. The next sentence follows.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].contains("¶158"));
    }

    #[test]
    fn test_extract_basic_claim() {
        let answer = "In [2013] SGCA 36, ¶158, the Court held that Section 2 of the Misrepresentation Act applies only to fiduciary relationships.";
        let claims = extract_claims(answer);
        assert_eq!(claims.len(), 1);

        let claim = &claims[0];
        assert_eq!(claim.case_citation, "[2013] SGCA 36");
        assert_eq!(claim.case_para_no, Some(158));
        assert_eq!(claim.statute_section, "2");
        assert!(claim.statute_name.contains("Misrepresentation Act"));
    }

    #[test]
    fn test_citation_without_statute_is_not_a_claim() {
        let answer = "The procedural history is set out in [2013] SGCA 36 at length.";
        assert!(extract_claims(answer).is_empty());
    }

    #[test]
    fn test_statute_without_citation_is_not_a_claim() {
        let answer = "Section 2 of the Misrepresentation Act provides for damages.";
        assert!(extract_claims(answer).is_empty());
    }

    #[test]
    fn test_rule_reference_claim() {
        let answer =
            "In [1997] SGCA 58, ¶21, the court construed Order 9 Rule 16 to require an obviously unsustainable claim.";
        let claims = extract_claims(answer);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].statute_name, "Order 9");
        assert_eq!(claims[0].statute_section, "16");
    }

    #[test]
    fn test_asserted_type_detection() {
        let answer = "In [2013] SGCA 36 the court narrowed Section 2 of the Misrepresentation Act considerably.";
        let claims = extract_claims(answer);
        assert_eq!(claims[0].asserted_type, Some(InterpretationType::Narrow));
    }

    #[test]
    fn test_multiple_claims() {
        let answer = "In [2013] SGCA 36 the Court held Section 2 of the Misrepresentation Act is narrow. \
                      In [2015] SGCA 33 the Court held Section 7 of the Defamation Act requires public benefit.";
        let claims = extract_claims(answer);
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[1].statute_section, "7");
    }
}
