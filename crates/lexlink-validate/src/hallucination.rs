//! Hallucination detection against the interpretation-link store.
//!
//! Every interpretation claim in an answer is checked against the link
//! graph. A claim backed by a link is *verified*; a claim whose cited case
//! at least appeared in the generation context is *unverified* (a reviewer
//! can confirm it); everything else is *hallucinated* and its sentence is
//! flagged for removal.

use crate::claims::{Claim, ClaimStatus, extract_claims};
use crate::ContextDocument;
use lexlink_core::LinkStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hallucination rate above which an answer fails outright.
pub const MAX_HALLUCINATION_RATE: f64 = 0.05;

/// Outcome of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallucinationReport {
    /// All extracted claims with their statuses
    pub claims: Vec<Claim>,
    /// Number of claims backed by a link
    pub verified_claims: usize,
    /// Number of claims only supported by context presence
    pub unverified_claims: usize,
    /// Number of fabricated claims
    pub hallucinated_claims: usize,
    /// Total claims extracted
    pub total_claims: usize,
    /// `hallucinated / max(1, total)`
    pub hallucination_rate: f64,
    /// `verified / max(1, total)`
    pub verification_rate: f64,
    /// Sentences carrying hallucinated claims, verbatim
    pub flagged_sentences: Vec<String>,
    /// Whether the answer stays under the hallucination ceiling
    pub passed: bool,
    /// Whether a human should look at it
    pub needs_review: bool,
}

/// Verifies interpretation claims against the link store.
pub struct HallucinationDetector {
    links: Arc<LinkStore>,
}

impl HallucinationDetector {
    /// Creates a detector over the given link store.
    pub fn new(links: Arc<LinkStore>) -> Self {
        Self { links }
    }

    /// Extracts and verifies every claim in `answer`.
    ///
    /// `context` is the retrieved material the answer was generated from;
    /// a claim whose case appears there is merely unverified rather than
    /// hallucinated.
    pub fn detect(&self, answer: &str, context: Option<&[ContextDocument]>) -> HallucinationReport {
        let mut claims = extract_claims(answer);
        let mut verified = 0usize;
        let mut unverified = 0usize;
        let mut hallucinated = 0usize;
        let mut flagged_sentences = Vec::new();

        for claim in &mut claims {
            match self.links.find_link(
                &claim.case_citation,
                &claim.statute_name,
                &claim.statute_section,
            ) {
                Some(link) => {
                    claim.status = ClaimStatus::Verified {
                        interpretation_type: link.interpretation_type,
                        authority: link.authority,
                        boost_factor: link.boost_factor,
                    };
                    verified += 1;
                }
                None if case_in_context(&claim.case_citation, context) => {
                    claim.status = ClaimStatus::Unverified;
                    unverified += 1;
                }
                None => {
                    claim.status = ClaimStatus::Hallucinated;
                    hallucinated += 1;
                    flagged_sentences.push(claim.sentence.clone());
                }
            }
        }

        let total = claims.len();
        let denominator = total.max(1) as f64;
        let hallucination_rate = hallucinated as f64 / denominator;
        let verification_rate = verified as f64 / denominator;
        let passed = hallucination_rate <= MAX_HALLUCINATION_RATE;

        tracing::debug!(
            total,
            verified,
            unverified,
            hallucinated,
            "hallucination detection complete"
        );

        HallucinationReport {
            claims,
            verified_claims: verified,
            unverified_claims: unverified,
            hallucinated_claims: hallucinated,
            total_claims: total,
            hallucination_rate,
            verification_rate,
            flagged_sentences,
            passed,
            needs_review: unverified > 0 || !passed,
        }
    }

    /// Returns a copy of `answer` with every flagged sentence removed.
    /// The input is untouched.
    pub fn remove_hallucinated(&self, answer: &str, report: &HallucinationReport) -> String {
        let mut cleaned = answer.to_string();
        for sentence in &report.flagged_sentences {
            if let Some(position) = cleaned.find(sentence.as_str()) {
                cleaned.replace_range(position..position + sentence.len(), "");
            }
        }
        // Collapse the whitespace runs the removals leave behind.
        let mut out = String::with_capacity(cleaned.len());
        let mut last_was_space = false;
        for c in cleaned.chars() {
            if c == ' ' {
                if !last_was_space {
                    out.push(c);
                }
                last_was_space = true;
            } else {
                last_was_space = c == '\n';
                out.push(c);
            }
        }
        out.trim().to_string()
    }
}

fn case_in_context(citation: &str, context: Option<&[ContextDocument]>) -> bool {
    let Some(context) = context else {
        return false;
    };
    context.iter().any(|doc| doc.content.contains(citation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexlink_core::{Authority, DocType, ExtractionMethod, InterpretationLink, InterpretationType};

    fn store_with_link() -> Arc<LinkStore> {
        let mut store = LinkStore::new();
        store
            .upsert(
                InterpretationLink::builder("misrepresentation_act_s2", "_2013__sgca_36_para_158")
                    .statute("Misrepresentation Act", "2")
                    .case("[2013] SGCA 36", 158)
                    .court("SGCA", 2013)
                    .interpretation(
                        InterpretationType::Narrow,
                        Authority::Binding,
                        "Limited to fiduciary relationships",
                    )
                    .extraction(ExtractionMethod::Manual, 0.95)
                    .verified("reviewer")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Arc::new(store)
    }

    const VERIFIED_ANSWER: &str = "In [2013] SGCA 36, ¶158, the Court held that Section 2 of the \
        Misrepresentation Act applies only to fiduciary relationships.";

    const FABRICATED_ANSWER: &str = "In [2025] SGCA 999, ¶200, the Court held that Section 12 of \
        the Privacy Act applies to all online communications.";

    #[test]
    fn test_verified_claim() {
        let detector = HallucinationDetector::new(store_with_link());
        let report = detector.detect(VERIFIED_ANSWER, None);

        assert_eq!(report.total_claims, 1);
        assert_eq!(report.verified_claims, 1);
        assert_eq!(report.hallucination_rate, 0.0);
        assert_eq!(report.verification_rate, 1.0);
        assert!(report.passed);
        assert!(!report.needs_review);

        match &report.claims[0].status {
            ClaimStatus::Verified {
                interpretation_type,
                authority,
                ..
            } => {
                assert_eq!(*interpretation_type, InterpretationType::Narrow);
                assert_eq!(*authority, Authority::Binding);
            }
            other => panic!("expected verified, got {other:?}"),
        }
    }

    #[test]
    fn test_hallucinated_claim() {
        let detector = HallucinationDetector::new(store_with_link());
        let report = detector.detect(FABRICATED_ANSWER, None);

        assert_eq!(report.hallucinated_claims, 1);
        assert!(report.hallucination_rate >= 0.5);
        assert!(!report.passed);
        assert!(report.needs_review);
        assert_eq!(report.flagged_sentences.len(), 1);
    }

    #[test]
    fn test_unverified_when_case_in_context() {
        let detector = HallucinationDetector::new(store_with_link());
        let context = vec![ContextDocument::new(
            "case_999",
            "This paragraph of [2025] SGCA 999 discusses data protection.",
            DocType::Case,
        )];
        let report = detector.detect(FABRICATED_ANSWER, Some(&context));

        assert_eq!(report.unverified_claims, 1);
        assert_eq!(report.hallucinated_claims, 0);
        assert!(report.passed);
        assert!(report.needs_review);
    }

    #[test]
    fn test_counts_partition_totals() {
        let detector = HallucinationDetector::new(store_with_link());
        let answer = format!("{VERIFIED_ANSWER} {FABRICATED_ANSWER}");
        let report = detector.detect(&answer, None);

        assert_eq!(
            report.verified_claims + report.unverified_claims + report.hallucinated_claims,
            report.total_claims
        );
        assert_eq!(report.total_claims, 2);
    }

    #[test]
    fn test_no_claims_is_clean() {
        let detector = HallucinationDetector::new(store_with_link());
        let report = detector.detect("A general discussion with no citations at all.", None);
        assert_eq!(report.total_claims, 0);
        assert_eq!(report.hallucination_rate, 0.0);
        assert!(report.passed);
        assert!(!report.needs_review);
    }

    #[test]
    fn test_remove_hallucinated_sentences() {
        let detector = HallucinationDetector::new(store_with_link());
        let answer = format!(
            "This is a correct statement about the law. {FABRICATED_ANSWER} The practical effect is significant."
        );
        let report = detector.detect(&answer, None);
        assert_eq!(report.flagged_sentences.len(), 1);

        let cleaned = detector.remove_hallucinated(&answer, &report);
        for flagged in &report.flagged_sentences {
            assert!(!cleaned.contains(flagged.as_str()));
        }
        assert!(cleaned.contains("correct statement"));
        assert!(cleaned.contains("practical effect"));
        // Original untouched.
        assert!(answer.contains("[2025] SGCA 999"));
    }
}
