//! End-to-end validation scenarios.

use lexlink_core::{
    Authority, DocType, ExtractionMethod, InterpretationLink, InterpretationType, LinkStore,
};
use lexlink_validate::{
    ContextDocument, Decision, ValidationConfig, ValidationPipeline, ValidationRequest,
};
use std::sync::Arc;

fn links_with_wee() -> Arc<LinkStore> {
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
                    "Applies only to fiduciary relationships",
                )
                .extraction(ExtractionMethod::Manual, 0.95)
                .verified("reviewer")
                .build()
                .unwrap(),
        )
        .unwrap();
    Arc::new(store)
}

fn pipeline() -> ValidationPipeline {
    ValidationPipeline::new(links_with_wee(), ValidationConfig::default())
}

const GOOD_ANSWER: &str = r#"
**Statute:** Section 2 of the Misrepresentation Act states: "No person shall be liable for misrepresentation unless there was a duty to disclose the material facts."

**Judicial Interpretation:** In [2013] SGCA 36, ¶158, the Court held that Section 2 of the Misrepresentation Act applies only to fiduciary relationships.

**Synthesis:** While the statute appears to apply broadly, case law has limited it to trust-based relationships. The court clarified that the statutory duty to disclose means fiduciary duties rather than general obligations.

**Practical Effect:** In practice, silence is only misrepresentation in fiduciary contexts, so a claimant must prove such a relationship before liability can arise.
"#;

const FABRICATED_ANSWER: &str = r#"
**Statute:** Section 12 of the Privacy Act protects personal data against unauthorized processing by any person.

**Interpretation:** In [2025] SGCA 999, ¶200, the Court held that Section 12 of the Privacy Act applies to all online communications without exception.

**Synthesis:** While the statute is framed in general terms, the court has construed it expansively, and case law has broadened its reach to every digital medium.

**Practical Effect:** Therefore companies must obtain consent before processing any personal data online.
"#;

/// Scenario 6: four sections, three synthesis phrases and one verified
/// claim make a passing answer.
#[test]
fn verified_answer_passes() {
    let result = pipeline()
        .validate(&ValidationRequest {
            query: Some("When is silence a misrepresentation?".into()),
            answer: GOOD_ANSWER.into(),
            context: Vec::new(),
            correlation_id: None,
        })
        .unwrap();

    assert_eq!(result.decision, Decision::Pass);
    assert_eq!(result.priority, None);
    assert_eq!(result.metrics.hallucination_rate, 0.0);
    assert!(result.synthesis.as_ref().unwrap().passed);
    assert_eq!(result.hallucination.as_ref().unwrap().verified_claims, 1);
    assert!(result.issues.is_empty());
}

/// Scenario 7: a fabricated citation with no link and no context support is
/// flagged and the answer rejected.
#[test]
fn hallucinated_answer_rejected() {
    let result = pipeline()
        .validate(&ValidationRequest {
            query: Some("Does the Privacy Act cover online communications?".into()),
            answer: FABRICATED_ANSWER.into(),
            context: Vec::new(),
            correlation_id: None,
        })
        .unwrap();

    assert_eq!(result.decision, Decision::Reject);
    let report = result.hallucination.as_ref().unwrap();
    assert_eq!(report.flagged_sentences.len(), 1);
    assert!(report.hallucination_rate >= 0.5);
    assert!(result.issues.iter().any(|i| i.contains("hallucinated")));
}

/// The same fabricated claim downgrades to review when the case at least
/// appeared in the retrieved context.
#[test]
fn contextual_claim_needs_review() {
    let context = vec![ContextDocument::new(
        "case_999",
        "An extract of [2025] SGCA 999 discussing data protection duties.",
        DocType::Case,
    )];
    let result = pipeline()
        .validate(&ValidationRequest {
            query: Some("Does the Privacy Act cover online communications?".into()),
            answer: FABRICATED_ANSWER.into(),
            context,
            correlation_id: None,
        })
        .unwrap();

    assert_eq!(result.decision, Decision::Review);
    let report = result.hallucination.as_ref().unwrap();
    assert_eq!(report.unverified_claims, 1);
    assert_eq!(report.hallucinated_claims, 0);
    assert!(report.needs_review);
}

/// Validation is repeatable: the same request yields the same decision and
/// scores (retry safety).
#[test]
fn validation_is_repeatable() {
    let request = ValidationRequest {
        query: Some("When is silence a misrepresentation?".into()),
        answer: GOOD_ANSWER.into(),
        context: Vec::new(),
        correlation_id: None,
    };
    let pipeline = pipeline();
    let first = pipeline.validate(&request).unwrap();
    let second = pipeline.validate(&request).unwrap();

    assert_eq!(first.decision, second.decision);
    assert_eq!(first.metrics.synthesis_score, second.metrics.synthesis_score);
    assert_eq!(
        first.metrics.hallucination_rate,
        second.metrics.hallucination_rate
    );
}
