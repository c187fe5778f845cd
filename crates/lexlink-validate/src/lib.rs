//! Lexlink-Validate: scoring and verification of generated answers.
//!
//! A generated legal answer passes through two independent stages before a
//! routing decision:
//!
//! - The [`SynthesisScorer`] checks that the answer carries the four
//!   expected sections (statutory provision, judicial interpretation,
//!   synthesis, practical effect) and in particular that it *synthesizes*:
//!   couples statutory text to its judicial construction with connective
//!   language rather than merely listing sources.
//! - The [`HallucinationDetector`] extracts interpretation claims
//!   ("case C construed section S of Act A") and verifies each against the
//!   interpretation-link store.
//!
//! The [`ValidationPipeline`] orchestrates both, tolerates a stage failing
//!   independently, and routes the answer to `pass`, `review` or `reject`
//!   with a priority for the review queue.

pub mod claims;
pub mod hallucination;
pub mod pipeline;
pub mod synthesis;

pub use claims::{Claim, ClaimStatus, extract_claims, split_sentences};
pub use hallucination::{HallucinationDetector, HallucinationReport};
pub use pipeline::{
    Decision, Priority, ValidationConfig, ValidationMetrics, ValidationPipeline,
    ValidationRequest, ValidationResult,
};
pub use synthesis::{SynthesisReport, SynthesisScorer};

use lexlink_core::DocType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only error the validator raises across its boundary: an ill-formed
/// request. Internal stage failures degrade into warnings instead.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// One retrieved document handed to the validator as generation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDocument {
    /// Document id
    pub doc_id: String,
    /// Text that was in the prompt
    pub content: String,
    /// Kind of legal source
    pub doc_type: DocType,
}

impl ContextDocument {
    /// Creates a context document.
    pub fn new(doc_id: impl Into<String>, content: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            doc_id: doc_id.into(),
            content: content.into(),
            doc_type,
        }
    }
}
