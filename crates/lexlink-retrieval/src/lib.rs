//! Lexlink-Retrieval: the hybrid, interpretation-aware retriever.
//!
//! One retrieval runs in five phases:
//!
//! 1. **Fan-out**: lexical and dense searches run concurrently, each with
//!    its own timeout; a blown side degrades to empty rather than erroring.
//! 2. **Normalize & fuse**: per-side min-max scaling into `[0, 1]`, then a
//!    weighted sum per unit id.
//! 3. **Boost**: statutes in the fused head anchor a lookup into the
//!    interpretation-link store; linked cases already in the list get their
//!    score multiplied by the link's boost factor, linked cases missing
//!    from the list are injected with a synthetic score.
//! 4. **Diversify**: at most N interpretive cases per anchor statute
//!    survive into the final ranking.
//! 5. **Return**: a ranked, annotated, reproducible result list.
//!
//! Within one request the output is a pure function of the query, the index
//! generation, the link-store snapshot and the configured weights.

pub mod cache;
pub mod context;
pub mod retriever;

pub use cache::QueryCache;
pub use context::format_context;
pub use retriever::HybridRetriever;

use lexlink_core::{CorrelationId, DocType, InterpretationType};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hard ceiling on requested result counts.
pub const MAX_TOP_K: usize = 50;
/// Hard ceiling on the per-statute diversification cap.
pub const MAX_INTERPRETIVE_PER_STATUTE: usize = 10;

/// Errors surfaced to the caller. Degraded sub-searches are not errors;
/// only an ill-formed request is.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Which path produced (or last touched) a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    /// Lexical side only
    Lexical,
    /// Dense side only
    Dense,
    /// Present on both sides
    Fused,
    /// Injected from the interpretation-link store
    InterpretationLink,
}

/// Retriever configuration.
///
/// `w_lepard` is reserved for a future third signal; while that signal is
/// absent the two active weights are renormalized so they sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default result count
    pub top_k: usize,
    /// Weight of the normalized lexical score
    pub w_lex: f64,
    /// Weight of the normalized dense score
    pub w_dense: f64,
    /// Reserved third-signal weight (not yet active)
    pub w_lepard: f64,
    /// Per-side fetch size as a multiple of `k`
    pub fetch_multiplier: usize,
    /// Fused list size kept for boosting
    pub merge_limit: usize,
    /// How deep into the fused list to look for anchor statutes
    pub anchor_window: usize,
    /// Diversification cap per anchor statute
    pub max_interpretive_per_statute: usize,
    /// Penalty factor for injected (non-retrieved) interpretive cases
    pub synthetic_penalty: f64,
    /// Whether interpretation boosting is on by default
    pub use_interpretation_links: bool,
    /// Only consult verified links
    pub verified_links_only: bool,
    /// Per-side search timeout
    pub side_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            w_lex: 0.4,
            w_dense: 0.4,
            w_lepard: 0.2,
            fetch_multiplier: 20,
            merge_limit: 500,
            anchor_window: 20,
            max_interpretive_per_statute: 3,
            synthetic_penalty: 0.7,
            use_interpretation_links: true,
            verified_links_only: true,
            side_timeout: Duration::from_secs(2),
        }
    }
}

impl RetrievalConfig {
    /// Active fusion weights with the reserved signal renormalized away.
    pub fn normalized_weights(&self) -> (f64, f64) {
        let total = self.w_lex + self.w_dense;
        if total <= 0.0 {
            (0.5, 0.5)
        } else {
            (self.w_lex / total, self.w_dense / total)
        }
    }
}

/// Per-request options layered over the configuration.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Result count override
    pub top_k: Option<usize>,
    /// Interpretation-boost override
    pub use_interpretation_links: Option<bool>,
    /// Diversification cap override
    pub max_interpretive_per_statute: Option<usize>,
    /// Whole-request deadline; on expiry the retriever returns what it has
    pub deadline: Option<Duration>,
    /// Correlation id to propagate (a fresh one is minted when absent)
    pub correlation_id: Option<CorrelationId>,
}

/// One ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDoc {
    /// Index-unit / document id
    pub unit_id: String,
    /// Kind of legal source
    pub doc_type: DocType,
    /// Display title
    pub title: String,
    /// Document text handed to the generation layer
    pub content: String,
    /// Case citation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    /// Year of decision, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Final score after fusion and boosting
    pub score: f64,
    /// Which path produced the result
    pub source: RetrievalSource,
    /// Normalized lexical component
    pub lex_score: f64,
    /// Normalized dense component
    pub dense_score: f64,
    /// Boost factor applied, when the result was boosted or injected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boosted_by: Option<f64>,
    /// Anchor statute this case interprets, when boosted or injected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interprets_statute: Option<String>,
    /// How the case construes that statute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation_type: Option<InterpretationType>,
    /// True when the result was injected rather than retrieved
    #[serde(default)]
    pub synthetic: bool,
}

/// Outcome of one retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    /// Correlation id stamped on all logs for this request
    pub correlation_id: CorrelationId,
    /// Ranked results, best first
    pub results: Vec<RetrievedDoc>,
    /// True when a deadline or side timeout truncated the work
    pub partial: bool,
    /// Degradations encountered (empty on the happy path)
    pub warnings: Vec<String>,
    /// Wall time of the whole request in milliseconds
    pub elapsed_ms: u64,
}
