//! Lexlink-Index: the two retrieval indexes behind the hybrid retriever.
//!
//! - [`LexicalIndex`]: an inverted index over title/text/citation fields
//!   with BM25 scoring, best-field combination and per-field boosts.
//! - [`DenseIndex`]: a flat L2 index over fixed-dimension float32
//!   embeddings, with an integer-position → document-id mapping and
//!   exclusion marks for failed embeddings.
//!
//! Both indexes are immutable once built. Reindex jobs build a new
//! *generation* in a side directory and atomically swap a pointer;
//! concurrent queries keep reading the previous generation until the swap
//! ([`generation`]).
//!
//! The embedding service consumed at build and query time sits behind
//! [`EmbeddingProvider`]; the retriever sees only vectors.

pub mod analyzer;
pub mod dense;
pub mod embed;
pub mod generation;
pub mod lexical;

pub use analyzer::Analyzer;
pub use dense::{DenseIndex, DenseIndexBuilder, IdMapping};
pub use embed::{EmbeddingProvider, HashingEmbedding, HttpEmbedding, truncate_for_embedding};
pub use generation::{GenerationPointer, GenerationStore};
pub use lexical::{FieldBoosts, LexicalIndex, LexicalIndexBuilder};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable: {0}")]
    Unavailable(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A scored hit from either index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index-unit id (same as the backing document id)
    pub unit_id: String,
    /// Raw score from the producing index
    pub score: f64,
}

impl SearchHit {
    /// Creates a hit.
    pub fn new(unit_id: impl Into<String>, score: f64) -> Self {
        Self {
            unit_id: unit_id.into(),
            score,
        }
    }
}
