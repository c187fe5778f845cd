//! Lexlink-Core: document model and interpretation-link graph for the
//! lexlink legal retrieval system.
//!
//! This crate defines the foundational types shared by every other lexlink
//! crate:
//!
//! - The hierarchical [`Document`] model (statute roots, sections,
//!   subsections; case judgments and paragraphs; rules books, orders and
//!   rules) together with the tree invariants that hold across a corpus.
//! - The [`DocumentStore`], an arena-plus-id repository: every
//!   cross-reference is an opaque string id, never a pointer, and graph
//!   traversal is an explicit repository call.
//! - The [`InterpretationLink`] graph connecting statute provisions to the
//!   case paragraphs that judicially construe them, with typed metadata
//!   (interpretation type, authority, boost factor, applicability).
//! - Cross-cutting plumbing: correlation ids and typed errors.
//!
//! ## Design Philosophy
//!
//! Documents and links are created by offline ingest and extraction jobs;
//! the retriever and validator are strictly read-only consumers. The store
//! therefore optimizes for lookup (by id, by parent, by content hash, by
//! statute, by case, by tag) and validates referential integrity on insert
//! rather than on read.
//!
//! Cross-references by id keep the object graph acyclic at the type level
//! even though the underlying legal graph (statute ↔ case) is not.

pub mod correlation;
pub mod document;
pub mod links;
pub mod store;
pub mod tree;

pub use correlation::CorrelationId;
pub use document::{DocType, Document, DocumentError, IndexUnit, content_hash};
pub use links::{
    Authority, ExtractionMethod, InterpretationLink, InterpretationLinkBuilder,
    InterpretationType, LinkStore, LinkStoreError,
};
pub use store::{DocumentStore, StoreConfig, StoreError, StoreStatistics};
pub use tree::{TreeIssue, TreeView};
