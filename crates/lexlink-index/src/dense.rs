//! Flat L2 index over fixed-dimension float32 embeddings.
//!
//! Positions are consecutive integers; an external [`IdMapping`] assigns
//! each position its document id, persisted as JSON next to the binary
//! vector file. Distances are squared L2 (what a flat L2 index reports) and
//! are converted to similarities by `sim = 1 / (1 + d)`.
//!
//! Units whose embedding call failed are stored as zero vectors and marked
//! excluded so they never surface in results. The dimension is fixed at
//! build time; a mismatch on load or query is fatal.

use crate::{IndexError, SearchHit};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"LXDN";
const FORMAT_VERSION: u32 = 1;

/// Integer position → document id mapping, stored as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdMapping {
    entries: HashMap<String, MappingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MappingEntry {
    doc_id: String,
    #[serde(default)]
    excluded: bool,
}

impl IdMapping {
    /// Number of mapped positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The document id at `position`, unless excluded or unmapped.
    pub fn doc_id(&self, position: usize) -> Option<&str> {
        self.entries.get(&position.to_string()).and_then(|entry| {
            if entry.excluded {
                None
            } else {
                Some(entry.doc_id.as_str())
            }
        })
    }

    /// Saves the mapping as JSON.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a mapping written by [`IdMapping::save`].
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self {
            entries: serde_json::from_str(&json)?,
        })
    }
}

/// Immutable dense index over a corpus snapshot.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dim: usize,
    vectors: Vec<f32>,
    mapping: IdMapping,
}

impl DenseIndex {
    /// Embedding dimension.
    pub fn dimensions(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors (including excluded ones).
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Finds the `k` nearest units to `query` by squared L2 distance and
    /// reports them as similarities.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .par_chunks(self.dim)
            .enumerate()
            .filter_map(|(position, vector)| {
                self.mapping.doc_id(position)?;
                let distance: f64 = vector
                    .iter()
                    .zip(query)
                    .map(|(a, b)| {
                        let diff = (*a - *b) as f64;
                        diff * diff
                    })
                    .sum();
                Some((position, distance))
            })
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .filter_map(|(position, distance)| {
                let doc_id = self.mapping.doc_id(position)?;
                Some(SearchHit::new(doc_id, 1.0 / (1.0 + distance)))
            })
            .collect())
    }

    /// Writes the vectors as a binary file and the mapping as JSON.
    pub fn save(&self, vectors_path: &Path, mapping_path: &Path) -> Result<(), IndexError> {
        let mut file = std::fs::File::create(vectors_path)?;
        file.write_all(MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())?;
        file.write_all(&(self.dim as u32).to_le_bytes())?;
        file.write_all(&(self.len() as u32).to_le_bytes())?;
        for value in &self.vectors {
            file.write_all(&value.to_le_bytes())?;
        }
        self.mapping.save(mapping_path)?;
        Ok(())
    }

    /// Loads an index written by [`DenseIndex::save`], validating the
    /// expected dimension.
    pub fn load(
        vectors_path: &Path,
        mapping_path: &Path,
        expected_dim: usize,
    ) -> Result<Self, IndexError> {
        let mut file = std::fs::File::open(vectors_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IndexError::Corrupt("bad magic in dense index file".into()));
        }

        let mut word = [0u8; 4];
        file.read_exact(&mut word)?;
        let version = u32::from_le_bytes(word);
        if version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported dense index version {version}"
            )));
        }

        file.read_exact(&mut word)?;
        let dim = u32::from_le_bytes(word) as usize;
        if dim != expected_dim {
            return Err(IndexError::DimensionMismatch {
                expected: expected_dim,
                actual: dim,
            });
        }

        file.read_exact(&mut word)?;
        let count = u32::from_le_bytes(word) as usize;

        let mut vectors = Vec::with_capacity(count * dim);
        let mut buf = [0u8; 4];
        for _ in 0..count * dim {
            file.read_exact(&mut buf)?;
            vectors.push(f32::from_le_bytes(buf));
        }

        let mapping = IdMapping::load(mapping_path)?;
        if mapping.len() != count {
            return Err(IndexError::Corrupt(format!(
                "mapping has {} entries for {} vectors",
                mapping.len(),
                count
            )));
        }

        Ok(Self { dim, vectors, mapping })
    }
}

/// Accumulates vectors position by position, then finishes the index.
#[derive(Debug)]
pub struct DenseIndexBuilder {
    dim: usize,
    vectors: Vec<f32>,
    entries: HashMap<String, MappingEntry>,
    next_position: usize,
}

impl DenseIndexBuilder {
    /// Creates a builder for the given dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
            entries: HashMap::new(),
            next_position: 0,
        }
    }

    /// Adds a unit's embedding.
    pub fn add(&mut self, doc_id: impl Into<String>, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.vectors.extend_from_slice(vector);
        self.entries.insert(
            self.next_position.to_string(),
            MappingEntry {
                doc_id: doc_id.into(),
                excluded: false,
            },
        );
        self.next_position += 1;
        Ok(())
    }

    /// Records a unit whose embedding failed: a zero vector, marked
    /// excluded so it never matches.
    pub fn add_failed(&mut self, doc_id: impl Into<String>) {
        self.vectors.extend(std::iter::repeat_n(0.0f32, self.dim));
        self.entries.insert(
            self.next_position.to_string(),
            MappingEntry {
                doc_id: doc_id.into(),
                excluded: true,
            },
        );
        self.next_position += 1;
    }

    /// Finishes the index.
    pub fn build(self) -> DenseIndex {
        tracing::debug!(
            vectors = self.next_position,
            dim = self.dim,
            "built dense index"
        );
        DenseIndex {
            dim: self.dim,
            vectors: self.vectors,
            mapping: IdMapping {
                entries: self.entries,
            },
        }
    }
}
