//! In-process flat vector index and the parallel chunk store.
//!
//! The index performs exact inner-product search over unit-normalized vectors, which is
//! mathematically cosine similarity. Exact search keeps results free of approximation
//! artifacts; an ANN structure can replace it later if scan cost ever dominates.
//!
//! Insertion order is load-bearing: the Nth vector in the index corresponds to the Nth
//! entry in the chunk store, and that positional mapping is the only way a search hit is
//! resolved back to its text and metadata. [`IndexState`] bundles both sides so callers can
//! guard them with a single lock and append to them as a unit.

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector's dimensionality differs from the one the index was built with.
    ///
    /// This is an index-corruption class failure: mixing dimensionalities would make every
    /// subsequent similarity meaningless, so the batch is rejected outright.
    #[error("vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality the index was constructed with.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },
}

/// A search hit: position in insertion order plus similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIndex {
    /// Insertion-order position of the matched vector.
    pub index: usize,
    /// Inner-product similarity, clamped into `[-1, 1]`.
    pub score: f32,
}

/// Exact inner-product index over unit-normalized vectors.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIpIndex {
    /// Create an empty index for vectors of the given dimensionality.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Dimensionality established at construction.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a batch of vectors, preserving order.
    ///
    /// The whole batch is validated before anything is stored, so a failed call leaves the
    /// index exactly as it was.
    pub fn append(&mut self, vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }
        self.vectors.extend(vectors);
        Ok(())
    }

    /// Return up to `k` nearest vectors by inner product, most similar first.
    ///
    /// Ties keep insertion order. An empty index yields an empty result; a query of the
    /// wrong dimensionality is an error because its scores would be meaningless.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredIndex>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredIndex> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| ScoredIndex {
                index,
                score: inner_product(query, vector).clamp(-1.0, 1.0),
            })
            .collect();
        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
///
/// Without normalization, longer documents would dominate inner-product scores.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Provenance metadata attached to every stored chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    /// Identifier unique within the owning document (`{doc_id}_{position}`), when known.
    pub chunk_id: Option<String>,
    /// Identifier grouping chunks from one source document, when known.
    pub doc_id: Option<String>,
    /// Source label: a filename, `"system"` for seeded entries, or `"uploaded"`.
    pub source: String,
    /// Position of the chunk within its document, when known.
    pub position: Option<usize>,
}

impl ChunkMetadata {
    /// Placeholder metadata for seeded knowledge-base entries.
    pub fn system() -> Self {
        Self {
            chunk_id: None,
            doc_id: None,
            source: "system".to_string(),
            position: None,
        }
    }

    /// Fallback metadata synthesized when a caller provides none.
    pub fn uploaded() -> Self {
        Self {
            chunk_id: None,
            doc_id: None,
            source: "uploaded".to_string(),
            position: None,
        }
    }

    /// Full provenance for a chunk produced by document ingestion.
    pub fn for_document(doc_id: &str, filename: &str, position: usize) -> Self {
        Self {
            chunk_id: Some(format!("{doc_id}_{position}")),
            doc_id: Some(doc_id.to_string()),
            source: filename.to_string(),
            position: Some(position),
        }
    }
}

/// A chunk's text together with its provenance, stored parallel to the vector index.
///
/// Created once at ingestion time and never mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    /// Chunk text content.
    pub text: String,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

/// The vector index and its parallel chunk store, updated as a unit.
///
/// `index` is `None` until the first batch arrives; its dimensionality is inferred from
/// that batch and fixed for the lifetime of the state.
#[derive(Debug, Default)]
pub struct IndexState {
    /// Vector index, lazily constructed from the first appended batch.
    pub index: Option<FlatIpIndex>,
    /// Chunk store; entry N corresponds to vector N.
    pub chunks: Vec<StoredChunk>,
}

impl IndexState {
    /// Empty state with no index and no chunks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append paired vectors and chunk entries atomically.
    ///
    /// Either both sides grow by the batch or neither does; a dimension mismatch anywhere
    /// in the batch leaves both untouched. Callers guarantee `vectors` and `entries` pair
    /// up one-to-one.
    pub fn append(
        &mut self,
        vectors: Vec<Vec<f32>>,
        entries: Vec<StoredChunk>,
    ) -> Result<(), IndexError> {
        debug_assert_eq!(vectors.len(), entries.len());
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let index = self
            .index
            .get_or_insert_with(|| FlatIpIndex::new(first.len()));
        index.append(vectors)?;
        self.chunks.extend(entries);
        Ok(())
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing has been indexed yet.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
