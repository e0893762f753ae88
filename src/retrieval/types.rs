//! Core data types and error definitions for the retrieval pipeline.

use crate::embedding::EmbeddingClientError;
use crate::index::{IndexError, StoredChunk};
use thiserror::Error;

/// Errors produced while splitting raw text into chunks.
///
/// All variants are configuration errors: they are raised when a [`super::Chunker`] is
/// constructed, never mid-document.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The word budget per chunk was zero.
    #[error("chunk target size must be greater than zero")]
    InvalidTargetSize,
    /// Overlap at or above the target size makes the window step zero.
    #[error("chunk overlap ({overlap_size}) must be smaller than the target size ({target_size})")]
    DegenerateOverlap {
        /// Configured word budget per chunk.
        target_size: usize,
        /// Configured overlap in words.
        overlap_size: usize,
    },
    /// The words-per-sentence estimate used for sentence overlap was zero.
    #[error("words-per-sentence estimate must be greater than zero")]
    InvalidSentenceWordEstimate,
}

/// Errors emitted while orchestrating embedding and similarity search.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected an insertion or query.
    #[error("Index operation failed: {0}")]
    Index(#[from] IndexError),
    /// Caller supplied a metadata list that does not pair up with the chunk list.
    #[error("metadata length ({metadata}) does not match chunk length ({chunks})")]
    MetadataLengthMismatch {
        /// Number of chunks in the request.
        chunks: usize,
        /// Number of metadata entries in the request.
        metadata: usize,
    },
    /// Embedding provider returned no vector for the query.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
}

/// Ordered retrieval result: parallel chunk and score sequences, descending by similarity.
#[derive(Debug, Clone, Default)]
pub struct RetrievedChunks {
    /// Retrieved chunks, most similar first.
    pub chunks: Vec<StoredChunk>,
    /// Similarity score for each chunk, clamped into `[-1, 1]`.
    pub scores: Vec<f32>,
}

impl RetrievedChunks {
    /// Whether the query matched nothing (an empty index is a valid state, not an error).
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Mean similarity across all retrieved chunks, `None` when nothing was retrieved.
    pub fn mean_score(&self) -> Option<f32> {
        if self.scores.is_empty() {
            return None;
        }
        Some(self.scores.iter().sum::<f32>() / self.scores.len() as f32)
    }

    /// Chunk texts in ranked order, truncated to at most `limit` entries.
    pub fn texts_truncated(&self, limit: usize) -> Vec<String> {
        self.chunks
            .iter()
            .take(limit)
            .map(|chunk| chunk.text.clone())
            .collect()
    }
}

/// Interpretive similarity bands.
///
/// These are diagnostic hints only. They inform the quality-signal aggregator and operator
/// logs; results are never dropped from the returned set based on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// Above 0.7: usually the same topic as the question.
    LikelyOnTopic,
    /// Between 0.4 and 0.7: might be relevant, worth including.
    PossiblyRelevant,
    /// Below 0.4: probably off-topic, occasionally surprising.
    LikelyOffTopic,
}

/// Classify a similarity score into its interpretive band.
pub fn interpret_score(score: f32) -> ScoreBand {
    if score > 0.7 {
        ScoreBand::LikelyOnTopic
    } else if score >= 0.4 {
        ScoreBand::PossiblyRelevant
    } else {
        ScoreBand::LikelyOffTopic
    }
}
