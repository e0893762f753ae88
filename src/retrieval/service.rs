//! Retriever orchestration: embedding generation, index ownership, and search.

use crate::embedding::EmbeddingClient;
use crate::index::{ChunkMetadata, IndexState, StoredChunk, normalize_l2};
use tokio::sync::RwLock;

use super::types::{RetrievalError, RetrievedChunks, interpret_score};

/// Owns the embedding client and the shared index/chunk-store pair.
///
/// The index and its chunk store grow append-only and are cross-referenced purely by
/// insertion order, so every mutation happens inside one write-lock critical section:
/// a reader can never observe a vector without its chunk entry or vice versa. Embedding
/// inference, the dominant latency cost, always runs outside the lock.
pub struct Retriever {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    state: RwLock<IndexState>,
}

impl Retriever {
    /// Build a retriever around an injected embedding client, with nothing indexed.
    pub fn new(embedding_client: Box<dyn EmbeddingClient + Send + Sync>) -> Self {
        Self {
            embedding_client,
            state: RwLock::new(IndexState::new()),
        }
    }

    /// Replace the state with a fresh index seeded from `documents`.
    ///
    /// Each document becomes one chunk with placeholder `"system"` metadata. The index
    /// dimensionality is taken from the first embedded batch. Returns the seeded count.
    pub async fn seed_initial(&self, documents: Vec<String>) -> Result<usize, RetrievalError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed_normalized(documents.clone()).await?;
        let entries: Vec<StoredChunk> = documents
            .into_iter()
            .map(|text| StoredChunk {
                text,
                metadata: ChunkMetadata::system(),
            })
            .collect();

        let mut state = self.state.write().await;
        *state = IndexState::new();
        state.append(vectors, entries)?;
        tracing::info!(chunks = state.len(), "Seeded initial knowledge base");
        Ok(state.len())
    }

    /// Embed and append new chunks to the index.
    ///
    /// When `metadata` is provided it must pair one-to-one with `chunks`; a length mismatch
    /// is a caller error rejected before any state changes. When omitted, `"uploaded"`
    /// placeholder metadata is synthesized per chunk. The index is constructed lazily from
    /// the first batch if nothing has been indexed yet.
    pub async fn add_chunks(
        &self,
        chunks: Vec<String>,
        metadata: Option<Vec<ChunkMetadata>>,
    ) -> Result<usize, RetrievalError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(metadata) = &metadata {
            if metadata.len() != chunks.len() {
                return Err(RetrievalError::MetadataLengthMismatch {
                    chunks: chunks.len(),
                    metadata: metadata.len(),
                });
            }
        }

        let vectors = self.embed_normalized(chunks.clone()).await?;
        debug_assert_eq!(vectors.len(), chunks.len());

        let entries: Vec<StoredChunk> = match metadata {
            Some(metadata) => chunks
                .into_iter()
                .zip(metadata)
                .map(|(text, metadata)| StoredChunk { text, metadata })
                .collect(),
            None => chunks
                .into_iter()
                .map(|text| StoredChunk {
                    text,
                    metadata: ChunkMetadata::uploaded(),
                })
                .collect(),
        };

        let added = entries.len();
        let mut state = self.state.write().await;
        state.append(vectors, entries)?;
        tracing::debug!(added, total = state.len(), "Appended chunks to index");
        Ok(added)
    }

    /// Find the top-`k` stored chunks most similar to `question`.
    ///
    /// The question is embedded and normalized identically to stored chunks, searched by
    /// inner product, and hits are zipped back to the parallel chunk store. An empty or
    /// uninitialized index returns an empty result; "no relevant chunks" is a common,
    /// valid state rather than an error. No re-ranking or filtering is applied: a high
    /// score means topically close, not that the chunk answers the question.
    pub async fn find_relevant_chunks(
        &self,
        question: &str,
        k: usize,
    ) -> Result<RetrievedChunks, RetrievalError> {
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let Some(mut query) = vectors.pop() else {
            return Err(RetrievalError::EmptyEmbedding);
        };
        normalize_l2(&mut query);

        let state = self.state.read().await;
        let Some(index) = state.index.as_ref() else {
            return Ok(RetrievedChunks::default());
        };

        let hits = index.search(&query, k)?;
        let mut chunks = Vec::with_capacity(hits.len());
        let mut scores = Vec::with_capacity(hits.len());
        for hit in hits {
            // An out-of-range hit means the append protocol was violated somewhere;
            // drop it but make the anomaly visible.
            match state.chunks.get(hit.index) {
                Some(chunk) => {
                    chunks.push(chunk.clone());
                    scores.push(hit.score);
                }
                None => {
                    tracing::warn!(
                        index = hit.index,
                        store_len = state.chunks.len(),
                        "Search hit beyond chunk store; dropping result"
                    );
                }
            }
        }

        if let Some(top) = scores.first() {
            tracing::debug!(
                top_score = top,
                band = ?interpret_score(*top),
                results = scores.len(),
                "Retrieval completed"
            );
        }

        Ok(RetrievedChunks { chunks, scores })
    }

    /// Number of chunks currently indexed.
    pub async fn indexed_chunks(&self) -> usize {
        self.state.read().await.len()
    }

    async fn embed_normalized(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut vectors = self.embedding_client.generate_embeddings(texts).await?;
        for vector in &mut vectors {
            normalize_l2(vector);
        }
        Ok(vectors)
    }
}
