//! Document ingestion: byte extraction boundary and the chunk-and-index pipeline.
//!
//! Text extraction is a collaborator, not core logic: the pipeline only requires a
//! non-empty string and tolerates arbitrary extraction noise. What is modeled here is the
//! strategy selection between a primary and a fallback extractor, driven by an explicit
//! minimum-length threshold instead of a magic number buried in control flow.

use crate::config::{ChunkStrategy, Config};
use crate::index::ChunkMetadata;
use crate::retrieval::{Chunker, ChunkingError, RetrievalError, Retriever};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by text extractors.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Extractor could not produce text from the supplied bytes.
    #[error("text extraction failed: {0}")]
    Failed(String),
}

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Both extractors failed to produce text.
    #[error("Failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// Extraction produced no usable text (possibly a scanned document needing OCR).
    #[error("no text could be extracted from the document")]
    EmptyDocument,
    /// The extracted text could not be split into chunks.
    #[error("document text could not be split into chunks")]
    NoChunks,
    /// Indexing the produced chunks failed.
    #[error("Failed to index document chunks: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// Summary of a completed ingestion returned to API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    /// Identifier assigned to the ingested document.
    pub doc_id: String,
    /// Original filename supplied with the upload.
    pub filename: String,
    /// Number of chunks produced and indexed.
    pub chunk_count: usize,
    /// Length of the extracted text in bytes.
    pub total_text_length: usize,
    /// Average chunk length derived from the text length.
    pub avg_chunk_length: usize,
}

/// Boundary contract for turning raw document bytes into text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from the supplied bytes.
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;

    /// Short label used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Extractor that requires well-formed UTF-8.
pub struct StrictUtf8Extractor;

impl TextExtractor for StrictUtf8Extractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| ExtractionError::Failed(err.to_string()))
    }

    fn name(&self) -> &'static str {
        "strict-utf8"
    }
}

/// Extractor that accepts arbitrary bytes, replacing invalid sequences.
///
/// Slower-but-tolerant fallback: garbled spans degrade retrieval quality for the affected
/// chunks but never block ingestion.
pub struct LossyUtf8Extractor;

impl TextExtractor for LossyUtf8Extractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn name(&self) -> &'static str {
        "lossy-utf8"
    }
}

/// Run the primary extractor, falling back when it fails or yields short output.
///
/// Decision rules, in order:
/// 1. Primary succeeds with at least `min_text_length` bytes of trimmed text: keep it.
/// 2. Primary succeeds but the text is short (complex layouts often extract poorly):
///    prefer the fallback's output, keeping the short primary text if the fallback fails.
/// 3. Primary fails outright: the fallback's result decides.
pub fn select_extraction(
    primary: &dyn TextExtractor,
    fallback: &dyn TextExtractor,
    bytes: &[u8],
    min_text_length: usize,
) -> Result<String, ExtractionError> {
    match primary.extract(bytes) {
        Ok(text) if text.trim().len() >= min_text_length => Ok(text),
        Ok(short) => match fallback.extract(bytes) {
            Ok(text) => {
                tracing::debug!(
                    primary = primary.name(),
                    fallback = fallback.name(),
                    primary_len = short.trim().len(),
                    min_text_length,
                    "Primary extraction short; using fallback output"
                );
                Ok(text)
            }
            Err(err) => {
                tracing::debug!(
                    fallback = fallback.name(),
                    error = %err,
                    "Fallback extraction failed; keeping short primary output"
                );
                Ok(short)
            }
        },
        Err(err) => {
            tracing::debug!(
                primary = primary.name(),
                error = %err,
                "Primary extraction failed; trying fallback"
            );
            fallback.extract(bytes)
        }
    }
}

/// Coordinates the pipeline from uploaded bytes to indexed chunks.
pub struct DocumentIngestor {
    chunker: Chunker,
    strategy: ChunkStrategy,
    primary: Box<dyn TextExtractor>,
    fallback: Box<dyn TextExtractor>,
    min_text_length: usize,
}

impl DocumentIngestor {
    /// Build an ingestor from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        let chunker = Chunker::new(
            config.chunk_target_size,
            config.chunk_overlap_size,
            config.chunk_overlap_sentence_words,
        )?;
        Ok(Self {
            chunker,
            strategy: config.chunk_strategy,
            primary: Box::new(StrictUtf8Extractor),
            fallback: Box::new(LossyUtf8Extractor),
            min_text_length: config.extraction_min_text_length,
        })
    }

    /// Extract, chunk, and index a document; returns the ingestion summary.
    pub async fn ingest(
        &self,
        retriever: &Retriever,
        bytes: &[u8],
        filename: &str,
    ) -> Result<IngestionOutcome, IngestionError> {
        let text = select_extraction(
            self.primary.as_ref(),
            self.fallback.as_ref(),
            bytes,
            self.min_text_length,
        )?;
        if text.trim().is_empty() {
            return Err(IngestionError::EmptyDocument);
        }

        let chunks = self.chunker.split(&text, self.strategy);
        if chunks.is_empty() {
            return Err(IngestionError::NoChunks);
        }

        let doc_id = Uuid::new_v4().to_string();
        let metadata: Vec<ChunkMetadata> = (0..chunks.len())
            .map(|position| ChunkMetadata::for_document(&doc_id, filename, position))
            .collect();

        let total_text_length = text.len();
        let chunk_count = retriever.add_chunks(chunks, Some(metadata)).await?;

        tracing::info!(
            doc_id = %doc_id,
            filename,
            chunk_count,
            total_text_length,
            "Document ingested"
        );

        Ok(IngestionOutcome {
            doc_id,
            filename: filename.to_string(),
            chunk_count,
            total_text_length,
            avg_chunk_length: total_text_length / chunk_count,
        })
    }
}
