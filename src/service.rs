//! Top-level service wiring the retrieval core to its collaborators.
//!
//! [`RagService`] replaces the usual pile of module-level singletons with one explicitly
//! constructed object: embedding client, retriever, generation client, log stores, and
//! metrics are built in a documented order (configuration, then the embedding model
//! client, then the seeded index) near process start and shared through an `Arc`.

use crate::{
    config::get_config,
    embedding::build_embedding_client,
    generation::{GenerationClient, GenerationError, OpenRouterClient},
    history::{DocumentLogStore, DocumentRecord, QueryLogStore, QueryRecord},
    ingestion::{DocumentIngestor, IngestionError, IngestionOutcome},
    metrics::{MetricsSnapshot, RetrievalMetrics},
    retrieval::{RetrievalError, Retriever},
};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors emitted while answering a question end to end.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The retrieval step failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    /// The generation boundary failed.
    #[error("Answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Result of a completed query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// The generated answer.
    pub answer: String,
    /// Mean similarity across the retrieved chunks, `None` when nothing was retrieved.
    pub mean_similarity: Option<f32>,
    /// Chunk texts supplied to the generator, in ranked order.
    pub sources: Vec<String>,
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Extract, chunk, embed, and index an uploaded document.
    async fn ingest_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionOutcome, IngestionError>;

    /// Retrieve relevant chunks and generate an answer for a question.
    async fn answer_question(&self, question: &str) -> Result<QueryOutcome, QueryError>;

    /// Most recent query records, newest first.
    fn recent_queries(&self, limit: usize) -> Vec<QueryRecord>;

    /// All ingested document records, newest first.
    fn ingested_documents(&self) -> Vec<DocumentRecord>;

    /// Current quality-signal snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns every long-lived component of the question-answering pipeline.
pub struct RagService {
    retriever: Retriever,
    ingestor: DocumentIngestor,
    generator: Box<dyn GenerationClient>,
    query_log: QueryLogStore,
    document_log: DocumentLogStore,
    metrics: RetrievalMetrics,
    top_k: usize,
    context_chunks: usize,
}

impl RagService {
    /// Build the service from the global configuration and seed the example knowledge base.
    ///
    /// The index is rebuilt in memory on every start; seeding a small fixed set means the
    /// system answers something sensible out of the box, before any upload.
    pub async fn new() -> Self {
        let config = get_config();
        tracing::info!("Initializing embedding client");
        let embedding_client =
            build_embedding_client(config).expect("Failed to initialize embedding client");
        let retriever = Retriever::new(embedding_client);
        retriever
            .seed_initial(example_knowledge_base())
            .await
            .expect("Failed to seed example knowledge base");

        let ingestor =
            DocumentIngestor::from_config(config).expect("Failed to configure document ingestor");
        let generator: Box<dyn GenerationClient> = Box::new(
            OpenRouterClient::from_config(config)
                .expect("Failed to initialize generation client"),
        );

        Self {
            retriever,
            ingestor,
            generator,
            query_log: QueryLogStore::new(),
            document_log: DocumentLogStore::new(),
            metrics: RetrievalMetrics::new(),
            top_k: config.retrieval_top_k,
            context_chunks: config.generation_context_chunks,
        }
    }

    /// Answer a question: retrieve top-k chunks, generate, and log the quality signal.
    pub async fn answer_question(&self, question: &str) -> Result<QueryOutcome, QueryError> {
        let retrieved = self
            .retriever
            .find_relevant_chunks(question, self.top_k)
            .await?;
        // Bound the prompt: the generator sees at most `context_chunks` chunks.
        let sources = retrieved.texts_truncated(self.context_chunks);
        let answer = self.generator.generate_answer(question, &sources).await?;

        let mean_similarity = retrieved.mean_score();
        self.metrics.record_query(mean_similarity);
        self.query_log.record(question, &answer, mean_similarity);
        tracing::info!(
            retrieved = retrieved.chunks.len(),
            context = sources.len(),
            mean_similarity = ?mean_similarity,
            "Query answered"
        );

        Ok(QueryOutcome {
            answer,
            mean_similarity,
            sources,
        })
    }

    /// Ingest a document and record its summary.
    pub async fn ingest_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionOutcome, IngestionError> {
        let outcome = self
            .ingestor
            .ingest(&self.retriever, &bytes, filename)
            .await?;
        self.metrics.record_document(outcome.chunk_count as u64);
        self.document_log.record(
            &outcome.doc_id,
            &outcome.filename,
            outcome.chunk_count,
            outcome.total_text_length,
        );
        Ok(outcome)
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionOutcome, IngestionError> {
        RagService::ingest_document(self, bytes, filename).await
    }

    async fn answer_question(&self, question: &str) -> Result<QueryOutcome, QueryError> {
        RagService::answer_question(self, question).await
    }

    fn recent_queries(&self, limit: usize) -> Vec<QueryRecord> {
        self.query_log.recent(limit)
    }

    fn ingested_documents(&self) -> Vec<DocumentRecord> {
        self.document_log.list()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Small fixed knowledge base indexed on a cold start.
///
/// Gives new deployments something to retrieve before the first upload.
fn example_knowledge_base() -> Vec<String> {
    vec![
        "Retrieval-augmented generation grounds a language model's answers in retrieved documents.".to_string(),
        "Vector indexes store embeddings so that similar texts can be found by similarity search.".to_string(),
        "Documents are split into overlapping chunks before being embedded and indexed.".to_string(),
        "Cosine similarity measures how directionally close two embedding vectors are.".to_string(),
        "Uploading a document adds its chunks to the searchable knowledge base.".to_string(),
    ]
}
