//! HTTP surface for ragserve.
//!
//! A compact Axum router over the shared pipeline:
//!
//! - `POST /ingest` – Extract, chunk, embed, and index an uploaded document; returns the
//!   ingestion summary (`doc_id`, `chunk_count`, `total_text_length`, `avg_chunk_length`).
//! - `POST /query` – Retrieve relevant chunks, generate an answer, and log the quality
//!   signal; returns `{answer, similarity, sources}`.
//! - `GET /history` – Last 10 queries with answers and similarity, newest first.
//! - `GET /metrics` – Quality-signal statistics over the similarity history.
//! - `GET /documents` – Ingested document summaries, newest first.
//! - `GET /health` – Liveness probe.
//!
//! Routing and validation stay thin here; all behavior lives in the service behind
//! [`RagApi`].

use crate::generation::GenerationError;
use crate::ingestion::IngestionError;
use crate::metrics::SimilaritySummary;
use crate::retrieval::RetrievalError;
use crate::service::{QueryError, RagApi};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Number of query records returned by `GET /history`.
const HISTORY_LIMIT: usize = 10;

/// Build the HTTP router exposing the question-answering API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_document::<S>))
        .route("/query", post(ask_question::<S>))
        .route("/history", get(get_history::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/documents", get(list_documents::<S>))
        .route("/health", get(health_check))
        .with_state(service)
}

/// Request body for `POST /ingest`.
#[derive(Deserialize)]
struct IngestRequest {
    /// Original filename, kept as chunk provenance.
    filename: String,
    /// Raw document contents.
    content: String,
}

/// Success response for `POST /ingest`.
#[derive(Serialize)]
struct IngestResponse {
    message: &'static str,
    doc_id: String,
    filename: String,
    chunk_count: usize,
    total_text_length: usize,
    avg_chunk_length: usize,
}

/// Ingest a document into the knowledge base.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError>
where
    S: RagApi,
{
    let outcome = service
        .ingest_document(request.content.into_bytes(), &request.filename)
        .await?;
    tracing::info!(
        doc_id = %outcome.doc_id,
        filename = %outcome.filename,
        chunks = outcome.chunk_count,
        "Ingest request completed"
    );
    Ok(Json(IngestResponse {
        message: "Document processed and added to knowledge base",
        doc_id: outcome.doc_id,
        filename: outcome.filename,
        chunk_count: outcome.chunk_count,
        total_text_length: outcome.total_text_length,
        avg_chunk_length: outcome.avg_chunk_length,
    }))
}

/// Request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

/// Success response for `POST /query`.
#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    similarity: Option<f32>,
    sources: Vec<String>,
}

/// Answer a question grounded in the indexed chunks.
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: RagApi,
{
    let outcome = service.answer_question(&request.question).await?;
    Ok(Json(QueryResponse {
        answer: outcome.answer,
        similarity: outcome.mean_similarity,
        sources: outcome.sources,
    }))
}

/// Return the last 10 queries, newest first.
async fn get_history<S>(State(service): State<Arc<S>>) -> Json<serde_json::Value>
where
    S: RagApi,
{
    Json(json!(service.recent_queries(HISTORY_LIMIT)))
}

/// Return quality-signal statistics over the similarity history.
///
/// Before any scored query exists this reports an explicit message instead of numbers;
/// "no data yet" is an expected state, not a failure.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<serde_json::Value>
where
    S: RagApi,
{
    let snapshot = service.metrics_snapshot();
    match &snapshot.similarity {
        SimilaritySummary::InsufficientData { total_queries } => Json(json!({
            "message": "Insufficient data - upload some documents and ask questions",
            "total_queries": total_queries,
            "documents_ingested": snapshot.documents_ingested,
            "chunks_indexed": snapshot.chunks_indexed,
        })),
        SimilaritySummary::Computed(stats) => Json(json!({
            "total_queries": stats.total_queries,
            "scored_queries": stats.scored_queries,
            "avg_similarity": stats.mean,
            "min_similarity": stats.min,
            "max_similarity": stats.max,
            "similarity_std": stats.std_dev,
            "health": stats.health,
            "documents_ingested": snapshot.documents_ingested,
            "chunks_indexed": snapshot.chunks_indexed,
        })),
    }
}

/// List ingested documents with derived chunk-size information.
async fn list_documents<S>(State(service): State<Arc<S>>) -> Json<serde_json::Value>
where
    S: RagApi,
{
    let documents: Vec<serde_json::Value> = service
        .ingested_documents()
        .into_iter()
        .map(|record| {
            let avg_chunk_size = if record.chunk_count > 0 {
                record.total_text_length / record.chunk_count
            } else {
                0
            };
            json!({
                "doc_id": record.doc_id,
                "filename": record.filename,
                "chunk_count": record.chunk_count,
                "total_text_length": record.total_text_length,
                "timestamp": record.timestamp,
                "avg_chunk_size": avg_chunk_size,
            })
        })
        .collect();
    Json(json!(documents))
}

/// Liveness probe.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

enum AppError {
    Ingestion(IngestionError),
    Query(QueryError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Ingestion(error) => match error {
                IngestionError::Extraction(_)
                | IngestionError::EmptyDocument
                | IngestionError::NoChunks => (StatusCode::BAD_REQUEST, error.to_string()),
                IngestionError::Retrieval(RetrievalError::MetadataLengthMismatch { .. }) => {
                    (StatusCode::BAD_REQUEST, error.to_string())
                }
                IngestionError::Retrieval(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                }
            },
            AppError::Query(error) => match error {
                QueryError::Generation(GenerationError::MissingApiKey) => {
                    (StatusCode::SERVICE_UNAVAILABLE, error.to_string())
                }
                QueryError::Generation(_) => (StatusCode::BAD_GATEWAY, error.to_string()),
                QueryError::Retrieval(_) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            },
        };
        (status, message).into_response()
    }
}

impl From<IngestionError> for AppError {
    fn from(inner: IngestionError) -> Self {
        Self::Ingestion(inner)
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        Self::Query(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::history::{DocumentRecord, QueryRecord};
    use crate::ingestion::{IngestionError, IngestionOutcome};
    use crate::metrics::{MetricsSnapshot, SimilaritySummary};
    use crate::service::{QueryError, QueryOutcome, RagApi};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Clone, Debug)]
    struct IngestCall {
        filename: String,
        bytes: Vec<u8>,
    }

    struct StubRagService {
        ingest_calls: Mutex<Vec<IngestCall>>,
        ingest_result: Option<IngestionOutcome>,
        query_outcome: Option<QueryOutcome>,
        snapshot: MetricsSnapshot,
    }

    impl StubRagService {
        fn new() -> Self {
            Self {
                ingest_calls: Mutex::new(Vec::new()),
                ingest_result: None,
                query_outcome: None,
                snapshot: MetricsSnapshot {
                    documents_ingested: 0,
                    chunks_indexed: 0,
                    similarity: SimilaritySummary::InsufficientData { total_queries: 0 },
                },
            }
        }
    }

    #[async_trait]
    impl RagApi for StubRagService {
        async fn ingest_document(
            &self,
            bytes: Vec<u8>,
            filename: &str,
        ) -> Result<IngestionOutcome, IngestionError> {
            self.ingest_calls.lock().expect("calls lock").push(IngestCall {
                filename: filename.to_string(),
                bytes,
            });
            match &self.ingest_result {
                Some(outcome) => Ok(outcome.clone()),
                None => Err(IngestionError::EmptyDocument),
            }
        }

        async fn answer_question(&self, _question: &str) -> Result<QueryOutcome, QueryError> {
            match &self.query_outcome {
                Some(outcome) => Ok(outcome.clone()),
                None => Err(QueryError::Generation(
                    crate::generation::GenerationError::MissingApiKey,
                )),
            }
        }

        fn recent_queries(&self, _limit: usize) -> Vec<QueryRecord> {
            vec![QueryRecord {
                question: "q".into(),
                answer: "a".into(),
                mean_similarity: Some(0.7),
                timestamp: "2026-01-01T00:00:00Z".into(),
            }]
        }

        fn ingested_documents(&self) -> Vec<DocumentRecord> {
            vec![DocumentRecord {
                doc_id: "doc-1".into(),
                filename: "report.txt".into(),
                chunk_count: 4,
                total_text_length: 400,
                timestamp: "2026-01-01T00:00:00Z".into(),
            }]
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            self.snapshot.clone()
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn ingest_route_passes_bytes_and_filename_through() {
        let mut stub = StubRagService::new();
        stub.ingest_result = Some(IngestionOutcome {
            doc_id: "doc-7".into(),
            filename: "manual.txt".into(),
            chunk_count: 3,
            total_text_length: 300,
            avg_chunk_length: 100,
        });
        let service = Arc::new(stub);
        let app = create_router(service.clone());

        let payload = json!({ "filename": "manual.txt", "content": "Document body" });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["doc_id"], "doc-7");
        assert_eq!(json["chunk_count"], 3);

        let calls = service.ingest_calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filename, "manual.txt");
        assert_eq!(calls[0].bytes, b"Document body");
    }

    #[tokio::test]
    async fn ingest_route_maps_empty_document_to_bad_request() {
        let service = Arc::new(StubRagService::new());
        let app = create_router(service);

        let payload = json!({ "filename": "blank.txt", "content": "" });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn query_route_returns_answer_similarity_and_sources() {
        let mut stub = StubRagService::new();
        stub.query_outcome = Some(QueryOutcome {
            answer: "Grounded answer.".into(),
            mean_similarity: Some(0.72),
            sources: vec!["chunk a".into(), "chunk b".into()],
        });
        let app = create_router(Arc::new(stub));

        let payload = json!({ "question": "what does the report say?" });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["answer"], "Grounded answer.");
        assert!((json["similarity"].as_f64().expect("similarity") - 0.72).abs() < 1e-6);
        assert_eq!(json["sources"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn query_route_maps_missing_api_key_to_service_unavailable() {
        let app = create_router(Arc::new(StubRagService::new()));

        let payload = json!({ "question": "anything" });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_route_reports_insufficient_data_message() {
        let app = create_router(Arc::new(StubRagService::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["message"].as_str().expect("message").contains("Insufficient data"));
        assert_eq!(json["total_queries"], 0);
    }

    #[tokio::test]
    async fn history_and_documents_routes_render_records() {
        let app = create_router(Arc::new(StubRagService::new()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/history")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let history = body_json(response).await;
        assert_eq!(history[0]["question"], "q");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let documents = body_json(response).await;
        assert_eq!(documents[0]["doc_id"], "doc-1");
        assert_eq!(documents[0]["avg_chunk_size"], 100);
    }

    #[tokio::test]
    async fn health_route_reports_healthy() {
        let app = create_router(Arc::new(StubRagService::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }
}
