use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use httpmock::{Method::POST, MockServer};
use ragserve::{api, config, service::RagService};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tower::ServiceExt;

static INIT: OnceCell<()> = OnceCell::const_new();
static MOCK_SERVER: OnceCell<&'static MockServer> = OnceCell::const_new();

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests run in a single process and establish deterministic configuration upfront.
    unsafe { std::env::set_var(key, value) }
}

async fn init_harness() {
    INIT.get_or_init(|| async {
        let mock_server_owned = MockServer::start_async().await;
        let mock_server = Box::leak(Box::new(mock_server_owned));
        let base_url = mock_server.base_url();

        set_env("EMBEDDING_PROVIDER", "hash");
        set_env("EMBEDDING_MODEL", "hash-test");
        set_env("EMBEDDING_DIMENSION", "64");
        set_env("CHUNK_TARGET_SIZE", "10");
        set_env("CHUNK_OVERLAP_SIZE", "2");
        set_env("EXTRACTION_MIN_TEXT_LENGTH", "1");
        set_env("GENERATION_BASE_URL", &base_url);
        set_env("OPENROUTER_API_KEY", "test-key");

        mock_server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-test",
                    "choices": [
                        {
                            "message": {
                                "role": "assistant",
                                "content": "The maintenance manual says to replace the filter monthly."
                            }
                        }
                    ]
                }));
            })
            .await;

        MOCK_SERVER.set(mock_server).ok();
        config::init_config();
    })
    .await;
}

async fn json_response(
    app: axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(payload) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    };
    let response = app.oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn full_pipeline_round_trip() {
    init_harness().await;

    let service = Arc::new(RagService::new().await);
    let app = api::create_router(service);

    let (status, health) = json_response(app.clone(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    // Before any scored query the metrics endpoint reports the empty-history hint.
    let (status, metrics) = json_response(app.clone(), Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        metrics["message"]
            .as_str()
            .expect("message")
            .contains("Insufficient data")
    );

    let document = "The maintenance manual covers the air handling unit in detail. \
        Replace the intake filter once per month during heavy use. \
        Inspect the belt tension every quarter and log the reading. \
        Lubricate the bearing assembly twice a year with approved grease.";
    let (status, ingest) = json_response(
        app.clone(),
        Method::POST,
        "/ingest",
        Some(json!({ "filename": "manual.txt", "content": document })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ingest["message"],
        "Document processed and added to knowledge base"
    );
    let doc_id = ingest["doc_id"].as_str().expect("doc_id").to_string();
    let chunk_count = ingest["chunk_count"].as_u64().expect("chunk_count");
    assert!(chunk_count > 1, "small target size should produce several chunks");

    let (status, query) = json_response(
        app.clone(),
        Method::POST,
        "/query",
        Some(json!({ "question": "How often should the intake filter be replaced?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        query["answer"],
        "The maintenance manual says to replace the filter monthly."
    );
    assert!(query["similarity"].as_f64().is_some());
    assert!(!query["sources"].as_array().expect("sources").is_empty());

    let (status, history) = json_response(app.clone(), Method::GET, "/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().expect("history array");
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0]["question"],
        "How often should the intake filter be replaced?"
    );
    assert!(history[0]["mean_similarity"].as_f64().is_some());

    let (status, documents) = json_response(app.clone(), Method::GET, "/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    let documents = documents.as_array().expect("documents array");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["doc_id"], doc_id);
    assert_eq!(documents[0]["filename"], "manual.txt");
    assert!(documents[0]["avg_chunk_size"].as_u64().expect("avg") > 0);

    let (status, metrics) = json_response(app.clone(), Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["total_queries"], 1);
    assert_eq!(metrics["scored_queries"], 1);
    assert!(metrics["avg_similarity"].as_f64().is_some());
    assert!(metrics["similarity_std"].as_f64().is_some());
    assert_eq!(metrics["documents_ingested"], 1);

    let (status, error_body) = json_response(
        app,
        Method::POST,
        "/ingest",
        Some(json!({ "filename": "blank.txt", "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let _ = error_body;
}
