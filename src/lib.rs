#![deny(missing_docs)]

//! Core library for the ragserve question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Answer generation against an OpenRouter-compatible API.
pub mod generation;
/// In-memory query and document logs.
pub mod history;
/// Flat inner-product vector index and chunk store.
pub mod index;
/// Document extraction and ingestion pipeline.
pub mod ingestion;
/// Structured logging and tracing setup.
pub mod logging;
/// Retrieval quality-signal aggregation.
pub mod metrics;
/// Chunking and semantic retrieval.
pub mod retrieval;
/// Pipeline orchestration behind the HTTP surface.
pub mod service;
