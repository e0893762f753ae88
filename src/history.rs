//! In-memory persistence boundary for query and document logs.
//!
//! The retrieval core emits one record per completed query and per completed ingestion;
//! how those records are stored is this module's concern alone. The stores are
//! append-only and volatile: nothing survives a process restart, which matches the
//! index's own lifetime.

use serde::Serialize;
use std::sync::Mutex;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One completed query: question, generated answer, and the quality signal.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    /// The user's question.
    pub question: String,
    /// The generated answer.
    pub answer: String,
    /// Mean similarity of the retrieved chunks, `None` when nothing was retrieved.
    pub mean_similarity: Option<f32>,
    /// RFC 3339 timestamp of when the query completed.
    pub timestamp: String,
}

/// One completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    /// Identifier assigned to the document.
    pub doc_id: String,
    /// Original filename supplied with the upload.
    pub filename: String,
    /// Number of chunks indexed for the document.
    pub chunk_count: usize,
    /// Length of the extracted text in bytes.
    pub total_text_length: usize,
    /// RFC 3339 timestamp of when the ingestion completed.
    pub timestamp: String,
}

/// Append-only store of completed queries.
#[derive(Default)]
pub struct QueryLogStore {
    records: Mutex<Vec<QueryRecord>>,
}

impl QueryLogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed query.
    pub fn record(&self, question: &str, answer: &str, mean_similarity: Option<f32>) {
        let record = QueryRecord {
            question: question.to_string(),
            answer: answer.to_string(),
            mean_similarity,
            timestamp: now_rfc3339(),
        };
        self.records
            .lock()
            .expect("query log lock poisoned")
            .push(record);
    }

    /// Return up to `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<QueryRecord> {
        let records = self.records.lock().expect("query log lock poisoned");
        records.iter().rev().take(limit).cloned().collect()
    }
}

/// Append-only store of completed ingestions.
#[derive(Default)]
pub struct DocumentLogStore {
    records: Mutex<Vec<DocumentRecord>>,
}

impl DocumentLogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed ingestion.
    pub fn record(&self, doc_id: &str, filename: &str, chunk_count: usize, total_text_length: usize) {
        let record = DocumentRecord {
            doc_id: doc_id.to_string(),
            filename: filename.to_string(),
            chunk_count,
            total_text_length,
            timestamp: now_rfc3339(),
        };
        self.records
            .lock()
            .expect("document log lock poisoned")
            .push(record);
    }

    /// Return all records, newest first.
    pub fn list(&self) -> Vec<DocumentRecord> {
        let records = self.records.lock().expect("document log lock poisoned");
        records.iter().rev().cloned().collect()
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
