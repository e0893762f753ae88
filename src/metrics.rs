//! Quality-signal aggregation over the similarity history.
//!
//! Each answered query contributes one scalar (the mean of its top-k similarity scores)
//! or `None` when it was answered before anything was indexed. The aggregator derives
//! descriptive statistics from that history as an operational health signal: a low mean
//! suggests questions are landing outside the knowledge base.

use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mean per-query similarity above which the system is considered healthy.
const HEALTHY_MEAN_THRESHOLD: f64 = 0.5;

/// Thread-safe accumulator for ingestion counters and the similarity history.
#[derive(Default)]
pub struct RetrievalMetrics {
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    // Append-only; never replayed for per-query lookup.
    similarity_history: Mutex<Vec<Option<f32>>>,
}

impl RetrievalMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document and the number of chunks produced for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Append one query's mean similarity to the history.
    ///
    /// `None` records a query answered with nothing retrieved; it still counts toward the
    /// query total but contributes no score.
    pub fn record_query(&self, mean_similarity: Option<f32>) {
        self.similarity_history
            .lock()
            .expect("similarity history lock poisoned")
            .push(mean_similarity);
    }

    /// Return a snapshot of the current counters and similarity statistics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let history = self
            .similarity_history
            .lock()
            .expect("similarity history lock poisoned")
            .clone();
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            similarity: summarize(&history),
        }
    }
}

/// Immutable view of the counters and the derived similarity summary.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_ingested: u64,
    /// Total chunk count produced across all ingested documents.
    pub chunks_indexed: u64,
    /// Similarity statistics derived from the query history.
    pub similarity: SimilaritySummary,
}

/// Similarity statistics, or an explicit insufficient-data marker.
///
/// Both the empty history and the all-null history (queries answered before any chunk
/// existed) report `InsufficientData` rather than a computed number; neither is an error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SimilaritySummary {
    /// Not enough scored queries to compute statistics.
    InsufficientData {
        /// Total queries answered so far, including unscored ones.
        total_queries: u64,
    },
    /// Computed descriptive statistics.
    Computed(SimilarityStats),
}

/// Descriptive statistics of per-query mean similarity.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityStats {
    /// Total queries answered, including unscored ones.
    pub total_queries: u64,
    /// Queries that contributed a similarity score.
    pub scored_queries: u64,
    /// Mean of the per-query similarities.
    pub mean: f64,
    /// Minimum observed per-query similarity.
    pub min: f64,
    /// Maximum observed per-query similarity.
    pub max: f64,
    /// Population standard deviation of the per-query similarities.
    pub std_dev: f64,
    /// Health classification derived from the mean.
    pub health: HealthSignal,
}

/// Operator-facing health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthSignal {
    /// Mean similarity above 0.5: questions match the knowledge base well.
    Good,
    /// Mean similarity at or below 0.5: consider adding more relevant documents.
    BroadenKnowledgeBase,
}

/// Derive the similarity summary from a history of per-query means.
fn summarize(history: &[Option<f32>]) -> SimilaritySummary {
    let total_queries = history.len() as u64;
    let scored: Vec<f64> = history
        .iter()
        .filter_map(|entry| entry.map(f64::from))
        .collect();

    if scored.is_empty() {
        return SimilaritySummary::InsufficientData { total_queries };
    }

    let count = scored.len() as f64;
    let mean = scored.iter().sum::<f64>() / count;
    let min = scored.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scored.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = scored
        .iter()
        .map(|score| {
            let delta = score - mean;
            delta * delta
        })
        .sum::<f64>()
        / count;
    let health = if mean > HEALTHY_MEAN_THRESHOLD {
        HealthSignal::Good
    } else {
        HealthSignal::BroadenKnowledgeBase
    };

    SimilaritySummary::Computed(SimilarityStats {
        total_queries,
        scored_queries: scored.len() as u64,
        mean,
        min,
        max,
        std_dev: variance.sqrt(),
        health,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(snapshot: &MetricsSnapshot) -> &SimilarityStats {
        match &snapshot.similarity {
            SimilaritySummary::Computed(stats) => stats,
            SimilaritySummary::InsufficientData { .. } => panic!("expected computed stats"),
        }
    }

    #[test]
    fn empty_history_reports_insufficient_data() {
        let metrics = RetrievalMetrics::new();
        let snapshot = metrics.snapshot();
        assert!(matches!(
            snapshot.similarity,
            SimilaritySummary::InsufficientData { total_queries: 0 }
        ));
    }

    #[test]
    fn all_null_history_reports_insufficient_data_with_query_count() {
        let metrics = RetrievalMetrics::new();
        metrics.record_query(None);
        metrics.record_query(None);

        let snapshot = metrics.snapshot();
        assert!(matches!(
            snapshot.similarity,
            SimilaritySummary::InsufficientData { total_queries: 2 }
        ));
    }

    #[test]
    fn computes_population_statistics() {
        let metrics = RetrievalMetrics::new();
        for score in [0.8, 0.6, 0.9, 0.3] {
            metrics.record_query(Some(score));
        }

        let snapshot = metrics.snapshot();
        let stats = stats(&snapshot);
        assert_eq!(stats.total_queries, 4);
        assert_eq!(stats.scored_queries, 4);
        assert!((stats.mean - 0.65).abs() < 1e-6);
        assert!((stats.min - 0.3).abs() < 1e-6);
        assert!((stats.max - 0.9).abs() < 1e-6);
        // population standard deviation, not the sample estimator
        assert!((stats.std_dev - 0.229_128).abs() < 1e-3);
        assert_eq!(stats.health, HealthSignal::Good);
    }

    #[test]
    fn low_mean_recommends_broadening_the_knowledge_base() {
        let metrics = RetrievalMetrics::new();
        metrics.record_query(Some(0.2));
        metrics.record_query(Some(0.3));

        let snapshot = metrics.snapshot();
        assert_eq!(stats(&snapshot).health, HealthSignal::BroadenKnowledgeBase);
    }

    #[test]
    fn null_entries_count_toward_totals_but_not_stats() {
        let metrics = RetrievalMetrics::new();
        metrics.record_query(None);
        metrics.record_query(Some(0.8));

        let snapshot = metrics.snapshot();
        let stats = stats(&snapshot);
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.scored_queries, 1);
        assert!((stats.mean - 0.8).abs() < 1e-6);
        assert!(stats.std_dev.abs() < 1e-9);
    }

    #[test]
    fn records_documents_and_chunks() {
        let metrics = RetrievalMetrics::new();
        metrics.record_document(2);
        metrics.record_document(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.chunks_indexed, 5);
    }
}
