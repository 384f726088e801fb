//! Core records shared across storelens crates.
//!
//! These types are plain serde structs: they travel between the service layer,
//! the projection pipeline, the viewer, and the JSON report files written by
//! the CLI.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type StoreId = String;
pub type FileId = String;
pub type Timestamp = i64; // Unix timestamp (seconds), as returned by the API.

/// Summary of a remote vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDetails {
    pub id: StoreId,
    pub name: String,
    pub created_at: Timestamp,
    /// Number of files the store reports as completed.
    pub file_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Failed,
}

/// Result of uploading and attaching one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub file: String,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn success(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: UploadStatus::Success,
            error: None,
        }
    }

    pub fn failed(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: UploadStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

/// Aggregate of a batch upload. `errors` holds exactly the failed outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub total_files: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub errors: Vec<UploadOutcome>,
}

impl UploadStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: UploadOutcome) {
        if outcome.is_success() {
            self.successful_uploads += 1;
        } else {
            self.failed_uploads += 1;
            self.errors.push(outcome);
        }
    }
}

/// One chunk returned by a direct vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file_id: FileId,
    pub filename: String,
    pub score: f32,
    pub content: Vec<String>,
}

impl SearchHit {
    /// Length in characters of the first content part (0 when there is none).
    pub fn content_len(&self) -> usize {
        self.content.first().map_or(0, |t| t.chars().count())
    }
}

/// Answer produced by a model using the file_search tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSearchResult {
    /// Cited filenames, deduplicated in first-seen order.
    pub files_used: Vec<String>,
    pub response: String,
}

/// Generated evaluation questions keyed by PDF filename.
pub type Questions = IndexMap<String, String>;

/// Per-query evaluation detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub expected_filename: String,
    pub retrieved: Vec<String>,
    pub correct: bool,
    pub reciprocal_rank: f64,
    pub average_precision: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Retrieval quality over a question set at cutoff `k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub k: usize,
    pub recall_at_k: f64,
    pub precision_at_k: f64,
    pub mrr: f64,
    pub map: f64,
    pub total_queries: usize,
    pub failed_queries: usize,
}

impl RetrievalMetrics {
    /// Metrics keyed the way reports and the CLI print them:
    /// `recall@k`, `precision@k`, `mrr`, `map`.
    pub fn as_report(&self) -> IndexMap<String, f64> {
        let mut out = IndexMap::with_capacity(4);
        out.insert(format!("recall@{}", self.k), self.recall_at_k);
        out.insert(format!("precision@{}", self.k), self.precision_at_k);
        out.insert("mrr".to_string(), self.mrr);
        out.insert("map".to_string(), self.map);
        out
    }
}

/// A fetched embedding with the document fields carried into the plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPoint {
    pub id: String,
    pub filename: String,
    pub embedding: Vec<f32>,
    pub metadata: IndexMap<String, serde_json::Value>,
    pub text: String,
}

/// Cluster label assigned to points the clusterer treats as noise.
pub const NOISE_CLUSTER: i32 = -1;

/// One row of the visualization table: reduced coordinates plus document info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualRow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub id: String,
    pub filename: String,
    pub cluster: i32,
    pub text_preview: String,
    pub metadata: IndexMap<String, serde_json::Value>,
}

pub mod config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_stats_split_successes_and_failures() {
        let mut stats = UploadStats::new(3);
        stats.record(UploadOutcome::success("a.pdf"));
        stats.record(UploadOutcome::failed("b.pdf", "boom"));
        stats.record(UploadOutcome::success("c.pdf"));

        assert_eq!(stats.successful_uploads, 2);
        assert_eq!(stats.failed_uploads, 1);
        assert_eq!(
            stats.successful_uploads + stats.failed_uploads,
            stats.total_files
        );
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].file, "b.pdf");
    }

    #[test]
    fn upload_outcome_serializes_like_report() {
        let ok = serde_json::to_value(UploadOutcome::success("a.pdf")).unwrap();
        assert_eq!(ok, serde_json::json!({"file": "a.pdf", "status": "success"}));

        let failed = serde_json::to_value(UploadOutcome::failed("b.pdf", "denied")).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"file": "b.pdf", "status": "failed", "error": "denied"})
        );
    }

    #[test]
    fn metrics_report_keys_follow_k() {
        let metrics = RetrievalMetrics {
            k: 3,
            recall_at_k: 0.5,
            precision_at_k: 0.5,
            mrr: 0.25,
            map: 0.2,
            total_queries: 4,
            failed_queries: 0,
        };
        let keys: Vec<_> = metrics.as_report().keys().cloned().collect();
        assert_eq!(keys, vec!["recall@3", "precision@3", "mrr", "map"]);
    }
}
