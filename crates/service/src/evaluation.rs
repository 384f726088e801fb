//! Retrieval evaluation over a generated question set.
//!
//! Each question is sent to the Responses API with the file_search tool forced
//! on; the cited filenames (top `k`) are compared against the file the
//! question was generated from. Per-query scores:
//!
//! * `correct`: the expected file appears among the top `k` citations;
//! * reciprocal rank: `1 / rank` of its first appearance, else 0;
//! * average precision: mean of `hits_so_far / (i + 1)` over every position
//!   `i` holding the expected file, else 0.
//!
//! Precision@k equals recall@k here since each query has exactly one
//! relevant document.

use core_types::{QueryOutcome, Questions, RetrievalMetrics};
use scheduler::WorkerPool;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vector_api::{ResponseRequest, ToolChoice, VectorStoreApi};

/// Metrics plus every per-query outcome, in question order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: RetrievalMetrics,
    pub outcomes: Vec<QueryOutcome>,
}

/// Filename a question key refers to: every `.pdf` removed, then one appended.
pub fn expected_filename(key: &str) -> String {
    format!("{}.pdf", key.replace(".pdf", ""))
}

/// `(correct, reciprocal_rank, average_precision)` of one ranked list.
pub fn score_retrieved(expected: &str, retrieved: &[String]) -> (bool, f64, f64) {
    let first = retrieved.iter().position(|f| f == expected);
    let rr = first.map_or(0.0, |i| 1.0 / (i as f64 + 1.0));

    let mut hits = 0usize;
    let mut precision_sum = 0.0;
    for (i, name) in retrieved.iter().enumerate() {
        if name == expected {
            hits += 1;
            precision_sum += hits as f64 / (i as f64 + 1.0);
        }
    }
    let ap = if hits == 0 {
        0.0
    } else {
        precision_sum / hits as f64
    };
    (first.is_some(), rr, ap)
}

fn miss(query: &str, expected: String, error: String) -> QueryOutcome {
    QueryOutcome {
        query: query.to_string(),
        expected_filename: expected,
        retrieved: Vec::new(),
        correct: false,
        reciprocal_rank: 0.0,
        average_precision: 0.0,
        error: Some(error),
    }
}

/// File search result cap for `k`, saturating at `u32::MAX`.
fn max_num_results(k: usize) -> u32 {
    u32::try_from(k).unwrap_or(u32::MAX)
}

/// Run one query against the store and score its citations.
pub fn score_query(
    api: &dyn VectorStoreApi,
    store_id: &str,
    query: &str,
    expected: String,
    k: usize,
    model: &str,
) -> QueryOutcome {
    let req = ResponseRequest::file_search(model, query, store_id, Some(max_num_results(k)))
        .with_tool_choice(ToolChoice::Required);
    let resp = match api.create_response(&req) {
        Ok(resp) => resp,
        Err(err) => {
            warn!(%query, error = %err, "query failed");
            return miss(query, expected, err.to_string());
        }
    };
    let Some(mut retrieved) = resp.cited_filenames() else {
        warn!(%query, "no annotations for query");
        return miss(query, expected, "no annotations in response".to_string());
    };
    retrieved.truncate(k);

    let (correct, reciprocal_rank, average_precision) = score_retrieved(&expected, &retrieved);
    if !correct {
        info!(%query, expected = %expected, "expected file not found in the retrieved files");
    }
    if let Some(first) = retrieved.first().filter(|f| **f != expected) {
        info!(
            %query,
            expected = %expected,
            first = %first,
            retrieved = ?retrieved,
            "expected file not ranked first"
        );
    }
    QueryOutcome {
        query: query.to_string(),
        expected_filename: expected,
        retrieved,
        correct,
        reciprocal_rank,
        average_precision,
        error: None,
    }
}

/// Fold per-query outcomes into metrics; an empty set yields all zeros.
pub fn aggregate(k: usize, outcomes: &[QueryOutcome]) -> RetrievalMetrics {
    let total = outcomes.len();
    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    if total == 0 {
        return RetrievalMetrics {
            k,
            recall_at_k: 0.0,
            precision_at_k: 0.0,
            mrr: 0.0,
            map: 0.0,
            total_queries: 0,
            failed_queries: 0,
        };
    }
    let n = total as f64;
    let correct = outcomes.iter().filter(|o| o.correct).count() as f64;
    let recall = correct / n;
    RetrievalMetrics {
        k,
        recall_at_k: recall,
        precision_at_k: recall,
        mrr: outcomes.iter().map(|o| o.reciprocal_rank).sum::<f64>() / n,
        map: outcomes.iter().map(|o| o.average_precision).sum::<f64>() / n,
        total_queries: total,
        failed_queries: failed,
    }
}

/// Evaluate every question concurrently through `pool`.
pub fn evaluate_retrieval(
    api: &dyn VectorStoreApi,
    pool: &WorkerPool,
    store_id: &str,
    questions: &Questions,
    k: usize,
    model: &str,
) -> EvaluationReport {
    let rows: Vec<(String, &str)> = questions
        .iter()
        .map(|(key, query)| (expected_filename(key), query.as_str()))
        .collect();
    info!(queries = rows.len(), k, "evaluating retrieval");

    let outcomes = pool.run("evaluating", rows, |(expected, query)| {
        score_query(api, store_id, query, expected, k, model)
    });
    let metrics = aggregate(k, &outcomes);
    if metrics.failed_queries > 0 {
        warn!(
            failed = metrics.failed_queries,
            total = metrics.total_queries,
            "some queries failed and were scored as misses"
        );
    }
    EvaluationReport { metrics, outcomes }
}
