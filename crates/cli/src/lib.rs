//! Output formatting shared by the `storelens` binary.
//!
//! Kept apart from `main.rs` so the report layouts can be unit tested.

use core_types::{RetrievalMetrics, SearchHit, StoreDetails, UploadStats};
use std::collections::BTreeMap;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn metrics_lines(m: &RetrievalMetrics) -> Vec<String> {
    let k = m.k;
    let mut lines = vec![
        format!("Metrics at k={k}:"),
        format!("Recall@{k}: {:.4}", m.recall_at_k),
        format!("Precision@{k}: {:.4}", m.precision_at_k),
        format!("Mean Reciprocal Rank (MRR): {:.4}", m.mrr),
        format!("Mean Average Precision (MAP): {:.4}", m.map),
    ];
    if m.failed_queries > 0 {
        lines.push(format!(
            "Failed queries: {} of {} (scored as misses)",
            m.failed_queries, m.total_queries
        ));
    }
    lines
}

/// Lines for the `n`-th (zero-based) search hit.
pub fn hit_lines(n: usize, hit: &SearchHit) -> Vec<String> {
    vec![
        format!("Result {}:", n + 1),
        format!("Filename: {}", hit.filename),
        format!("Score: {}", hit.score),
        format!("Content length: {}", hit.content_len()),
        "---".to_string(),
    ]
}

pub fn store_lines(details: &StoreDetails) -> Vec<String> {
    vec![
        format!("Vector Store: {} (ID: {})", details.name, details.id),
        format!("Created at: {}", details.created_at),
        format!("File Count: {}", details.file_count),
    ]
}

pub fn upload_summary(stats: &UploadStats) -> String {
    format!(
        "Upload complete: {} successful, {} failed (of {})",
        stats.successful_uploads, stats.failed_uploads, stats.total_files
    )
}

pub fn cluster_summary(counts: &BTreeMap<i32, usize>) -> String {
    let clusters = counts.keys().filter(|c| **c >= 0).count();
    let noise = counts.get(&core_types::NOISE_CLUSTER).copied().unwrap_or(0);
    format!("{clusters} clusters, {noise} noise points")
}

/// Point count, the reduction method used, and the cluster breakdown.
pub fn projection_summary(points: usize, reducer: &str, counts: &BTreeMap<i32, usize>) -> String {
    format!(
        "{points} points projected to 3D with {reducer}: {}",
        cluster_summary(counts)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::UploadOutcome;

    #[test]
    fn metrics_use_four_decimals() {
        let m = RetrievalMetrics {
            k: 5,
            recall_at_k: 0.75,
            precision_at_k: 0.75,
            mrr: 0.5,
            map: 1.0 / 3.0,
            total_queries: 4,
            failed_queries: 0,
        };
        let lines = metrics_lines(&m);
        assert_eq!(lines[1], "Recall@5: 0.7500");
        assert_eq!(lines[4], "Mean Average Precision (MAP): 0.3333");
        assert_eq!(lines.len(), 5);

        let failed = RetrievalMetrics {
            failed_queries: 1,
            ..m
        };
        assert!(metrics_lines(&failed)[5].contains("1 of 4"));
    }

    #[test]
    fn hits_are_numbered_from_one() {
        let hit = SearchHit {
            file_id: "file_1".into(),
            filename: "a.pdf".into(),
            score: 0.5,
            content: vec!["héllo".into()],
        };
        let lines = hit_lines(0, &hit);
        assert_eq!(lines[0], "Result 1:");
        assert_eq!(lines[3], "Content length: 5");
    }

    #[test]
    fn summaries() {
        let mut stats = UploadStats::new(2);
        stats.record(UploadOutcome::success("a.pdf"));
        stats.record(UploadOutcome::failed("b.pdf", "boom"));
        assert_eq!(
            upload_summary(&stats),
            "Upload complete: 1 successful, 1 failed (of 2)"
        );

        let counts = BTreeMap::from([(-1, 3), (0, 4), (1, 2)]);
        assert_eq!(cluster_summary(&counts), "2 clusters, 3 noise points");
        assert_eq!(
            projection_summary(9, "pca", &counts),
            "9 points projected to 3D with pca: 2 clusters, 3 noise points"
        );
    }
}
