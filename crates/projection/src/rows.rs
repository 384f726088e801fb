use crate::ProjectionError;
use core_types::{EmbeddingPoint, VisualRow};
use ndarray::Array2;
use std::collections::BTreeMap;

/// First `chars` characters followed by `...`; empty text stays empty.
pub fn preview(text: &str, chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out: String = text.chars().take(chars).collect();
    out.push_str("...");
    out
}

/// Join points with their coordinates and labels, one row each.
///
/// Coordinates beyond the third column are ignored and missing ones are 0.
pub fn build_rows(
    points: &[EmbeddingPoint],
    coords: &Array2<f64>,
    labels: &[i32],
    preview_chars: usize,
) -> Result<Vec<VisualRow>, ProjectionError> {
    if coords.nrows() != points.len() || labels.len() != points.len() {
        return Err(ProjectionError::LabelMismatch {
            points: points.len(),
            labels: labels.len().min(coords.nrows()),
        });
    }
    let axis = |i: usize, j: usize| coords.get([i, j]).copied().unwrap_or(0.0);
    Ok(points
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (point, label))| VisualRow {
            x: axis(i, 0),
            y: axis(i, 1),
            z: axis(i, 2),
            id: point.id.clone(),
            filename: point.filename.clone(),
            cluster: *label,
            text_preview: preview(&point.text, preview_chars),
            metadata: point.metadata.clone(),
        })
        .collect())
}

/// Number of rows per cluster label, noise included, ordered by label.
pub fn cluster_counts(rows: &[VisualRow]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.cluster).or_insert(0) += 1;
    }
    counts
}
