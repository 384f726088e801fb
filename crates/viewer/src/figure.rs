use crate::ViewerError;
use core_types::{NOISE_CLUSTER, VisualRow};
use plotly::common::{HoverInfo, Marker, Mode, Title};
use plotly::layout::{Axis, LayoutScene, Margin};
use plotly::{Layout, Plot, Scatter3D};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_TITLE: &str = "Vector Store Embeddings Visualization";

/// Which rows to show: cluster membership (empty = all) and a
/// case-insensitive filename substring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    #[serde(default)]
    pub clusters: Vec<i32>,
    #[serde(default)]
    pub search: Option<String>,
}

impl RowFilter {
    pub fn matches(&self, row: &VisualRow) -> bool {
        if !self.clusters.is_empty() && !self.clusters.contains(&row.cluster) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => row
                .filename
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        }
    }

    /// Indices of matching rows, in row order.
    pub fn apply(&self, rows: &[VisualRow]) -> Vec<usize> {
        rows.iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row))
            .map(|(i, _)| i)
            .collect()
    }
}

pub fn cluster_label(cluster: i32) -> String {
    if cluster == NOISE_CLUSTER {
        "Noise".to_string()
    } else {
        format!("Cluster {cluster}")
    }
}

fn hover_text(row: &VisualRow) -> String {
    if row.text_preview.is_empty() {
        row.filename.clone()
    } else {
        format!("<b>{}</b><br>{}", row.filename, row.text_preview)
    }
}

fn layout(title: Option<&str>) -> Layout {
    let hidden = || Axis::new().show_tick_labels(false);
    let mut layout = Layout::new()
        .scene(
            LayoutScene::new()
                .x_axis(hidden())
                .y_axis(hidden())
                .z_axis(hidden()),
        )
        .margin(Margin::new().left(0).right(0).bottom(0).top(30));
    if let Some(title) = title {
        layout = layout.title(Title::with_text(title));
    }
    layout
}

/// Scatter of the selected rows, one trace per cluster in label order.
///
/// The second value maps each trace's point positions back to row indices.
pub fn figure_for(
    rows: &[VisualRow],
    selected: &[usize],
    title: Option<&str>,
) -> (Plot, Vec<Vec<usize>>) {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for &i in selected {
        if let Some(row) = rows.get(i) {
            groups.entry(row.cluster).or_default().push(i);
        }
    }

    let mut plot = Plot::new();
    let mut traces = Vec::with_capacity(groups.len());
    for (cluster, indices) in groups {
        let pick = |f: fn(&VisualRow) -> f64| -> Vec<f64> {
            indices.iter().map(|&i| f(&rows[i])).collect()
        };
        let trace = Scatter3D::new(pick(|r| r.x), pick(|r| r.y), pick(|r| r.z))
            .name(cluster_label(cluster).as_str())
            .mode(Mode::Markers)
            .marker(Marker::new().size(4).opacity(0.7))
            .text_array(indices.iter().map(|&i| hover_text(&rows[i])).collect())
            .hover_info(HoverInfo::Text);
        plot.add_trace(trace);
        traces.push(indices);
    }
    plot.set_layout(layout(title));
    (plot, traces)
}

pub fn render_figure(rows: &[VisualRow], title: &str) -> Plot {
    let all: Vec<usize> = (0..rows.len()).collect();
    figure_for(rows, &all, Some(title)).0
}

/// Standalone HTML page (plotly.js from CDN) for every row.
pub fn write_html(rows: &[VisualRow], path: &Path, title: &str) -> Result<(), ViewerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ViewerError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let html = render_figure(rows, title).to_html();
    fs::write(path, html).map_err(|source| ViewerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "visualization saved");
    Ok(())
}
