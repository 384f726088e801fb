use crate::ProjectionError;
use core_types::NOISE_CLUSTER;
use hdbscan::{DistanceMetric, Hdbscan, HdbscanHyperParams};
use ndarray::Array2;

/// Assigns a cluster label to every row; [`NOISE_CLUSTER`] marks outliers.
pub trait Clusterer: Send + Sync {
    fn name(&self) -> &'static str;

    fn cluster(&self, coords: &Array2<f64>) -> Result<Vec<i32>, ProjectionError>;
}

/// Density clustering through the `hdbscan` crate, euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdbscanClusterer {
    pub min_cluster_size: usize,
    /// Defaults to `min_cluster_size` when unset.
    pub min_samples: Option<usize>,
    pub cluster_selection_epsilon: f64,
}

impl Default for HdbscanClusterer {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: None,
            cluster_selection_epsilon: 0.5,
        }
    }
}

impl Clusterer for HdbscanClusterer {
    fn name(&self) -> &'static str {
        "hdbscan"
    }

    fn cluster(&self, coords: &Array2<f64>) -> Result<Vec<i32>, ProjectionError> {
        let n = coords.nrows();
        let min_cluster_size = self.min_cluster_size.max(2);
        if n < min_cluster_size {
            tracing::debug!(points = n, min_cluster_size, "too few points, all noise");
            return Ok(vec![NOISE_CLUSTER; n]);
        }
        let data: Vec<Vec<f64>> = coords.outer_iter().map(|row| row.to_vec()).collect();
        let min_samples = self.min_samples.unwrap_or(min_cluster_size).clamp(1, n);
        let params = HdbscanHyperParams::builder()
            .min_cluster_size(min_cluster_size)
            .min_samples(min_samples)
            .epsilon(self.cluster_selection_epsilon)
            .dist_metric(DistanceMetric::Euclidean)
            .build();
        let labels = Hdbscan::new(&data, params)
            .cluster()
            .map_err(|e| ProjectionError::Cluster(format!("{e:?}")))?;
        if labels.len() != n {
            return Err(ProjectionError::LabelMismatch {
                points: n,
                labels: labels.len(),
            });
        }
        Ok(labels)
    }
}
