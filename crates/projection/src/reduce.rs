use crate::ProjectionError;
use core_types::EmbeddingPoint;
use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_reduction::Pca;
use ndarray::{Array2, Axis, s};

/// Stack embeddings into an `(n_points, dim)` matrix.
pub fn to_matrix(points: &[EmbeddingPoint]) -> Result<Array2<f64>, ProjectionError> {
    let dim = points.first().map_or(0, |p| p.embedding.len());
    let mut out = Array2::<f64>::zeros((points.len(), dim));
    for (i, point) in points.iter().enumerate() {
        if point.embedding.len() != dim {
            return Err(ProjectionError::DimensionMismatch {
                index: i,
                expected: dim,
                found: point.embedding.len(),
            });
        }
        for (j, v) in point.embedding.iter().enumerate() {
            out[[i, j]] = f64::from(*v);
        }
    }
    Ok(out)
}

/// Per-column z-score (population standard deviation). Columns with zero
/// variance become all zeros.
pub fn standardize(data: &Array2<f64>) -> Array2<f64> {
    let mut out = data.clone();
    if data.nrows() == 0 {
        return out;
    }
    for mut col in out.axis_iter_mut(Axis(1)) {
        let mean = col.mean().unwrap_or(0.0);
        let std = col.std(0.0);
        if std > f64::EPSILON {
            col.mapv_inplace(|v| (v - mean) / std);
        } else {
            col.fill(0.0);
        }
    }
    out
}

/// Maps a standardized matrix to low-dimensional coordinates.
pub trait Reducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns one row per input row.
    fn reduce(&self, data: &Array2<f64>) -> Result<Array2<f64>, ProjectionError>;
}

/// Principal component projection through `linfa-reduction`.
///
/// Output always has `n_components` columns; when the input has too few rows
/// or columns to support that many components the missing ones are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcaReducer {
    pub n_components: usize,
}

impl PcaReducer {
    pub fn new(n_components: usize) -> Self {
        Self { n_components }
    }
}

impl Default for PcaReducer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Reducer for PcaReducer {
    fn name(&self) -> &'static str {
        "pca"
    }

    fn reduce(&self, data: &Array2<f64>) -> Result<Array2<f64>, ProjectionError> {
        let (rows, cols) = data.dim();
        let mut out = Array2::<f64>::zeros((rows, self.n_components));
        if rows < 2 {
            return Ok(out);
        }
        let k = self.n_components.min(cols).min(rows - 1);
        if k == 0 || data.iter().all(|v| *v == 0.0) {
            return Ok(out);
        }

        let dataset = DatasetBase::from(data.clone());
        let pca = Pca::params(k)
            .fit(&dataset)
            .map_err(|e| ProjectionError::Reduce(e.to_string()))?;
        let projected: Array2<f64> = pca.predict(data);
        // Rank-deficient input yields fewer than `k` components.
        let got = projected.ncols().min(k);
        out.slice_mut(s![.., ..got]).assign(&projected.slice(s![.., ..got]));
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ProjectionError::Reduce(
                "projection produced non-finite coordinates".into(),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use ndarray::array;

    fn point(embedding: Vec<f32>) -> EmbeddingPoint {
        EmbeddingPoint {
            id: "f#0".into(),
            filename: "f.pdf".into(),
            embedding,
            metadata: IndexMap::new(),
            text: String::new(),
        }
    }

    #[test]
    fn matrix_rejects_ragged_embeddings() {
        let err = to_matrix(&[point(vec![1.0, 2.0]), point(vec![1.0])]).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::DimensionMismatch {
                index: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn standardize_centers_and_scales() {
        let data = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let scaled = standardize(&data);
        let col0 = scaled.column(0);
        assert!(col0.mean().unwrap().abs() < 1e-12);
        assert!((col0.std(0.0) - 1.0).abs() < 1e-12);
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn pca_keeps_the_dominant_direction() {
        // Points along one direction in 5D with a little noise on one axis.
        let n = 12;
        let mut data = Array2::<f64>::zeros((n, 5));
        for i in 0..n {
            let t = i as f64;
            for j in 0..5 {
                data[[i, j]] = t;
            }
            data[[i, 0]] += if i % 2 == 0 { 0.01 } else { -0.01 };
        }
        let out = PcaReducer::new(3).reduce(&standardize(&data)).unwrap();
        assert_eq!(out.dim(), (n, 3));

        let first: Vec<f64> = out.column(0).to_vec();
        let increasing = first.windows(2).all(|w| w[1] > w[0]);
        let decreasing = first.windows(2).all(|w| w[1] < w[0]);
        assert!(increasing || decreasing);
    }

    #[test]
    fn tiny_inputs_are_zero_padded() {
        let one = PcaReducer::new(3).reduce(&array![[1.0, 2.0]]).unwrap();
        assert_eq!(one, Array2::<f64>::zeros((1, 3)));

        let two = PcaReducer::new(3)
            .reduce(&array![[0.0, 1.0, 2.0], [2.0, 1.0, 0.0]])
            .unwrap();
        assert_eq!(two.dim(), (2, 3));
        assert!(two.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn identical_rows_project_to_zeros() {
        let data = standardize(&Array2::from_elem((8, 32), 1.0));
        let out = PcaReducer::new(3).reduce(&data).unwrap();
        assert_eq!(out, Array2::<f64>::zeros((8, 3)));
    }

    #[test]
    fn two_distinct_rows_fill_one_component() {
        let mut data = Array2::<f64>::zeros((6, 16));
        for i in 0..6 {
            for j in 0..16 {
                data[[i, j]] = if i % 2 == 0 { j as f64 } else { -(j as f64) };
            }
        }
        let out = PcaReducer::new(3).reduce(&standardize(&data)).unwrap();
        assert_eq!(out.dim(), (6, 3));
        assert!(out.iter().all(|v| v.is_finite()));
        // Both groups collapse to one point each.
        assert!((out[[0, 0]] - out[[2, 0]]).abs() < 1e-9);
        assert!((out[[0, 0]] - out[[1, 0]]).abs() > 1e-6);
    }
}
