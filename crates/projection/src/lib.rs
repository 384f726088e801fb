//! Turns the contents of a vector store into a 3D, clustered table of points.
//!
//! Steps, each swappable in tests:
//! fetch ([`fetch_embeddings`]) -> standardize ([`standardize`]) ->
//! reduce ([`Reducer`]) -> cluster ([`Clusterer`]) -> rows ([`build_rows`]).

mod cluster;
mod fetch;
mod reduce;
mod rows;

pub use cluster::{Clusterer, HdbscanClusterer};
pub use fetch::{FetchOptions, chunk_text, fetch_embeddings};
pub use reduce::{PcaReducer, Reducer, standardize, to_matrix};
pub use rows::{build_rows, cluster_counts, preview};

use core_types::config::VisualizationSettings;
use core_types::{StoreDetails, VisualRow};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use vector_api::{ApiError, VectorStoreApi};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("vector store api error: {0}")]
    Api(#[from] ApiError),
    #[error("no embeddings found in store {0}")]
    Empty(String),
    #[error("embedding {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("embedding service returned {found} vectors for {expected} inputs")]
    BatchMismatch { expected: usize, found: usize },
    #[error("dimensionality reduction failed: {0}")]
    Reduce(String),
    #[error("clustering failed: {0}")]
    Cluster(String),
    #[error("{points} points but {labels} cluster labels")]
    LabelMismatch { points: usize, labels: usize },
}

/// Store summary plus one row per fetched embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub store: StoreDetails,
    /// Name of the reducer that produced the coordinates.
    pub reducer: String,
    pub rows: Vec<VisualRow>,
}

pub struct Pipeline {
    fetch: FetchOptions,
    preview_chars: usize,
    reducer: Box<dyn Reducer>,
    clusterer: Box<dyn Clusterer>,
}

impl Pipeline {
    pub fn from_settings(settings: &VisualizationSettings, embedding_model: &str) -> Self {
        Self {
            fetch: FetchOptions {
                max_results: settings.max_results,
                chunk_chars: settings.chunk_chars,
                batch_size: settings.embedding_batch_size,
                model: embedding_model.to_string(),
            },
            preview_chars: settings.preview_chars,
            reducer: Box::new(PcaReducer::new(settings.n_components)),
            clusterer: Box::new(HdbscanClusterer {
                min_cluster_size: settings.min_cluster_size,
                min_samples: settings.min_samples,
                cluster_selection_epsilon: settings.cluster_selection_epsilon,
            }),
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.fetch.max_results = max_results;
        self
    }

    pub fn with_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn with_clusterer(mut self, clusterer: Box<dyn Clusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    pub fn run(
        &self,
        api: &dyn VectorStoreApi,
        store_id: &str,
    ) -> Result<Projection, ProjectionError> {
        let store = api.retrieve_vector_store(store_id)?.details();
        info!(id = %store.id, name = %store.name, files = store.file_count, "vector store");

        info!(max_results = self.fetch.max_results, "fetching embeddings");
        let points = fetch_embeddings(api, store_id, &self.fetch)?;
        if points.is_empty() {
            return Err(ProjectionError::Empty(store_id.to_string()));
        }
        info!(count = points.len(), "retrieved embeddings");

        let scaled = standardize(&to_matrix(&points)?);
        info!(reducer = self.reducer.name(), "reducing dimensions");
        let coords = self.reducer.reduce(&scaled)?;
        info!(clusterer = self.clusterer.name(), "clustering");
        let labels = self.clusterer.cluster(&coords)?;

        let rows = build_rows(&points, &coords, &labels, self.preview_chars)?;
        let counts = cluster_counts(&rows);
        info!(
            clusters = counts.keys().filter(|c| **c >= 0).count(),
            noise = counts.get(&core_types::NOISE_CLUSTER).copied().unwrap_or(0),
            "projection ready"
        );
        Ok(Projection {
            store,
            reducer: self.reducer.name().to_string(),
            rows,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetch", &self.fetch)
            .field("preview_chars", &self.preview_chars)
            .field("reducer", &self.reducer.name())
            .field("clusterer", &self.clusterer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::NOISE_CLUSTER;
    use vector_api::StubApi;

    fn topic(word: &str, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("{word} {word} {word} note {i}"))
            .collect()
    }

    fn seeded() -> (StubApi, String) {
        let api = StubApi::new();
        let store = api.seed_store(
            "topics",
            &[
                ("rust.pdf", topic("ownership borrowing lifetimes", 8)),
                ("cooking.pdf", topic("flour butter oven", 8)),
                ("astro.pdf", topic("galaxy nebula telescope", 8)),
            ],
        );
        (api, store)
    }

    fn settings() -> VisualizationSettings {
        VisualizationSettings {
            chunk_chars: 10_000,
            embedding_batch_size: 5,
            ..VisualizationSettings::default()
        }
    }

    #[test]
    fn pipeline_produces_one_row_per_chunk() {
        let (api, store) = seeded();
        let projection = Pipeline::from_settings(&settings(), "text-embedding-3-small")
            .run(&api, &store)
            .unwrap();

        assert_eq!(projection.store.name, "topics");
        assert_eq!(projection.store.file_count, 3);
        // Stub file content is one part per chunk, joined before re-chunking.
        assert_eq!(projection.rows.len(), 3);
        for row in &projection.rows {
            assert!(row.x.is_finite() && row.y.is_finite() && row.z.is_finite());
            // Three points are fewer than min_cluster_size.
            assert_eq!(row.cluster, NOISE_CLUSTER);
            assert!(row.text_preview.ends_with("..."));
        }
    }

    #[test]
    fn max_results_caps_points() {
        let (api, store) = seeded();
        let mut small = settings();
        small.chunk_chars = 20;
        let projection = Pipeline::from_settings(&small, "m")
            .with_max_results(7)
            .with_clusterer(Box::new(OneClusterPerPoint))
            .run(&api, &store)
            .unwrap();
        assert_eq!(projection.rows.len(), 7);
        assert!(projection.rows.iter().all(|r| r.filename == "rust.pdf"));
    }

    #[test]
    fn empty_store_is_an_error() {
        let api = StubApi::new();
        let store = api.seed_store("empty", &[]);
        let err = Pipeline::from_settings(&settings(), "m")
            .run(&api, &store)
            .unwrap_err();
        assert!(matches!(err, ProjectionError::Empty(_)));
    }

    #[test]
    fn repeated_content_projects_without_error() {
        let api = StubApi::new();
        let files: Vec<(String, Vec<String>)> = (0..6)
            .map(|i| {
                let text = if i % 2 == 0 { "alpha beta" } else { "gamma delta" };
                (format!("doc{i}.pdf"), vec![text.to_string()])
            })
            .collect();
        let seeded: Vec<(&str, Vec<String>)> = files
            .iter()
            .map(|(name, parts)| (name.as_str(), parts.clone()))
            .collect();
        let store = api.seed_store("repeats", &seeded);

        let projection = Pipeline::from_settings(&settings(), "m")
            .with_clusterer(Box::new(OneClusterPerPoint))
            .run(&api, &store)
            .unwrap();
        assert_eq!(projection.rows.len(), 6);
        assert!(
            projection
                .rows
                .iter()
                .all(|r| r.x.is_finite() && r.y.is_finite() && r.z.is_finite())
        );
        assert_eq!(projection.rows[0].x, projection.rows[2].x);
        assert_eq!(projection.reducer, "pca");
    }

    struct FirstColumns;

    impl Reducer for FirstColumns {
        fn name(&self) -> &'static str {
            "first-columns"
        }

        fn reduce(
            &self,
            data: &ndarray::Array2<f64>,
        ) -> Result<ndarray::Array2<f64>, ProjectionError> {
            Ok(data.slice(ndarray::s![.., ..3]).to_owned())
        }
    }

    struct OneClusterPerPoint;

    impl Clusterer for OneClusterPerPoint {
        fn name(&self) -> &'static str {
            "per-point"
        }

        fn cluster(&self, coords: &ndarray::Array2<f64>) -> Result<Vec<i32>, ProjectionError> {
            Ok((0..coords.nrows() as i32).collect())
        }
    }

    #[test]
    fn stages_are_swappable() {
        let (api, store) = seeded();
        let projection = Pipeline::from_settings(&settings(), "m")
            .with_reducer(Box::new(FirstColumns))
            .with_clusterer(Box::new(OneClusterPerPoint))
            .run(&api, &store)
            .unwrap();
        let clusters: Vec<i32> = projection.rows.iter().map(|r| r.cluster).collect();
        assert_eq!(clusters, vec![0, 1, 2]);
        assert_eq!(projection.reducer, "first-columns");
        assert_eq!(cluster_counts(&projection.rows).len(), 3);
    }
}
