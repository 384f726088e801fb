//! Interactive viewer: cluster filter, filename search, 3D plot and a details
//! pane for the clicked point.
//!
//! Routes:
//! * `GET /` the page
//! * `GET /api/figure?clusters=0,-1&search=term` filtered figure JSON plus the
//!   row index of every plotted point, per trace
//! * `GET /api/documents/{index}` details of one row
//! * `GET /api/clusters` labels with row counts

use crate::{RowFilter, ViewerError, cluster_label, figure_for};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use core_types::VisualRow;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

const PAGE: &str = include_str!("page.html");

/// Rows and title shared by every handler; read-only once serving starts.
#[derive(Debug, Clone)]
pub struct ViewerState {
    pub rows: Vec<VisualRow>,
    pub title: String,
}

impl ViewerState {
    pub fn new(rows: Vec<VisualRow>, title: impl Into<String>) -> Self {
        Self {
            rows,
            title: title.into(),
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFailure {
    pub status: String,
    pub code: u16,
    pub message: String,
}

impl ApiFailure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: "bad_request".into(),
            code: 400,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: "not_found".into(),
            code: 404,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: "internal_error".into(),
            code: 500,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiFailure>;

#[derive(Debug, Default, Deserialize)]
pub struct FigureQuery {
    /// Comma separated cluster labels.
    pub clusters: Option<String>,
    pub search: Option<String>,
}

impl FigureQuery {
    fn to_filter(&self) -> Result<RowFilter, ApiFailure> {
        let clusters = match self.clusters.as_deref() {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i32>()
                        .map_err(|_| ApiFailure::bad_request(format!("invalid cluster {s:?}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(RowFilter {
            clusters,
            search: self.search.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FigureResponse {
    pub figure: Value,
    /// `traces[t][p]` is the row index of point `p` in trace `t`.
    pub traces: Vec<Vec<usize>>,
    pub shown: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetails {
    pub index: usize,
    pub id: String,
    pub filename: String,
    pub cluster: i32,
    pub text_preview: String,
    pub metadata: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster: i32,
    pub label: String,
    pub count: usize,
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn page(State(state): State<Arc<ViewerState>>) -> Html<String> {
    Html(PAGE.replace("{{TITLE}}", &escape_html(&state.title)))
}

async fn figure(
    State(state): State<Arc<ViewerState>>,
    Query(query): Query<FigureQuery>,
) -> ApiResult<FigureResponse> {
    let filter = query.to_filter()?;
    let selected = filter.apply(&state.rows);
    let (plot, traces) = figure_for(&state.rows, &selected, None);
    let figure: Value = serde_json::from_str(&plot.to_json())
        .map_err(|e| ApiFailure::internal(format!("figure encoding failed: {e}")))?;
    Ok(Json(FigureResponse {
        figure,
        traces,
        shown: selected.len(),
        total: state.rows.len(),
    }))
}

async fn document(
    State(state): State<Arc<ViewerState>>,
    Path(index): Path<usize>,
) -> ApiResult<DocumentDetails> {
    let row = state
        .rows
        .get(index)
        .ok_or_else(|| ApiFailure::not_found(format!("no document at index {index}")))?;
    Ok(Json(DocumentDetails {
        index,
        id: row.id.clone(),
        filename: row.filename.clone(),
        cluster: row.cluster,
        text_preview: row.text_preview.clone(),
        metadata: row.metadata.clone(),
    }))
}

async fn clusters(State(state): State<Arc<ViewerState>>) -> Json<Vec<ClusterInfo>> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for row in &state.rows {
        *counts.entry(row.cluster).or_insert(0) += 1;
    }
    Json(
        counts
            .into_iter()
            .map(|(cluster, count)| ClusterInfo {
                cluster,
                label: cluster_label(cluster),
                count,
            })
            .collect(),
    )
}

pub fn router(state: Arc<ViewerState>) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/api/figure", get(figure))
        .route("/api/documents/{index}", get(document))
        .route("/api/clusters", get(clusters))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: ViewerState, bind: &str) -> Result<(), ViewerError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ViewerError::Bind {
            addr: bind.to_string(),
            source,
        })?;
    let addr = listener
        .local_addr()
        .map_or_else(|_| bind.to_string(), |a| a.to_string());
    info!(%addr, rows = state.rows.len(), "viewer listening");

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("viewer shutting down");
        })
        .await
        .map_err(ViewerError::Serve)
}

/// Run [`serve`] on a dedicated multi-threaded runtime.
pub fn serve_blocking(state: ViewerState, bind: &str) -> Result<(), ViewerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ViewerError::Runtime)?;
    runtime.block_on(serve(state, bind))
}
