//! Visualization output for projections: a static plotly HTML file and an
//! interactive viewer served over HTTP.

mod figure;
pub mod server;

pub use figure::{
    DEFAULT_TITLE, RowFilter, cluster_label, figure_for, render_figure, write_html,
};
pub use server::{ViewerState, router, serve, serve_blocking};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("viewer server failed: {0}")]
    Serve(std::io::Error),
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}
