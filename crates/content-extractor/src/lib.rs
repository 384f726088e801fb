//! Content extraction for storelens: PDF discovery and text extraction.
//!
//! Extraction runs behind the [`Extractor`] trait so question generation can
//! be exercised without real PDFs. The [`staging`] module copies or downloads
//! sample PDFs into a working directory.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod staging;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Inputs for one extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub path: &'a Path,
    /// Upper bound on returned characters; `None` keeps everything.
    pub max_chars: Option<usize>,
}

impl<'a> ExtractContext<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self {
            path,
            max_chars: None,
        }
    }

    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub path: PathBuf,
    pub text: String,
    pub truncated: bool,
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, ctx: &ExtractContext<'_>) -> bool;

    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<ExtractedContent, ExtractError>;
}

/// Lowercased extension of the context path.
pub fn resolve_ext(ctx: &ExtractContext<'_>) -> Option<String> {
    ctx.path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Cut `text` to at most `max_chars` characters; returns whether it was cut.
pub fn enforce_limits_str(text: &mut String, max_chars: Option<usize>) -> bool {
    let Some(limit) = max_chars else {
        return false;
    };
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => {
            text.truncate(byte_idx);
            true
        }
        None => false,
    }
}

/// Page text of PDF files via `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn supports(&self, ctx: &ExtractContext<'_>) -> bool {
        resolve_ext(ctx).as_deref() == Some("pdf")
    }

    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<ExtractedContent, ExtractError> {
        if !self.supports(ctx) {
            return Err(ExtractError::Unsupported(ctx.path.display().to_string()));
        }
        let bytes = fs::read(ctx.path)?;
        // pdf-extract panics on some malformed documents.
        let mut text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
            .map_err(|_| ExtractError::Failed(format!("{}: parser panicked", ctx.path.display())))?
            .map_err(|e| ExtractError::Failed(format!("{}: {e}", ctx.path.display())))?;
        let truncated = enforce_limits_str(&mut text, ctx.max_chars);
        if text.trim().is_empty() {
            tracing::warn!(path = %ctx.path.display(), "pdf has no extractable text");
        }
        Ok(ExtractedContent {
            path: ctx.path.to_path_buf(),
            text,
            truncated,
        })
    }
}

/// PDF files directly inside `dir` (extension matched case-insensitively),
/// sorted by path.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// File name component as a `String` (lossy), or the full path when absent.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
