use crate::ProjectionError;
use core_types::EmbeddingPoint;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};
use vector_api::{EmbeddingRequest, VectorStoreApi, VectorStoreFile};

const LIST_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Stop once this many points are collected.
    pub max_results: usize,
    /// Characters per embedded chunk.
    pub chunk_chars: usize,
    /// Inputs per embeddings request.
    pub batch_size: usize,
    pub model: String,
}

/// Split `text` into pieces of at most `chunk_chars` characters, dropping
/// pieces that are only whitespace.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let size = chunk_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|c| c.iter().collect::<String>())
        .filter(|c| !c.trim().is_empty())
        .collect()
}

struct Pending {
    id: String,
    filename: String,
    metadata: IndexMap<String, Value>,
    text: String,
}

fn resolve_filename(api: &dyn VectorStoreApi, file: &VectorStoreFile) -> String {
    match api.retrieve_file(&file.id) {
        Ok(obj) => obj.filename,
        Err(err) => {
            warn!(file_id = %file.id, error = %err, "could not resolve filename");
            "Unknown".to_string()
        }
    }
}

/// Collect up to `opts.max_results` text chunks from the store and embed them.
///
/// The hosted API does not return stored vectors, so each file's parsed
/// content is re-embedded with `opts.model`. Files whose content cannot be
/// read are skipped with a warning; embedding failures abort.
pub fn fetch_embeddings(
    api: &dyn VectorStoreApi,
    store_id: &str,
    opts: &FetchOptions,
) -> Result<Vec<EmbeddingPoint>, ProjectionError> {
    let mut pending: Vec<Pending> = Vec::new();
    let mut cursor: Option<String> = None;

    'pages: loop {
        let page = api.list_store_files(store_id, cursor.as_deref(), LIST_PAGE_SIZE)?;
        for file in &page.data {
            if pending.len() >= opts.max_results {
                break 'pages;
            }
            let content = match api.file_content(store_id, &file.id) {
                Ok(content) => content,
                Err(err) => {
                    warn!(file_id = %file.id, error = %err, "skipping file without content");
                    continue;
                }
            };
            let filename = resolve_filename(api, file);
            let attributes = file.attributes.clone().unwrap_or_default();
            let chunks = chunk_text(&content.joined_text(), opts.chunk_chars);
            debug!(file = %filename, chunks = chunks.len(), "chunked file");

            for (i, text) in chunks.into_iter().enumerate() {
                if pending.len() >= opts.max_results {
                    break 'pages;
                }
                let mut metadata = attributes.clone();
                metadata.insert("chunk".to_string(), Value::from(i));
                pending.push(Pending {
                    id: format!("{}#{i}", file.id),
                    filename: filename.clone(),
                    metadata,
                    text,
                });
            }
        }
        match (page.has_more, page.last_id) {
            (true, Some(last)) => cursor = Some(last),
            _ => break,
        }
    }

    let mut points = Vec::with_capacity(pending.len());
    let mut rest = pending.into_iter().peekable();
    while rest.peek().is_some() {
        let batch: Vec<Pending> = rest.by_ref().take(opts.batch_size.max(1)).collect();
        let req = EmbeddingRequest {
            model: opts.model.clone(),
            input: batch.iter().map(|p| p.text.clone()).collect(),
        };
        let vectors = api.create_embeddings(&req)?.into_vectors();
        if vectors.len() != batch.len() {
            return Err(ProjectionError::BatchMismatch {
                expected: batch.len(),
                found: vectors.len(),
            });
        }
        for (p, embedding) in batch.into_iter().zip(vectors) {
            points.push(EmbeddingPoint {
                id: p.id,
                filename: p.filename,
                embedding,
                metadata: p.metadata,
                text: p.text,
            });
        }
    }
    Ok(points)
}
