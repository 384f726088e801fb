//! In-memory stand-in for the hosted API.
//!
//! Behaves like a tiny vector store: uploads are kept in memory, searches
//! return chunks containing the query terms, responses cite whatever was
//! scripted for the input, and embeddings are hashed bag-of-words vectors.

use crate::{
    Annotation, ApiError, ApiResult, ContentPart, EmbeddingData, EmbeddingRequest,
    EmbeddingResponse, FileContent, FileCounts, FileObject, FilePurpose, ListPage, OutputContent,
    OutputItem, ResponseObject, ResponseRequest, SearchRequest, SearchResult, SearchResultsPage,
    VectorStore, VectorStoreApi, VectorStoreFile,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Dimension of the stub's hashed embeddings.
pub const STUB_EMBEDDING_DIM: usize = 32;

#[derive(Debug, Default)]
struct StubState {
    next_id: u64,
    stores: IndexMap<String, VectorStore>,
    files: IndexMap<String, StubFile>,
    attachments: HashMap<String, Vec<String>>,
    failing_uploads: HashSet<String>,
    failing_inputs: HashSet<String>,
    citations: HashMap<String, Vec<String>>,
    answer: String,
    calls: Vec<String>,
}

#[derive(Debug, Clone)]
struct StubFile {
    filename: String,
    chunks: Vec<String>,
}

#[derive(Debug)]
pub struct StubApi {
    state: Mutex<StubState>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self::new()
    }
}

impl StubApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState {
                answer: "stub answer".to_string(),
                ..StubState::default()
            }),
        }
    }

    /// Uploads of a file with this name fail with a 500.
    pub fn with_failing_upload(self, filename: &str) -> Self {
        self.state.lock().failing_uploads.insert(filename.to_string());
        self
    }

    /// Responses for this exact input fail with a 500.
    pub fn with_failing_input(self, input: &str) -> Self {
        self.state.lock().failing_inputs.insert(input.to_string());
        self
    }

    /// File citations returned for a response whose input equals `input`.
    pub fn with_citations(self, input: &str, filenames: &[&str]) -> Self {
        self.state.lock().citations.insert(
            input.to_string(),
            filenames.iter().map(|f| (*f).to_string()).collect(),
        );
        self
    }

    pub fn with_answer(self, answer: &str) -> Self {
        self.state.lock().answer = answer.to_string();
        self
    }

    /// Create a store holding one file per `(filename, chunks)` entry.
    /// Returns the store id.
    pub fn seed_store(&self, name: &str, files: &[(&str, Vec<String>)]) -> String {
        let mut state = self.state.lock();
        let store_id = state.new_id("vs");
        let mut attached = Vec::with_capacity(files.len());
        for (filename, chunks) in files {
            let file_id = state.new_id("file");
            state.files.insert(
                file_id.clone(),
                StubFile {
                    filename: (*filename).to_string(),
                    chunks: chunks.clone(),
                },
            );
            attached.push(file_id);
        }
        let store = VectorStore {
            id: store_id.clone(),
            name: Some(name.to_string()),
            created_at: 1_700_000_000,
            file_counts: FileCounts {
                completed: attached.len() as u64,
                total: attached.len() as u64,
                ..FileCounts::default()
            },
            status: Some("completed".to_string()),
        };
        state.stores.insert(store_id.clone(), store);
        state.attachments.insert(store_id.clone(), attached);
        store_id
    }

    /// Filenames attached to a store, in attach order.
    pub fn attached_filenames(&self, store_id: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .attachments
            .get(store_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.files.get(id).map(|f| f.filename.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of the trait methods called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == method).count()
    }
}

impl StubState {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{:06}", self.next_id)
    }

    fn store(&self, store_id: &str) -> ApiResult<&VectorStore> {
        self.stores
            .get(store_id)
            .ok_or_else(|| ApiError::NotFound(format!("vector store {store_id}")))
    }
}

fn server_error(message: impl Into<String>) -> ApiError {
    ApiError::Status {
        status: 500,
        message: message.into(),
    }
}

/// Hashed bag-of-words embedding (FNV-1a per lowercase token).
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut out = vec![0.0f32; STUB_EMBEDDING_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in token.to_lowercase().bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        out[(hash % STUB_EMBEDDING_DIM as u64) as usize] += 1.0;
    }
    out
}

impl VectorStoreApi for StubApi {
    fn create_vector_store(&self, name: &str) -> ApiResult<VectorStore> {
        let mut state = self.state.lock();
        state.calls.push("create_vector_store".into());
        let id = state.new_id("vs");
        let store = VectorStore {
            id: id.clone(),
            name: Some(name.to_string()),
            created_at: 1_700_000_000,
            file_counts: FileCounts::default(),
            status: Some("completed".to_string()),
        };
        state.stores.insert(id.clone(), store.clone());
        state.attachments.insert(id, Vec::new());
        Ok(store)
    }

    fn retrieve_vector_store(&self, store_id: &str) -> ApiResult<VectorStore> {
        let mut state = self.state.lock();
        state.calls.push("retrieve_vector_store".into());
        state.store(store_id).cloned()
    }

    fn upload_file(&self, path: &Path, _purpose: FilePurpose) -> ApiResult<FileObject> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = std::fs::read(path)?;

        let mut state = self.state.lock();
        state.calls.push("upload_file".into());
        if state.failing_uploads.contains(&filename) {
            return Err(server_error(format!("upload rejected for {filename}")));
        }
        let id = state.new_id("file");
        let text = String::from_utf8_lossy(&bytes).to_string();
        state.files.insert(
            id.clone(),
            StubFile {
                filename: filename.clone(),
                chunks: vec![text],
            },
        );
        Ok(FileObject {
            id,
            filename,
            bytes: bytes.len() as u64,
            created_at: 1_700_000_000,
        })
    }

    fn retrieve_file(&self, file_id: &str) -> ApiResult<FileObject> {
        let mut state = self.state.lock();
        state.calls.push("retrieve_file".into());
        let file = state
            .files
            .get(file_id)
            .ok_or_else(|| ApiError::NotFound(format!("file {file_id}")))?;
        Ok(FileObject {
            id: file_id.to_string(),
            filename: file.filename.clone(),
            bytes: file.chunks.iter().map(|c| c.len() as u64).sum(),
            created_at: 1_700_000_000,
        })
    }

    fn attach_file(&self, store_id: &str, file_id: &str) -> ApiResult<VectorStoreFile> {
        let mut state = self.state.lock();
        state.calls.push("attach_file".into());
        state.store(store_id)?;
        if !state.files.contains_key(file_id) {
            return Err(ApiError::NotFound(format!("file {file_id}")));
        }
        state
            .attachments
            .entry(store_id.to_string())
            .or_default()
            .push(file_id.to_string());
        if let Some(store) = state.stores.get_mut(store_id) {
            store.file_counts.completed += 1;
            store.file_counts.total += 1;
        }
        Ok(VectorStoreFile {
            id: file_id.to_string(),
            vector_store_id: store_id.to_string(),
            status: Some("completed".to_string()),
            attributes: None,
        })
    }

    fn list_store_files(
        &self,
        store_id: &str,
        after: Option<&str>,
        limit: u32,
    ) -> ApiResult<ListPage<VectorStoreFile>> {
        let mut state = self.state.lock();
        state.calls.push("list_store_files".into());
        state.store(store_id)?;
        let ids = state.attachments.get(store_id).cloned().unwrap_or_default();
        let start = after
            .and_then(|cursor| ids.iter().position(|id| id == cursor))
            .map_or(0, |pos| pos + 1);
        let end = (start + limit.max(1) as usize).min(ids.len());
        let data: Vec<VectorStoreFile> = ids[start..end]
            .iter()
            .map(|id| {
                let mut attributes = IndexMap::new();
                if let Some(file) = state.files.get(id) {
                    attributes.insert(
                        "source".to_string(),
                        serde_json::Value::String(file.filename.clone()),
                    );
                }
                VectorStoreFile {
                    id: id.clone(),
                    vector_store_id: store_id.to_string(),
                    status: Some("completed".to_string()),
                    attributes: Some(attributes),
                }
            })
            .collect();
        Ok(ListPage {
            last_id: data.last().map(|f| f.id.clone()),
            has_more: end < ids.len(),
            data,
        })
    }

    fn file_content(&self, store_id: &str, file_id: &str) -> ApiResult<FileContent> {
        let mut state = self.state.lock();
        state.calls.push("file_content".into());
        state.store(store_id)?;
        let file = state
            .files
            .get(file_id)
            .ok_or_else(|| ApiError::NotFound(format!("file {file_id}")))?;
        Ok(FileContent {
            data: file
                .chunks
                .iter()
                .map(|text| ContentPart {
                    kind: "text".to_string(),
                    text: text.clone(),
                })
                .collect(),
        })
    }

    fn search(&self, store_id: &str, req: &SearchRequest) -> ApiResult<SearchResultsPage> {
        let mut state = self.state.lock();
        state.calls.push("search".into());
        state.store(store_id)?;
        let terms: Vec<String> = req
            .query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let limit = req.max_num_results.unwrap_or(10) as usize;

        let mut results = Vec::new();
        for file_id in state.attachments.get(store_id).into_iter().flatten() {
            let Some(file) = state.files.get(file_id) else {
                continue;
            };
            for chunk in &file.chunks {
                let lower = chunk.to_lowercase();
                let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                if matched > 0 {
                    results.push(SearchResult {
                        file_id: file_id.clone(),
                        filename: file.filename.clone(),
                        score: matched as f32 / terms.len() as f32,
                        content: vec![ContentPart {
                            kind: "text".to_string(),
                            text: chunk.clone(),
                        }],
                    });
                }
            }
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        let has_more = results.len() > limit;
        results.truncate(limit);
        Ok(SearchResultsPage {
            data: results,
            has_more,
        })
    }

    fn create_response(&self, req: &ResponseRequest) -> ApiResult<ResponseObject> {
        let mut state = self.state.lock();
        state.calls.push("create_response".into());
        if state.failing_inputs.contains(&req.input) {
            return Err(server_error("response generation failed"));
        }
        let id = state.new_id("resp");

        let mut output = Vec::new();
        if !req.tools.is_empty() {
            output.push(OutputItem::FileSearchCall {
                queries: vec![req.input.clone()],
            });
        }
        let annotations = state
            .citations
            .get(&req.input)
            .map(|files| {
                files
                    .iter()
                    .enumerate()
                    .map(|(i, filename)| Annotation::FileCitation {
                        file_id: format!("file_cited_{i}"),
                        filename: filename.clone(),
                        index: i as u32,
                    })
                    .collect()
            })
            .unwrap_or_default();
        output.push(OutputItem::Message {
            content: vec![OutputContent::OutputText {
                text: state.answer.clone(),
                annotations,
            }],
        });
        Ok(ResponseObject { id, output })
    }

    fn create_embeddings(&self, req: &EmbeddingRequest) -> ApiResult<EmbeddingResponse> {
        self.state.lock().calls.push("create_embeddings".into());
        Ok(EmbeddingResponse {
            data: req
                .input
                .iter()
                .enumerate()
                .map(|(index, text)| EmbeddingData {
                    index,
                    embedding: hashed_embedding(text),
                })
                .collect(),
        })
    }
}
