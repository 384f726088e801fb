//! Vector-store API models for storelens.
//!
//! These types mirror the JSON bodies of the hosted vector-store, files,
//! responses and embeddings endpoints. Only the fields the tools read are
//! modelled; everything else in a response body is ignored on decode.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod client;
pub mod stub;

pub use client::OpenAiClient;
pub use stub::StubApi;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected response: {0}")]
    Unexpected(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cancelled: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub file_counts: FileCounts,
    #[serde(default)]
    pub status: Option<String>,
}

impl VectorStore {
    pub fn details(&self) -> core_types::StoreDetails {
        core_types::StoreDetails {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_default(),
            created_at: self.created_at,
            file_count: self.file_counts.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Assistants,
}

impl FilePurpose {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assistants => "assistants",
        }
    }
}

/// An uploaded file object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: i64,
}

/// A file attached to a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    #[serde(default)]
    pub vector_store_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attributes: Option<IndexMap<String, serde_json::Value>>,
}

/// Cursor-paginated list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default = "text_type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

fn text_type() -> String {
    "text".to_string()
}

/// Parsed text of a file inside a vector store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub data: Vec<ContentPart>,
}

impl FileContent {
    pub fn joined_text(&self) -> String {
        self.data
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_results: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl From<SearchResult> for core_types::SearchHit {
    fn from(value: SearchResult) -> Self {
        Self {
            file_id: value.file_id,
            filename: value.filename,
            score: value.score,
            content: value.content.into_iter().map(|c| c.text).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultsPage {
    #[serde(default)]
    pub data: Vec<SearchResult>,
    #[serde(default)]
    pub has_more: bool,
}

/// Tool definition passed to the Responses API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch {
        vector_store_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_num_results: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    pub model: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ResponseRequest {
    /// Plain text generation without tools.
    pub fn text(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    /// Generation grounded on one vector store through the file_search tool.
    pub fn file_search(
        model: impl Into<String>,
        input: impl Into<String>,
        store_id: impl Into<String>,
        max_num_results: Option<u32>,
    ) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            tools: vec![Tool::FileSearch {
                vector_store_ids: vec![store_id.into()],
                max_num_results,
            }],
            tool_choice: None,
        }
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    FileCitation {
        file_id: String,
        #[serde(default)]
        filename: String,
        #[serde(default)]
        index: u32,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<Annotation>,
    },
    Refusal {
        refusal: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    FileSearchCall {
        #[serde(default)]
        queries: Vec<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseObject {
    pub id: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

impl ResponseObject {
    /// Text and annotations of the first message's first text part.
    ///
    /// Tool calls (such as the file search itself) come before the message in
    /// `output`, so the message is located by type rather than by position.
    pub fn first_output_text(&self) -> Option<(&str, &[Annotation])> {
        self.output.iter().find_map(|item| match item {
            OutputItem::Message { content } => content.iter().find_map(|c| match c {
                OutputContent::OutputText { text, annotations } => {
                    Some((text.as_str(), annotations.as_slice()))
                }
                _ => None,
            }),
            _ => None,
        })
    }

    pub fn message_text(&self) -> Option<&str> {
        self.first_output_text().map(|(text, _)| text)
    }

    /// Filenames of the file citations on the first text part, in citation
    /// order and with repeats. `None` when the response carries no message.
    pub fn cited_filenames(&self) -> Option<Vec<String>> {
        self.first_output_text().map(|(_, annotations)| {
            annotations
                .iter()
                .filter_map(|a| match a {
                    Annotation::FileCitation { filename, .. } => Some(filename.clone()),
                    Annotation::Other => None,
                })
                .collect()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

impl EmbeddingResponse {
    /// Embeddings ordered by input index.
    pub fn into_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|d| d.index);
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

/// Blocking access to a hosted vector store.
///
/// Implementations must be shareable across the worker pool; every call is a
/// single request with no retries.
pub trait VectorStoreApi: Send + Sync {
    fn create_vector_store(&self, name: &str) -> ApiResult<VectorStore>;

    fn retrieve_vector_store(&self, store_id: &str) -> ApiResult<VectorStore>;

    fn upload_file(&self, path: &Path, purpose: FilePurpose) -> ApiResult<FileObject>;

    fn retrieve_file(&self, file_id: &str) -> ApiResult<FileObject>;

    fn attach_file(&self, store_id: &str, file_id: &str) -> ApiResult<VectorStoreFile>;

    fn list_store_files(
        &self,
        store_id: &str,
        after: Option<&str>,
        limit: u32,
    ) -> ApiResult<ListPage<VectorStoreFile>>;

    fn file_content(&self, store_id: &str, file_id: &str) -> ApiResult<FileContent>;

    fn search(&self, store_id: &str, req: &SearchRequest) -> ApiResult<SearchResultsPage>;

    fn create_response(&self, req: &ResponseRequest) -> ApiResult<ResponseObject>;

    fn create_embeddings(&self, req: &EmbeddingRequest) -> ApiResult<EmbeddingResponse>;
}
