use crate::{
    ApiError, ApiResult, EmbeddingRequest, EmbeddingResponse, FileContent, FileObject,
    FilePurpose, ListPage, ResponseObject, ResponseRequest, SearchRequest, SearchResultsPage,
    VectorStore, VectorStoreApi, VectorStoreFile,
};
use core_types::config::ApiSettings;
use reqwest::blocking::{Client, RequestBuilder, multipart};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Blocking HTTP client for the hosted vector-store API.
///
/// Safe to share across worker threads; `reqwest` pools connections
/// internally. Requests are sent once and never retried.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct CreateStoreBody<'a> {
    name: &'a str,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> ApiResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, None)
    }

    pub fn from_settings(settings: &ApiSettings, api_key: impl Into<String>) -> ApiResult<Self> {
        Self::with_base_url(
            api_key,
            &settings.base_url,
            settings.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
        request_timeout: Option<Duration>,
    ) -> ApiResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        } else {
            // Blocking clients otherwise default to 30s.
            builder = builder.timeout(None::<Duration>);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn get_json<Resp: DeserializeOwned>(&self, path: &str) -> ApiResult<Resp> {
        debug!(path, "GET");
        let resp = self.authed(self.http.get(self.url(path))).send()?;
        decode(resp)
    }

    fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> ApiResult<Resp> {
        debug!(path, "POST");
        let resp = self
            .authed(self.http.post(self.url(path)))
            .json(body)
            .send()?;
        decode(resp)
    }
}

fn decode<Resp: DeserializeOwned>(resp: reqwest::blocking::Response) -> ApiResult<Resp> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(message));
        }
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }
    let bytes = resp.bytes()?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Unexpected(e.to_string()))
}

impl VectorStoreApi for OpenAiClient {
    fn create_vector_store(&self, name: &str) -> ApiResult<VectorStore> {
        self.post_json("vector_stores", &CreateStoreBody { name })
    }

    fn retrieve_vector_store(&self, store_id: &str) -> ApiResult<VectorStore> {
        self.get_json(&format!("vector_stores/{store_id}"))
    }

    fn upload_file(&self, path: &Path, purpose: FilePurpose) -> ApiResult<FileObject> {
        let form = multipart::Form::new()
            .text("purpose", purpose.as_str())
            .file("file", path)?;
        debug!(path = %path.display(), "POST files");
        let resp = self
            .authed(self.http.post(self.url("files")))
            .multipart(form)
            .send()?;
        decode(resp)
    }

    fn retrieve_file(&self, file_id: &str) -> ApiResult<FileObject> {
        self.get_json(&format!("files/{file_id}"))
    }

    fn attach_file(&self, store_id: &str, file_id: &str) -> ApiResult<VectorStoreFile> {
        self.post_json(
            &format!("vector_stores/{store_id}/files"),
            &json!({ "file_id": file_id }),
        )
    }

    fn list_store_files(
        &self,
        store_id: &str,
        after: Option<&str>,
        limit: u32,
    ) -> ApiResult<ListPage<VectorStoreFile>> {
        let mut path = format!("vector_stores/{store_id}/files?limit={limit}");
        if let Some(cursor) = after {
            path.push_str("&after=");
            path.push_str(cursor);
        }
        self.get_json(&path)
    }

    fn file_content(&self, store_id: &str, file_id: &str) -> ApiResult<FileContent> {
        self.get_json(&format!("vector_stores/{store_id}/files/{file_id}/content"))
    }

    fn search(&self, store_id: &str, req: &SearchRequest) -> ApiResult<SearchResultsPage> {
        self.post_json(&format!("vector_stores/{store_id}/search"), req)
    }

    fn create_response(&self, req: &ResponseRequest) -> ApiResult<ResponseObject> {
        self.post_json("responses", req)
    }

    fn create_embeddings(&self, req: &EmbeddingRequest) -> ApiResult<EmbeddingResponse> {
        self.post_json("embeddings", req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = OpenAiClient::with_base_url("k", "http://localhost:9/v1/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9/v1");
        assert_eq!(
            client.url("/vector_stores/vs_1"),
            "http://localhost:9/v1/vector_stores/vs_1"
        );
    }

    #[test]
    fn settings_feed_the_client() {
        let settings = ApiSettings {
            base_url: "http://127.0.0.1:1/v1".into(),
            api_key: None,
            request_timeout_secs: Some(5),
        };
        let client = OpenAiClient::from_settings(&settings, "k").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1/v1");
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let client = OpenAiClient::with_base_url(
            "k",
            "http://127.0.0.1:1/v1",
            Some(Duration::from_secs(2)),
        )
        .unwrap();
        let err = client.retrieve_vector_store("vs_1").unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
