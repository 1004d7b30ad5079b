//! HTTP adapter for the chat backend

use super::error::body_excerpt;
use super::types::{ChatReply, ChatRequest, HealthStatus, SessionDetail, SessionSummary};
use super::{BackendError, ByteStream};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

/// Talks to the backend over HTTP/JSON
///
/// All endpoints are resolved relative to `base_url`, which already carries
/// the `/api` prefix.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `POST /chat`
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let response = send(self.client.post(self.url("/chat")).json(request)).await?;
        read_json(response).await
    }

    /// `POST /chat/stream`, handing back the raw body
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError> {
        let response = send(self.client.post(self.url("/chat/stream")).json(request)).await?;

        if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(BackendError::stream_unavailable());
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(BackendError::from)),
        ))
    }

    /// `GET /sessions`
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        let response = send(self.client.get(self.url("/sessions"))).await?;
        read_json(response).await
    }

    /// `GET /sessions/{id}`
    pub async fn get_session(&self, thread_id: &str) -> Result<SessionDetail, BackendError> {
        let response = send(self.client.get(self.session_url(thread_id)?)).await?;
        read_json(response).await
    }

    /// Session detail URL with the id encoded as a single path segment
    fn session_url(&self, thread_id: &str) -> Result<Url, BackendError> {
        // Dot segments survive encoding and would be resolved by the server
        if matches!(thread_id, "" | "." | "..") {
            return Err(BackendError::invalid_request(format!(
                "Invalid session id: {thread_id:?}"
            )));
        }

        let mut url = Url::parse(&self.url("/sessions"))
            .map_err(|e| BackendError::invalid_request(format!("Invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::invalid_request("API URL cannot carry a path"))?
            .push(thread_id);
        Ok(url)
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, BackendError> {
        let response = send(self.client.get(self.url("/health"))).await?;
        read_json(response).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request.send().await.map_err(BackendError::from)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::request_failed(status.as_u16(), &body));
    }

    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = response
        .text()
        .await
        .map_err(|e| BackendError::network(format!("Failed to read response: {e}")))?;

    serde_json::from_str(&body).map_err(|e| {
        BackendError::invalid_response(format!(
            "Failed to parse response: {e} - body: {}",
            body_excerpt(&body)
        ))
    })
}
