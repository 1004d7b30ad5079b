//! Chat backend client
//!
//! Wire types, error classification, and the HTTP adapter for the
//! `/chat`, `/chat/stream`, and `/sessions` endpoints.

mod error;
mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::*;

use crate::config::ProtocolMode;
use crate::runtime::{SessionSource, TurnDispatcher};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::time::Instant;

/// Raw response body of a streaming turn, chunked however the transport delivered it
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, BackendError>> + Send>>;

/// What a dispatched turn hands back
pub enum TurnResponse {
    /// Synchronous mode: the complete reply with authoritative history
    Reply(ChatReply),
    /// Streaming mode: an open body to feed through the frame decoder
    Stream(ByteStream),
}

impl std::fmt::Debug for TurnResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnResponse::Reply(reply) => f.debug_tuple("Reply").field(reply).finish(),
            TurnResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Logging wrapper for backend collaborators
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(endpoint: &str, start: Instant, result: &Result<T, BackendError>) {
    let duration = start.elapsed();
    match result {
        Ok(_) => {
            tracing::info!(
                endpoint,
                duration_ms = %duration.as_millis(),
                "Backend request completed"
            );
        }
        Err(e) => {
            tracing::error!(
                endpoint,
                duration_ms = %duration.as_millis(),
                error = %e.message,
                status = ?e.status(),
                "Backend request failed"
            );
        }
    }
}

#[async_trait]
impl<B: TurnDispatcher> TurnDispatcher for LoggingBackend<B> {
    async fn send_turn(
        &self,
        request: &ChatRequest,
        mode: ProtocolMode,
    ) -> Result<TurnResponse, BackendError> {
        let start = Instant::now();
        let endpoint = mode.endpoint();
        match self.inner.send_turn(request, mode).await {
            // Headers are in but the reply is still on its way
            Ok(TurnResponse::Stream(body)) => {
                tracing::info!(
                    endpoint,
                    ttfb_ms = %start.elapsed().as_millis(),
                    "Backend stream opened"
                );
                Ok(TurnResponse::Stream(log_stream(body, endpoint, start)))
            }
            result => {
                log_outcome(endpoint, start, &result);
                result
            }
        }
    }
}

/// Pass `body` through, logging once when it ends or fails
fn log_stream(body: ByteStream, endpoint: &'static str, start: Instant) -> ByteStream {
    Box::pin(stream::unfold(Some((body, 0usize)), move |state| async move {
        let (mut body, bytes) = state?;
        match body.next().await {
            Some(Ok(chunk)) => {
                let bytes = bytes + chunk.len();
                Some((Ok(chunk), Some((body, bytes))))
            }
            Some(Err(e)) => {
                tracing::error!(
                    endpoint,
                    duration_ms = %start.elapsed().as_millis(),
                    bytes,
                    error = %e.message,
                    "Backend stream failed"
                );
                Some((Err(e), None))
            }
            None => {
                tracing::info!(
                    endpoint,
                    duration_ms = %start.elapsed().as_millis(),
                    bytes,
                    "Backend stream completed"
                );
                None
            }
        }
    }))
}

#[async_trait]
impl<B: SessionSource> SessionSource for LoggingBackend<B> {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        let start = Instant::now();
        let result = self.inner.list_sessions().await;
        log_outcome("/sessions", start, &result);
        if let Ok(sessions) = &result {
            tracing::debug!(count = sessions.len(), "Session list fetched");
        }
        result
    }

    async fn get_session(&self, thread_id: &str) -> Result<SessionDetail, BackendError> {
        let start = Instant::now();
        let result = self.inner.get_session(thread_id).await;
        log_outcome("/sessions/{id}", start, &result);
        result
    }
}
