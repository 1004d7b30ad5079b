//! Backend error types

use thiserror::Error;

/// Longest slice of an error body kept in the message
const MAX_BODY_EXCERPT: usize = 200;

/// Backend error with classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Non-success HTTP status; `body` is whatever the server sent back
    pub fn request_failed(status: u16, body: &str) -> Self {
        let excerpt = body_excerpt(body);
        let message = if excerpt.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {excerpt}")
        };
        Self::new(BackendErrorKind::RequestFailed { status }, message)
    }

    pub fn stream_unavailable() -> Self {
        Self::new(
            BackendErrorKind::StreamUnavailable,
            "Response carried no readable stream body",
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NetworkUnavailable, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::InvalidResponse, message)
    }

    /// The request could not be built, so nothing was sent
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::InvalidRequest, message)
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            BackendErrorKind::RequestFailed { status } => Some(status),
            _ => None,
        }
    }
}

/// Error classification
///
/// None of these are retried; the caller decides how to surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Server answered with a non-success status
    RequestFailed { status: u16 },
    /// Success status but no body to stream from
    StreamUnavailable,
    /// DNS failure, refused or reset connection, broken body read
    NetworkUnavailable,
    /// Body arrived but did not match the expected shape
    InvalidResponse,
    /// Rejected before sending, e.g. an unusable session id
    InvalidRequest,
}

/// Trimmed head of a response body, short enough to log and display
pub(super) fn body_excerpt(body: &str) -> String {
    body.trim().chars().take(MAX_BODY_EXCERPT).collect()
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Self::request_failed(status.as_u16(), "")
        } else if e.is_decode() {
            Self::invalid_response(format!("Failed to decode response: {e}"))
        } else if e.is_timeout() {
            Self::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else {
            Self::network(format!("Request failed: {e}"))
        }
    }
}
