//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::backend::{
    BackendError, ChatRequest, HttpBackend, SessionDetail, SessionSummary, TurnResponse,
};
use crate::config::ProtocolMode;
use async_trait::async_trait;
use std::sync::Arc;

/// Sends one conversation turn to the backend
#[async_trait]
pub trait TurnDispatcher: Send + Sync {
    /// Send a turn in the given protocol mode
    ///
    /// The message is sent as given; callers trim and validate it first.
    async fn send_turn(
        &self,
        request: &ChatRequest,
        mode: ProtocolMode,
    ) -> Result<TurnResponse, BackendError>;
}

/// Read access to past sessions
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// All sessions, in server order
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError>;

    /// One session with its full history
    async fn get_session(&self, thread_id: &str) -> Result<SessionDetail, BackendError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TurnDispatcher + ?Sized> TurnDispatcher for Arc<T> {
    async fn send_turn(
        &self,
        request: &ChatRequest,
        mode: ProtocolMode,
    ) -> Result<TurnResponse, BackendError> {
        (**self).send_turn(request, mode).await
    }
}

#[async_trait]
impl<T: SessionSource + ?Sized> SessionSource for Arc<T> {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        (**self).list_sessions().await
    }

    async fn get_session(&self, thread_id: &str) -> Result<SessionDetail, BackendError> {
        (**self).get_session(thread_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl TurnDispatcher for HttpBackend {
    async fn send_turn(
        &self,
        request: &ChatRequest,
        mode: ProtocolMode,
    ) -> Result<TurnResponse, BackendError> {
        match mode {
            ProtocolMode::Sync => self.chat(request).await.map(TurnResponse::Reply),
            ProtocolMode::Stream => self.chat_stream(request).await.map(TurnResponse::Stream),
        }
    }
}

#[async_trait]
impl SessionSource for HttpBackend {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        HttpBackend::list_sessions(self).await
    }

    async fn get_session(&self, thread_id: &str) -> Result<SessionDetail, BackendError> {
        HttpBackend::get_session(self, thread_id).await
    }
}
