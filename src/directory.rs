//! Session directory
//!
//! Client-side view of the sessions the backend knows about. The list is
//! replaced wholesale on every refresh and kept in server order.

use crate::backend::{BackendError, SessionDetail, SessionSummary, WireRole};
use crate::runtime::SessionSource;
use crate::state_machine::Role;

/// Map a server role onto the two local roles
///
/// `system` has no local counterpart and renders as the assistant.
pub fn local_role(role: WireRole) -> Role {
    match role {
        WireRole::User => Role::User,
        WireRole::Assistant | WireRole::System => Role::Assistant,
    }
}

pub struct SessionDirectory<S> {
    source: S,
    sessions: Vec<SessionSummary>,
    detail: Option<SessionDetail>,
}

impl<S: SessionSource> SessionDirectory<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            sessions: Vec::new(),
            detail: None,
        }
    }

    /// Last successfully fetched list
    #[allow(dead_code)] // API completeness
    pub fn sessions(&self) -> &[SessionSummary] {
        &self.sessions
    }

    /// Last successfully fetched detail
    #[allow(dead_code)] // API completeness
    pub fn current_detail(&self) -> Option<&SessionDetail> {
        self.detail.as_ref()
    }

    /// Replace the list with the server's; on failure the old list stays
    pub async fn fetch_list(&mut self) -> Result<&[SessionSummary], BackendError> {
        let sessions = self.source.list_sessions().await?;
        tracing::debug!(count = sessions.len(), "Session directory refreshed");
        self.sessions = sessions;
        Ok(&self.sessions)
    }

    /// Fetch one session's history; on failure the old detail stays
    pub async fn fetch_detail(&mut self, thread_id: &str) -> Result<&SessionDetail, BackendError> {
        let detail = self.source.get_session(thread_id).await?;
        Ok(&*self.detail.insert(detail))
    }
}
