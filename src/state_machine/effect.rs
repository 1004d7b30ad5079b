//! Effects produced by state transitions

use super::state::ThreadRef;
use crate::backend::ChatRequest;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the turn to the backend in the configured protocol mode
    Dispatch { request: ChatRequest },

    /// Re-fetch the session list
    RefreshDirectory,

    /// Fetch a session's history so it can replace the conversation
    LoadSession { thread_id: String },
}

impl Effect {
    pub fn dispatch(text: impl Into<String>, thread: &ThreadRef) -> Self {
        Effect::Dispatch {
            request: ChatRequest::new(text, thread),
        }
    }
}
