//! Events that can occur in a conversation

use super::state::MessageId;
use crate::backend::{BackendError, ChatReply, SessionDetail};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit {
        text: String,
    },
    NewChat,
    SelectSession {
        thread_id: String,
    },
    RefreshSessions,

    // Stream events, tagged with the placeholder they were dispatched for
    TextDelta {
        turn: MessageId,
        text: String,
    },
    TurnComplete {
        turn: MessageId,
        thread_id: Option<String>,
    },

    // Backend results
    ReplyReceived {
        reply: ChatReply,
    },
    TurnFailed {
        error: BackendError,
    },
    /// History for the session the user selected; `thread_id` is the id
    /// that was requested
    SessionLoaded {
        thread_id: String,
        detail: SessionDetail,
    },
}
