//! Conversation state types

use crate::backend::ChatMessage;
use crate::config::ProtocolMode;
use crate::directory::local_role;
use std::fmt;

/// Text of the assistant placeholder until the first delta arrives
pub const WORKING_MARKER: &str = "...";

/// Text of the assistant message synthesized when a turn fails
pub const ERROR_REPLY: &str =
    "Homebrain: I hit an error talking to the backend. Check backend logs for more details.";

/// Opaque message identifier, unique for the lifetime of one state value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Author of a local message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
}

/// Server thread the conversation is bound to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThreadRef {
    /// No thread yet; the server creates one on the first turn
    #[default]
    New,
    Existing(String),
}

impl ThreadRef {
    /// Empty or missing ids mean "no thread"
    pub fn from_wire(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.is_empty() => ThreadRef::Existing(id),
            _ => ThreadRef::New,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ThreadRef::New => None,
            ThreadRef::Existing(id) => Some(id),
        }
    }
}

/// Where the conversation is in its turn cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    /// Streaming turn in flight, deltas grow the `pending` placeholder
    AwaitingTurn {
        pending: MessageId,
        /// Whether a delta has replaced the working marker yet
        started: bool,
    },
    /// Synchronous turn in flight
    AwaitingReply,
}

/// Authoritative client-side conversation
///
/// Only `transition` produces new values; everything else reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub thread: ThreadRef,
    pub phase: TurnPhase,
    next_id: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a turn is in flight; gates new submissions
    pub fn loading(&self) -> bool {
        !self.is_idle()
    }

    /// Empty conversation bound to an existing thread
    pub fn on_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread: ThreadRef::Existing(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, TurnPhase::Idle)
    }

    /// Placeholder being grown by the current streaming turn
    pub fn pending_assistant_id(&self) -> Option<MessageId> {
        match self.phase {
            TurnPhase::AwaitingTurn { pending, .. } => Some(pending),
            _ => None,
        }
    }

    pub(super) fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Append a message under a fresh id
    pub(super) fn push_message(&mut self, role: Role, text: impl Into<String>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text: text.into(),
        });
        id
    }

    /// Swap the whole message list for server history
    ///
    /// Ids keep counting up, so nothing from before the swap is ever reused.
    pub(super) fn replace_history(&mut self, history: &[ChatMessage]) {
        self.messages.clear();
        for entry in history {
            self.push_message(local_role(entry.role), entry.content.clone());
        }
    }
}

/// Immutable inputs to the transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvContext {
    pub mode: ProtocolMode,
}

impl ConvContext {
    pub fn new(mode: ProtocolMode) -> Self {
        Self { mode }
    }
}
