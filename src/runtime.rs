//! Runtime for driving a conversation
//!
//! One task owns the conversation state and applies events in arrival order.
//! Backend calls run in spawned tasks and report back as events.

mod executor;
pub mod traits;


pub use executor::ConversationRuntime;
pub use traits::*;

use crate::backend::SessionSummary;
use crate::state_machine::{ConvContext, ConversationState, Event};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const VIEW_CHANNEL_CAPACITY: usize = 256;

/// Updates published to views
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// The conversation changed; carries the full new snapshot
    Conversation { state: ConversationState },
    /// The session list was refreshed
    Sessions { sessions: Vec<SessionSummary> },
    /// A session list or detail fetch failed; the conversation is untouched
    DirectoryError { message: String },
    /// A user action was refused in the current state
    Rejected { message: String },
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<ViewEvent>,
}

impl ConversationHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Queue an event; fails only once the runtime has stopped
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.event_tx.send(event).await
    }
}

/// Spawn a runtime for a fresh conversation
pub fn start<D, S>(
    context: ConvContext,
    dispatcher: D,
    sessions: S,
) -> (ConversationHandle, JoinHandle<()>)
where
    D: TurnDispatcher + 'static,
    S: SessionSource + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (broadcast_tx, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);

    let runtime = ConversationRuntime::new(
        context,
        dispatcher,
        sessions,
        event_rx,
        event_tx.clone(),
        broadcast_tx.clone(),
    );
    let task = tokio::spawn(runtime.run());

    (
        ConversationHandle {
            event_tx,
            broadcast_tx,
        },
        task,
    )
}
