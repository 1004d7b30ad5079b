//! Conversation runtime executor

use super::traits::{SessionSource, TurnDispatcher};
use super::ViewEvent;

use crate::backend::{BackendError, ByteStream, ChatRequest, TurnResponse};
use crate::config::ProtocolMode;
use crate::directory::SessionDirectory;
use crate::state_machine::{
    transition, ConvContext, ConversationState, Effect, Event, MessageId, TransitionError,
};
use crate::stream::{decode_events, StreamEvent};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Generic conversation runtime that can work with any dispatcher and session source
pub struct ConversationRuntime<D, S>
where
    D: TurnDispatcher + 'static,
    S: SessionSource + 'static,
{
    context: ConvContext,
    state: ConversationState,
    dispatcher: Arc<D>,
    directory: SessionDirectory<S>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ViewEvent>,
}

impl<D, S> ConversationRuntime<D, S>
where
    D: TurnDispatcher + 'static,
    S: SessionSource + 'static,
{
    pub fn new(
        context: ConvContext,
        dispatcher: D,
        sessions: S,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<ViewEvent>,
    ) -> Self {
        Self {
            context,
            state: ConversationState::new(),
            dispatcher: Arc::new(dispatcher),
            directory: SessionDirectory::new(sessions),
            event_rx,
            event_tx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(mode = %self.context.mode, "Starting conversation runtime");

        // Process events in a loop - no recursion
        while let Some(event) = self.event_rx.recv().await {
            if let Err(e) = self.process_event(event).await {
                tracing::warn!(error = %e, "Event rejected");
            }
        }

        tracing::info!("Conversation runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let mut events_to_process = VecDeque::from([event]);

        while let Some(current_event) = events_to_process.pop_front() {
            if let Event::TurnFailed { error } = &current_event {
                tracing::error!(kind = ?error.kind, error = %error, "Turn failed");
            }

            // Pure state transition
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    let _ = self.broadcast_tx.send(ViewEvent::Rejected {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            };

            if result.new_state == self.state {
                tracing::trace!("Event left the conversation unchanged");
            } else {
                self.state = result.new_state;
                tracing::trace!(
                    loading = self.state.loading(),
                    messages = self.state.messages.len(),
                    "Conversation updated"
                );
                let _ = self.broadcast_tx.send(ViewEvent::Conversation {
                    state: self.state.clone(),
                });
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push_back(generated_event);
                }
            }
        }

        Ok(())
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Dispatch { request } => {
                let dispatcher = self.dispatcher.clone();
                let event_tx = self.event_tx.clone();
                let mode = self.context.mode;
                let turn = self.state.pending_assistant_id();

                tracing::info!(
                    %mode,
                    thread_id = ?request.thread_id,
                    "Dispatching turn (background)"
                );

                // Spawn the turn so the runtime keeps answering events while
                // the reply streams in
                tokio::spawn(async move {
                    let outcome = run_turn(dispatcher.as_ref(), &request, mode, turn, &event_tx).await;
                    let _ = event_tx.send(outcome).await;
                });
                None
            }

            Effect::RefreshDirectory => {
                match self.directory.fetch_list().await {
                    Ok(sessions) => {
                        let _ = self.broadcast_tx.send(ViewEvent::Sessions {
                            sessions: sessions.to_vec(),
                        });
                    }
                    Err(e) => self.report_directory_error("list", &e),
                }
                None
            }

            Effect::LoadSession { thread_id } => {
                match self.directory.fetch_detail(&thread_id).await {
                    Ok(detail) => Some(Event::SessionLoaded {
                        detail: detail.clone(),
                        thread_id,
                    }),
                    Err(e) => {
                        self.report_directory_error("detail", &e);
                        None
                    }
                }
            }
        }
    }

    fn report_directory_error(&self, fetch: &str, error: &BackendError) {
        tracing::warn!(fetch, error = %error, "Session directory fetch failed");
        let _ = self.broadcast_tx.send(ViewEvent::DirectoryError {
            message: error.to_string(),
        });
    }
}

/// Send one turn and forward its outcome
///
/// Stream deltas are forwarded as they decode; the returned event is the
/// terminal one (completion or failure).
async fn run_turn<D: TurnDispatcher + ?Sized>(
    dispatcher: &D,
    request: &ChatRequest,
    mode: ProtocolMode,
    turn: Option<MessageId>,
    event_tx: &mpsc::Sender<Event>,
) -> Event {
    match (dispatcher.send_turn(request, mode).await, turn) {
        (Ok(TurnResponse::Reply(reply)), None) => Event::ReplyReceived { reply },
        (Ok(TurnResponse::Stream(body)), Some(turn)) => forward_stream(body, turn, event_tx).await,
        (Ok(response), _) => Event::TurnFailed {
            error: BackendError::invalid_response(format!(
                "{mode} turn got an unexpected response: {response:?}"
            )),
        },
        (Err(error), _) => Event::TurnFailed { error },
    }
}

async fn forward_stream(body: ByteStream, turn: MessageId, event_tx: &mpsc::Sender<Event>) -> Event {
    let mut events = std::pin::pin!(decode_events(body));
    let mut deltas = 0usize;

    while let Some(item) = events.next().await {
        match item {
            Ok(StreamEvent::TextDelta(text)) => {
                deltas += 1;
                if event_tx.send(Event::TextDelta { turn, text }).await.is_err() {
                    break;
                }
            }
            Ok(StreamEvent::TurnComplete { thread_id }) => {
                tracing::debug!(deltas, thread_id = ?thread_id, "Stream completed");
                return Event::TurnComplete { turn, thread_id };
            }
            Err(error) => return Event::TurnFailed { error },
        }
    }

    tracing::warn!(deltas, "Stream ended without a completion frame");
    Event::TurnComplete {
        turn,
        thread_id: None,
    }
}
