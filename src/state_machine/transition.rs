//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result and performs no I/O. Network work is requested through effects.

use super::state::{ERROR_REPLY, WORKING_MARKER};
use super::{ConvContext, ConversationState, Effect, Event, Role, ThreadRef, TurnPhase};
use crate::config::ProtocolMode;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
///
/// A rejected event leaves the state exactly as it was.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A reply is still in progress")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state.phase, event) {
        // ============================================================
        // Submitting a turn
        // ============================================================
        (TurnPhase::Idle, Event::UserSubmit { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyMessage);
            }

            let mut next = state.clone();
            next.push_message(Role::User, text);
            let phase = match context.mode {
                ProtocolMode::Stream => {
                    let pending = next.push_message(Role::Assistant, WORKING_MARKER);
                    TurnPhase::AwaitingTurn {
                        pending,
                        started: false,
                    }
                }
                ProtocolMode::Sync => TurnPhase::AwaitingReply,
            };
            next.phase = phase;

            let effect = Effect::dispatch(text, &next.thread);
            Ok(TransitionResult::new(next).with_effect(effect))
        }

        (_, Event::UserSubmit { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Streaming turn
        // ============================================================
        (TurnPhase::AwaitingTurn { pending, started }, Event::TextDelta { turn, text })
            if turn == pending =>
        {
            let mut next = state.clone();
            if let Some(message) = next.message_mut(pending) {
                // The first delta replaces the working marker
                if !started {
                    message.text.clear();
                }
                message.text.push_str(&text);
            }
            next.phase = TurnPhase::AwaitingTurn {
                pending,
                started: true,
            };
            Ok(TransitionResult::new(next))
        }

        (TurnPhase::AwaitingTurn { pending, started }, Event::TurnComplete { turn, thread_id })
            if turn == pending =>
        {
            let mut next = state.clone();
            if !started {
                if let Some(message) = next.message_mut(pending) {
                    message.text.clear();
                }
            }
            if let ThreadRef::Existing(id) = ThreadRef::from_wire(thread_id) {
                next.thread = ThreadRef::Existing(id);
            }
            next.phase = TurnPhase::Idle;
            Ok(TransitionResult::new(next).with_effect(Effect::RefreshDirectory))
        }

        // Stream events for a turn that is no longer pending (reset,
        // failed, or superseded) are dropped
        (_, Event::TextDelta { .. } | Event::TurnComplete { .. }) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Synchronous turn
        // ============================================================
        (TurnPhase::AwaitingReply, Event::ReplyReceived { reply }) => {
            let mut next = state.clone();
            next.replace_history(&reply.history);
            if let ThreadRef::Existing(id) = ThreadRef::from_wire(Some(reply.thread_id)) {
                next.thread = ThreadRef::Existing(id);
            }
            next.phase = TurnPhase::Idle;
            Ok(TransitionResult::new(next).with_effect(Effect::RefreshDirectory))
        }

        (phase, Event::ReplyReceived { .. }) => Err(TransitionError::InvalidTransition(format!(
            "reply received while {phase:?}"
        ))),

        // ============================================================
        // Error recovery
        // ============================================================
        (phase, Event::TurnFailed { .. }) => {
            let mut next = state.clone();
            if let TurnPhase::AwaitingTurn { pending, .. } = phase {
                next.messages.retain(|m| m.id != pending);
            }
            next.push_message(Role::Assistant, ERROR_REPLY);
            next.phase = TurnPhase::Idle;
            Ok(TransitionResult::new(next))
        }

        // ============================================================
        // Conversation reset and session selection
        // ============================================================
        (TurnPhase::Idle, Event::NewChat) => {
            let mut next = state.clone();
            next.messages.clear();
            next.thread = ThreadRef::New;
            Ok(TransitionResult::new(next))
        }

        (TurnPhase::Idle, Event::SelectSession { thread_id }) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::LoadSession { thread_id }))
        }

        (TurnPhase::Idle, Event::SessionLoaded { thread_id, detail }) => {
            // The selected id is authoritative; a detail naming another
            // session belongs to a different thread
            let returned = detail.thread_id();
            if !returned.is_empty() && returned != thread_id {
                return Err(TransitionError::InvalidTransition(format!(
                    "session {thread_id} loaded as {returned}"
                )));
            }
            let mut next = state.clone();
            next.replace_history(&detail.messages);
            next.thread = ThreadRef::Existing(thread_id);
            Ok(TransitionResult::new(next))
        }

        // The directory can be refreshed at any time without touching the
        // conversation
        (_, Event::RefreshSessions) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::RefreshDirectory))
        }

        (_, Event::NewChat | Event::SelectSession { .. } | Event::SessionLoaded { .. }) => {
            Err(TransitionError::Busy)
        }
    }
}
