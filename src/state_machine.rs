//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    ConvContext, ConversationState, Message, MessageId, Role, ThreadRef, TurnPhase, ERROR_REPLY,
    WORKING_MARKER,
};
pub use transition::{transition, TransitionError};
