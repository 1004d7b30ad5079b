//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::backend::{BackendError, ChatMessage, ChatReply, SessionDetail, SessionSummary, WireRole};
use crate::config::ProtocolMode;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Test Helpers
// ============================================================================

/// Abstract step; turned into a concrete event against the current state
/// so stream events can target the live turn or an abandoned one
#[derive(Debug, Clone)]
enum Action {
    Submit(String),
    Delta(String),
    Complete(Option<String>),
    StaleDelta(String),
    Reply(Vec<ChatMessage>, String),
    Fail,
    NewChat,
    Refresh,
    Select(String),
    Loaded(SessionDetail),
}

struct Driver {
    context: ConvContext,
    state: ConversationState,
    seen_turns: Vec<MessageId>,
}

impl Driver {
    fn new(mode: ProtocolMode) -> Self {
        Self {
            context: ConvContext::new(mode),
            state: ConversationState::new(),
            seen_turns: vec![],
        }
    }

    fn event_for(&self, action: Action) -> Option<Event> {
        let live = self.state.pending_assistant_id();
        let event = match action {
            Action::Submit(text) => Event::UserSubmit { text },
            Action::Delta(text) => Event::TextDelta { turn: live?, text },
            Action::Complete(thread_id) => Event::TurnComplete {
                turn: live?,
                thread_id,
            },
            Action::StaleDelta(text) => Event::TextDelta {
                turn: *self.seen_turns.iter().find(|id| Some(**id) != live)?,
                text,
            },
            Action::Reply(history, thread_id) => Event::ReplyReceived {
                reply: ChatReply {
                    reply: history.last().map(|m| m.content.clone()).unwrap_or_default(),
                    history,
                    thread_id,
                },
            },
            Action::Fail => Event::TurnFailed {
                error: BackendError::request_failed(500, "boom"),
            },
            Action::NewChat => Event::NewChat,
            Action::Refresh => Event::RefreshSessions,
            Action::Select(thread_id) => Event::SelectSession { thread_id },
            Action::Loaded(detail) => Event::SessionLoaded {
                thread_id: detail.thread_id().to_string(),
                detail,
            },
        };
        Some(event)
    }

    /// Apply the action; rejected events leave the state untouched
    fn step(&mut self, action: Action) -> Option<Result<Vec<Effect>, TransitionError>> {
        let event = self.event_for(action)?;
        let outcome = transition(&self.state, &self.context, event).map(|result| {
            self.state = result.new_state;
            result.effects
        });
        if let Some(id) = self.state.pending_assistant_id() {
            if !self.seen_turns.contains(&id) {
                self.seen_turns.push(id);
            }
        }
        Some(outcome)
    }
}

fn local(role: WireRole) -> Role {
    match role {
        WireRole::User => Role::User,
        WireRole::Assistant | WireRole::System => Role::Assistant,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_mode() -> impl Strategy<Value = ProtocolMode> {
    prop_oneof![Just(ProtocolMode::Stream), Just(ProtocolMode::Sync)]
}

fn arb_role() -> impl Strategy<Value = WireRole> {
    prop_oneof![
        Just(WireRole::User),
        Just(WireRole::Assistant),
        Just(WireRole::System),
    ]
}

fn arb_history() -> impl Strategy<Value = Vec<ChatMessage>> {
    proptest::collection::vec(
        (arb_role(), "[a-zA-Z ]{0,20}").prop_map(|(role, content)| ChatMessage::new(role, content)),
        0..6,
    )
}

fn arb_detail() -> impl Strategy<Value = SessionDetail> {
    ("[a-f0-9]{8}", arb_history(), 0i64..2_000_000_000).prop_map(|(id, messages, secs)| {
        SessionDetail {
            summary: SessionSummary {
                thread_id: id,
                created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            },
            messages,
        }
    })
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => "[a-zA-Z ]{0,20}".prop_map(Action::Submit),
        4 => "[a-zA-Z .]{0,10}".prop_map(Action::Delta),
        2 => proptest::option::of("[a-f0-9]{0,8}").prop_map(Action::Complete),
        1 => "[a-z]{1,5}".prop_map(Action::StaleDelta),
        1 => (arb_history(), "[a-f0-9]{0,8}").prop_map(|(h, t)| Action::Reply(h, t)),
        1 => Just(Action::Fail),
        1 => Just(Action::NewChat),
        1 => Just(Action::Refresh),
        1 => "[a-f0-9]{8}".prop_map(Action::Select),
        1 => arb_detail().prop_map(Action::Loaded),
    ]
}

// ============================================================================
// State Validity Checkers
// ============================================================================

fn is_valid_state(state: &ConversationState) -> bool {
    // A pending id exists exactly while streaming, and names the trailing
    // assistant placeholder
    let pending_ok = match (state.phase, state.pending_assistant_id()) {
        (TurnPhase::AwaitingTurn { .. }, Some(id)) => state
            .messages
            .last()
            .is_some_and(|m| m.id == id && m.role == Role::Assistant),
        (TurnPhase::AwaitingTurn { .. }, None) => false,
        (_, pending) => pending.is_none(),
    };

    let ids: HashSet<MessageId> = state.messages.iter().map(|m| m.id).collect();
    pending_ok && ids.len() == state.messages.len() && state.loading() != state.is_idle()
}

fn effects_are_valid(effects: &[Effect], new_state: &ConversationState) -> bool {
    effects.iter().all(|effect| match effect {
        Effect::Dispatch { request } => new_state.loading() && !request.message.trim().is_empty(),
        Effect::LoadSession { .. } => new_state.is_idle(),
        Effect::RefreshDirectory => true,
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Valid state and effects after any sequence of events
    #[test]
    fn prop_transitions_preserve_validity(
        mode in arb_mode(),
        actions in proptest::collection::vec(arb_action(), 0..30),
    ) {
        let mut driver = Driver::new(mode);
        for action in actions {
            let before = driver.state.clone();
            match driver.step(action) {
                Some(Ok(effects)) => {
                    prop_assert!(is_valid_state(&driver.state), "Invalid state: {:?}", driver.state);
                    prop_assert!(
                        effects_are_valid(&effects, &driver.state),
                        "Invalid effects for state {:?}: {:?}",
                        driver.state,
                        effects
                    );
                }
                Some(Err(_)) => prop_assert_eq!(&driver.state, &before),
                None => {}
            }
        }
    }

    // Invariant 2: Whitespace-only input never changes state or dispatches
    #[test]
    fn prop_whitespace_submit_is_noop(
        mode in arb_mode(),
        actions in proptest::collection::vec(arb_action(), 0..15),
        blank in "[ \t\n\r]{0,8}",
    ) {
        let mut driver = Driver::new(mode);
        for action in actions {
            driver.step(action);
        }

        let result = transition(&driver.state, &driver.context, Event::UserSubmit { text: blank });
        prop_assert!(result.is_err());
    }

    // Invariant 3: Stream deltas concatenate in order into the reply
    #[test]
    fn prop_stream_assembly(
        prompt in "[a-zA-Z]{1,10}",
        deltas in proptest::collection::vec("[a-zA-Z .]{1,8}", 1..10),
    ) {
        let mut driver = Driver::new(ProtocolMode::Stream);
        driver.step(Action::Submit(prompt)).unwrap().unwrap();
        for delta in &deltas {
            driver.step(Action::Delta(delta.clone())).unwrap().unwrap();
        }
        driver.step(Action::Complete(Some("T1".to_string()))).unwrap().unwrap();

        let last = driver.state.messages.last().unwrap();
        prop_assert_eq!(&last.text, &deltas.concat());
        prop_assert_eq!(&driver.state.thread, &ThreadRef::Existing("T1".to_string()));
    }

    // Invariant 4: A failed turn leaves exactly one error reply and no placeholder
    #[test]
    fn prop_error_recovery(
        mode in arb_mode(),
        history in proptest::collection::vec(arb_action(), 0..15),
        prompt in "[a-zA-Z]{1,10}",
        deltas in proptest::collection::vec("[a-z]{1,5}", 0..5),
    ) {
        let mut driver = Driver::new(mode);
        for action in history {
            driver.step(action);
        }
        prop_assume!(driver.state.is_idle());
        let before = driver.state.messages.clone();

        driver.step(Action::Submit(prompt.clone())).unwrap().unwrap();
        for delta in deltas {
            driver.step(Action::Delta(delta));
        }
        let effects = driver.step(Action::Fail).unwrap().unwrap();

        let state = &driver.state;
        prop_assert!(effects.is_empty());
        prop_assert!(state.is_idle());
        prop_assert_eq!(state.pending_assistant_id(), None);
        prop_assert_eq!(state.messages.len(), before.len() + 2);
        prop_assert_eq!(&state.messages[..before.len()], &before[..]);
        prop_assert_eq!(&state.messages[before.len()].text, &prompt);
        prop_assert_eq!(state.messages[before.len() + 1].text.as_str(), ERROR_REPLY);
    }

    // Invariant 5: Reset from idle is total and idempotent
    #[test]
    fn prop_new_chat_idempotent(
        mode in arb_mode(),
        actions in proptest::collection::vec(arb_action(), 0..20),
    ) {
        let mut driver = Driver::new(mode);
        for action in actions {
            driver.step(action);
        }
        prop_assume!(driver.state.is_idle());

        let once = transition(&driver.state, &driver.context, Event::NewChat).unwrap();
        prop_assert!(once.effects.is_empty());
        prop_assert!(once.new_state.messages.is_empty());
        prop_assert_eq!(&once.new_state.thread, &ThreadRef::New);

        let twice = transition(&once.new_state, &driver.context, Event::NewChat).unwrap();
        prop_assert_eq!(twice.new_state, once.new_state);
    }

    // Invariant 6: A loaded session fully determines messages and thread
    #[test]
    fn prop_session_selection_determinism(
        mode in arb_mode(),
        actions in proptest::collection::vec(arb_action(), 0..20),
        detail in arb_detail(),
    ) {
        let mut driver = Driver::new(mode);
        for action in actions {
            driver.step(action);
        }
        prop_assume!(driver.state.is_idle());

        let next = transition(
            &driver.state,
            &driver.context,
            Event::SessionLoaded {
                thread_id: detail.thread_id().to_string(),
                detail: detail.clone(),
            },
        )
        .unwrap()
        .new_state;

        let mapped: Vec<(Role, &str)> =
            next.messages.iter().map(|m| (m.role, m.text.as_str())).collect();
        let expected: Vec<(Role, &str)> = detail
            .messages
            .iter()
            .map(|m| (local(m.role), m.content.as_str()))
            .collect();
        prop_assert_eq!(mapped, expected);
        prop_assert_eq!(next.thread, ThreadRef::Existing(detail.summary.thread_id.clone()));
    }

    // Invariant 7: Events for an abandoned turn never touch the conversation
    #[test]
    fn prop_stale_deltas_are_dropped(
        actions in proptest::collection::vec(arb_action(), 0..20),
        text in "[a-z]{1,5}",
    ) {
        let mut driver = Driver::new(ProtocolMode::Stream);
        for action in actions {
            driver.step(action);
        }
        let before = driver.state.clone();

        if let Some(Ok(effects)) = driver.step(Action::StaleDelta(text)) {
            prop_assert!(effects.is_empty());
            prop_assert_eq!(driver.state, before);
        }
    }
}
