//! Line-oriented console front end
//!
//! Input lines become runtime events; view events are rendered as plain text.
//! Streaming replies are printed incrementally, one suffix per snapshot.

use crate::backend::SessionSummary;
use crate::runtime::ViewEvent;
use crate::state_machine::{ConversationState, Event, MessageId, Role, ThreadRef, TurnPhase};
use std::fmt::Write as _;
use std::io;
use tokio::sync::broadcast;

pub const HELP: &str = "\
Type a message and press enter to send it.
  /new          start a new chat
  /sessions     list past sessions
  /open <id>    continue a past session
  /help         show this help
  /quit         exit";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    NewChat,
    Sessions,
    Open(String),
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse a line; blank lines yield nothing
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Some(Command::Send(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let command = match (parts.next(), parts.next(), parts.next()) {
            (Some("new"), None, _) => Command::NewChat,
            (Some("sessions"), None, _) => Command::Sessions,
            (Some("open"), Some(id), None) => Command::Open(id.to_string()),
            (Some("help"), None, _) => Command::Help,
            (Some("quit" | "exit"), None, _) => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        };
        Some(command)
    }

    /// The runtime event this command asks for, if any
    pub fn into_event(self) -> Option<Event> {
        match self {
            Command::Send(text) => Some(Event::UserSubmit { text }),
            Command::NewChat => Some(Event::NewChat),
            Command::Sessions => Some(Event::RefreshSessions),
            Command::Open(thread_id) => Some(Event::SelectSession { thread_id }),
            Command::Help | Command::Quit | Command::Unknown(_) => None,
        }
    }
}

struct Shown {
    id: MessageId,
    text: String,
    /// Line closed with a newline
    done: bool,
}

/// Turns view events into terminal text
#[derive(Default)]
pub struct Console {
    shown: Vec<Shown>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &ViewEvent) -> String {
        match event {
            ViewEvent::Conversation { state } => self.render_conversation(state),
            ViewEvent::Sessions { sessions } => self.interrupt(&render_sessions(sessions)),
            ViewEvent::DirectoryError { message } => {
                self.interrupt(&format!("! could not load sessions: {message}\n"))
            }
            ViewEvent::Rejected { message } => self.interrupt(&format!("! {message}\n")),
        }
    }

    fn render_conversation(&mut self, state: &ConversationState) -> String {
        let mut out = String::new();

        // Lines already on screen cannot be taken back; anything that no
        // longer matches is left there and the rest is printed afresh
        let keep = self.matching_prefix(state);
        if keep < self.shown.len() {
            self.close_open_line(&mut out);
            self.shown.truncate(keep);
            if keep == 0 {
                match &state.thread {
                    ThreadRef::Existing(id) => {
                        let _ = writeln!(out, "-- session {id} --");
                    }
                    ThreadRef::New => out.push_str("-- new chat --\n"),
                }
            }
        }

        for (index, message) in state.messages.iter().enumerate() {
            let pending = state.pending_assistant_id() == Some(message.id);
            let visible = if pending && !marker_replaced(state) {
                ""
            } else {
                message.text.as_str()
            };

            if let Some(shown) = self.shown.get_mut(index) {
                if let Some(suffix) = visible.strip_prefix(shown.text.as_str()) {
                    out.push_str(suffix);
                }
                shown.text = visible.to_string();
                if !pending && !shown.done {
                    out.push('\n');
                    shown.done = true;
                }
                continue;
            }

            self.close_open_line(&mut out);
            out.push_str(label(message.role));
            out.push_str(visible);
            if !pending {
                out.push('\n');
            }
            self.shown.push(Shown {
                id: message.id,
                text: visible.to_string(),
                done: !pending,
            });
        }

        out
    }

    /// Number of shown messages that `state` still starts with
    fn matching_prefix(&self, state: &ConversationState) -> usize {
        self.shown
            .iter()
            .zip(&state.messages)
            .take_while(|(shown, message)| {
                shown.id == message.id && message.text.starts_with(shown.text.as_str())
            })
            .count()
    }

    fn close_open_line(&mut self, out: &mut String) {
        if let Some(last) = self.shown.last_mut() {
            if !last.done {
                out.push('\n');
                last.done = true;
            }
        }
    }

    /// Out-of-band text; an in-progress reply line is broken first and
    /// resumes on a fresh line
    fn interrupt(&mut self, text: &str) -> String {
        let mut out = String::new();
        if let Some(last) = self.shown.last() {
            if !last.done {
                out.push('\n');
            }
        }
        out.push_str(text);
        if let Some(last) = self.shown.last() {
            if !last.done {
                out.push_str(label(Role::Assistant));
                out.push_str(&last.text);
            }
        }
        out
    }
}

fn marker_replaced(state: &ConversationState) -> bool {
    matches!(state.phase, TurnPhase::AwaitingTurn { started: true, .. })
}

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "you> ",
        Role::Assistant => "homebrain> ",
    }
}

fn render_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No sessions yet\n".to_string();
    }
    let mut out = String::from("Sessions:\n");
    for session in sessions {
        let _ = writeln!(
            out,
            "  {}  {}",
            session.thread_id,
            session.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

/// Render view events to `out` until the runtime goes away
pub async fn run_view<W: io::Write>(
    mut updates: broadcast::Receiver<ViewEvent>,
    mut out: W,
) -> io::Result<()> {
    let mut console = Console::new();
    loop {
        match updates.recv().await {
            Ok(event) => {
                out.write_all(console.render(&event).as_bytes())?;
                out.flush()?;
            }
            // Snapshots are complete, so the next one catches the view up
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Console fell behind on updates");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
