//! Session state types

use crate::error::TurnErrorKind;
use serde::{Deserialize, Serialize};

/// Session state as seen by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for input, no backend call outstanding
    #[default]
    Idle,

    /// One backend call in flight
    AwaitingResponse {
        /// Id of the user message that started this turn
        turn: u64,
        /// The trimmed text that was sent
        utterance: String,
    },

    /// Last turn failed. Still accepts a new submission.
    Error {
        kind: TurnErrorKind,
        /// Safe to show to the caller
        message: String,
    },
}

impl SessionState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, SessionState::AwaitingResponse { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingResponse { .. } => "awaiting_response",
            SessionState::Error { .. } => "error",
        }
    }
}

/// Facts about the session the transition function reads but never changes
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// Id the next appended message will get. Maintained by the runtime.
    pub next_message_id: u64,
}

impl SessionContext {
    /// Context right after the greeting was seeded
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            next_message_id: 2,
        }
    }
}
