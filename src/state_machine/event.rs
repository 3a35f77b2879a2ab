//! Events that can occur in a session

use crate::llm::LlmError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserTurn {
        text: String,
        at: DateTime<Utc>,
    },
    CancelRequested,

    // Backend events, tagged with the turn they answer
    BackendReplied {
        turn: u64,
        raw: String,
        received_at: DateTime<Utc>,
    },
    BackendFailed {
        turn: u64,
        error: LlmError,
    },
    DeadlineElapsed {
        turn: u64,
        after: Duration,
    },
}

impl Event {
    pub fn user_turn(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Event::UserTurn {
            text: text.into(),
            at,
        }
    }
}
