//! Turn failure taxonomy
//!
//! Every way a submitted turn can fail. The session treats all of them the
//! same way; the kind only picks the message shown to the caller and the log
//! fields.

use crate::interpreter::InterpretError;
use crate::llm::LlmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("backend call failed: {0}")]
    Transport(#[from] LlmError),
    #[error(transparent)]
    Interpret(#[from] InterpretError),
    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

impl TurnError {
    pub fn kind(&self) -> TurnErrorKind {
        match self {
            Self::Transport(_) => TurnErrorKind::TransportFailure,
            Self::Interpret(InterpretError::MalformedResponse { .. }) => {
                TurnErrorKind::MalformedResponse
            }
            Self::Interpret(InterpretError::InvalidJson { .. }) => TurnErrorKind::InvalidJson,
            Self::Interpret(InterpretError::SchemaViolation { .. }) => {
                TurnErrorKind::SchemaViolation
            }
            Self::TimedOut(_) => TurnErrorKind::TimedOut,
        }
    }

    /// Raw backend text, if the failure happened after a reply arrived
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Interpret(e) => Some(e.raw()),
            Self::Transport(_) | Self::TimedOut(_) => None,
        }
    }
}

/// Failure classification exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnErrorKind {
    TransportFailure,
    MalformedResponse,
    InvalidJson,
    SchemaViolation,
    TimedOut,
}

impl TurnErrorKind {
    /// Caller-facing text. Never includes backend output.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::TransportFailure | Self::TimedOut => {
                "The dispatcher could not be reached. Please send your message again. If you are in immediate danger, call 911 directly."
            }
            Self::MalformedResponse | Self::InvalidJson | Self::SchemaViolation => {
                "The dispatcher reply could not be read. Please send your message again. If you are in immediate danger, call 911 directly."
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransportFailure => "transport_failure",
            Self::MalformedResponse => "malformed_response",
            Self::InvalidJson => "invalid_json",
            Self::SchemaViolation => "schema_violation",
            Self::TimedOut => "timed_out",
        }
    }
}
