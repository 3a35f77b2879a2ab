//! Transcript messages

use crate::interpreter::TimestampSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text every session opens with. Not part of the backend context.
pub const GREETING: &str = "This is 911. Please state your emergency.";

/// One entry of the visible transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Set on backend replies: whether `timestamp` came from the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_source: Option<TimestampSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Dispatcher,
}

impl Message {
    pub fn user(id: u64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::User,
            timestamp,
            timestamp_source: None,
        }
    }

    pub fn dispatcher(id: u64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::Dispatcher,
            timestamp,
            timestamp_source: None,
        }
    }

    /// A dispatcher reply whose time was resolved from the backend report
    pub fn reply(
        id: u64,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: TimestampSource,
    ) -> Self {
        Self {
            timestamp_source: Some(source),
            ..Self::dispatcher(id, text, timestamp)
        }
    }

    /// The seed message, always id 1
    pub fn greeting(timestamp: DateTime<Utc>) -> Self {
        Self::dispatcher(1, GREETING, timestamp)
    }
}
