//! API request and response types

use crate::session::SubmitOutcome;
use serde::{Deserialize, Serialize};

/// Request to submit caller text
#[derive(Debug, Deserialize)]
pub struct SubmitTurnRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitTurnResponse {
    pub outcome: SubmitOutcome,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
    /// Whether a backend call was actually abandoned
    pub cancelled: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
