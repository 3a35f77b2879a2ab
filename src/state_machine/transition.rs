//! Pure state transition function

use super::{Effect, Event, SessionContext, SessionState};
use crate::context::Exchange;
use crate::error::TurnError;
use crate::interpreter::interpret;
use crate::message::Message;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events the current state does not accept. None of these change anything.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Dispatcher is still answering the previous message")]
    Busy,
    #[error("No request in flight")]
    NothingToCancel,
    #[error("Reply for turn {0} is no longer awaited")]
    StaleReply(u64),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User turns
        // ============================================================
        (_, Event::UserTurn { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyInput)
        }

        (SessionState::AwaitingResponse { .. }, Event::UserTurn { .. }) => {
            Err(TransitionError::Busy)
        }

        // Idle or Error: an earlier failure never blocks a resend
        (SessionState::Idle | SessionState::Error { .. }, Event::UserTurn { text, at }) => {
            let utterance = text.trim().to_string();
            let turn = context.next_message_id;
            Ok(TransitionResult::new(SessionState::AwaitingResponse {
                turn,
                utterance: utterance.clone(),
            })
            .with_effect(Effect::AppendMessage(Message::user(turn, utterance.clone(), at)))
            .with_effect(Effect::NotifyStateChange)
            .with_effect(Effect::RequestReply { turn, utterance }))
        }

        // ============================================================
        // Backend outcomes
        // ============================================================
        (
            SessionState::AwaitingResponse { turn, utterance },
            Event::BackendReplied {
                turn: replied,
                raw,
                received_at,
            },
        ) if *turn == replied => match interpret(&raw, received_at) {
            Ok(interpreted) => {
                let response = interpreted.response().to_string();
                Ok(TransitionResult::new(SessionState::Idle)
                    .with_effect(Effect::AppendMessage(Message::reply(
                        context.next_message_id,
                        response.clone(),
                        interpreted.timestamp,
                        interpreted.timestamp_source,
                    )))
                    .with_effect(Effect::ExtendContext(Exchange::new(
                        utterance.clone(),
                        response,
                    )))
                    .with_effect(Effect::publish_report(interpreted.report))
                    .with_effect(Effect::NotifyStateChange))
            }
            Err(e) => Ok(fail(TurnError::from(e))),
        },

        (
            SessionState::AwaitingResponse { turn, .. },
            Event::BackendFailed {
                turn: failed,
                error,
            },
        ) if *turn == failed => Ok(fail(TurnError::from(error))),

        (
            SessionState::AwaitingResponse { turn, .. },
            Event::DeadlineElapsed {
                turn: expired,
                after,
            },
        ) if *turn == expired => {
            let result = fail(TurnError::TimedOut(after));
            Ok(TransitionResult {
                new_state: result.new_state,
                effects: std::iter::once(Effect::AbortRequest)
                    .chain(result.effects)
                    .collect(),
            })
        }

        // Replies for turns that were cancelled or timed out
        (
            _,
            Event::BackendReplied { turn, .. }
            | Event::BackendFailed { turn, .. }
            | Event::DeadlineElapsed { turn, .. },
        ) => Err(TransitionError::StaleReply(turn)),

        // ============================================================
        // Cancellation
        // ============================================================
        (SessionState::AwaitingResponse { .. }, Event::CancelRequested) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::AbortRequest)
                .with_effect(Effect::NotifyStateChange))
        }

        (SessionState::Idle | SessionState::Error { .. }, Event::CancelRequested) => {
            Err(TransitionError::NothingToCancel)
        }
    }
}

/// Failed turn: user message stays, context untouched
fn fail(error: TurnError) -> TransitionResult {
    let kind = error.kind();
    TransitionResult::new(SessionState::Error {
        kind,
        message: kind.user_message().to_string(),
    })
    .with_effect(Effect::ReportFailure(error))
    .with_effect(Effect::NotifyStateChange)
}
