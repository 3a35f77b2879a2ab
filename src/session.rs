//! Runtime for a dispatcher session
//!
//! A session runs as one task that owns the transcript and the context. Callers
//! talk to it through a cloneable [`SessionHandle`].

mod executor;
pub mod notifier;

#[cfg(test)]
mod testing;

pub use executor::SessionRuntime;
pub use notifier::{AuthorityNotifier, LogOnlyNotifier};

use crate::context::PolicySetting;
use crate::error::TurnErrorKind;
use crate::llm::{GenerationConfig, LlmService};
use crate::message::Message;
use crate::report::DispatchReport;
use crate::state_machine::SessionState;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Per-session knobs, fixed for the session's lifetime
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub generation: GenerationConfig,
    pub context_policy: PolicySetting,
    pub request_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            context_policy: PolicySetting::default(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// What happened to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted,
    IgnoredEmpty,
    Busy,
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub messages: Vec<Message>,
    pub latest_report: Option<DispatchReport>,
    pub context_exchanges: usize,
}

/// Change notifications for subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Message(Message),
    StateChange(SessionState),
    Report(Box<DispatchReport>),
    Error { kind: TurnErrorKind, message: String },
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Submit {
        text: String,
        ack: oneshot::Sender<SubmitOutcome>,
    },
    Cancel {
        ack: oneshot::Sender<bool>,
    },
}

#[derive(Debug, Clone, Copy, Error)]
#[error("session runtime has stopped")]
pub struct SessionClosed;

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Submit caller text. Resolves once the turn has started, not when the
    /// dispatcher has answered.
    pub async fn submit_turn(&self, text: impl Into<String>) -> Result<SubmitOutcome, SessionClosed> {
        let (ack, rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Submit {
                text: text.into(),
                ack,
            })
            .await
            .map_err(|_| SessionClosed)?;
        rx.await.map_err(|_| SessionClosed)
    }

    /// Abandon the outstanding backend call. Returns whether one was in flight.
    pub async fn cancel(&self) -> Result<bool, SessionClosed> {
        let (ack, rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Cancel { ack })
            .await
            .map_err(|_| SessionClosed)?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Snapshot receiver that wakes on every change
    #[cfg(test)]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Builds fresh sessions sharing one backend and notifier
#[derive(Clone)]
pub struct SessionFactory {
    settings: SessionSettings,
    llm: Arc<dyn LlmService>,
    notifier: Arc<dyn AuthorityNotifier>,
}

impl SessionFactory {
    pub fn new(
        settings: SessionSettings,
        llm: Arc<dyn LlmService>,
        notifier: Arc<dyn AuthorityNotifier>,
    ) -> Self {
        Self {
            settings,
            llm,
            notifier,
        }
    }

    /// Start a new session task. It stops when the last handle is dropped.
    pub fn spawn(&self) -> SessionHandle {
        spawn_session(&self.settings, self.llm.clone(), self.notifier.clone())
    }
}

pub fn spawn_session(
    settings: &SessionSettings,
    llm: Arc<dyn LlmService>,
    notifier: Arc<dyn AuthorityNotifier>,
) -> SessionHandle {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (command_tx, command_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);

    let runtime = SessionRuntime::new(
        session_id.clone(),
        settings,
        llm,
        notifier,
        command_rx,
        broadcast_tx.clone(),
    );
    let snapshot_rx = runtime.snapshot_receiver();

    tokio::spawn(runtime.run());

    SessionHandle {
        session_id,
        command_tx,
        snapshot_rx,
        broadcast_tx,
    }
}
