//! Session runtime executor

use super::{AuthorityNotifier, SessionCommand, SessionEvent, SessionSettings, SessionSnapshot, SubmitOutcome};
use crate::context::ConversationContext;
use crate::llm::{LlmService, SegmentRole};
use crate::message::Message;
use crate::prompt::PromptAssembler;
use crate::report::{DispatchAction, DispatchReport};
use crate::state_machine::{transition, Effect, Event, SessionContext, SessionState, TransitionError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Owns one session's transcript and context and executes its effects
pub struct SessionRuntime {
    context: SessionContext,
    state: SessionState,
    transcript: Vec<Message>,
    conversation: ConversationContext,
    assembler: PromptAssembler,
    request_timeout: Duration,
    latest_report: Option<DispatchReport>,
    /// Actions already handed to the notifier in this session
    notified: HashSet<DispatchAction>,
    llm: Arc<dyn LlmService>,
    notifier: Arc<dyn AuthorityNotifier>,
    command_rx: mpsc::Receiver<SessionCommand>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Token to cancel the running backend request
    llm_cancel_token: Option<CancellationToken>,
}

impl SessionRuntime {
    pub(crate) fn new(
        session_id: String,
        settings: &SessionSettings,
        llm: Arc<dyn LlmService>,
        notifier: Arc<dyn AuthorityNotifier>,
        command_rx: mpsc::Receiver<SessionCommand>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        let context = SessionContext::new(session_id);
        let transcript = vec![Message::greeting(Utc::now())];
        let conversation = ConversationContext::new(settings.context_policy.build());
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            session_id: context.session_id.clone(),
            state: SessionState::Idle,
            messages: transcript.clone(),
            latest_report: None,
            context_exchanges: 0,
        });

        Self {
            context,
            state: SessionState::Idle,
            transcript,
            conversation,
            assembler: PromptAssembler::new(settings.generation),
            request_timeout: settings.request_timeout,
            latest_report: None,
            notified: HashSet::new(),
            llm,
            notifier,
            command_rx,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            llm_cancel_token: None,
        }
    }

    pub(crate) fn snapshot_receiver(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                }
                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event) {
                        tracing::debug!(error = %e, "Discarding backend event");
                    }
                }
            }
        }

        if let Some(token) = self.llm_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit { text, ack } => {
                let outcome = match self.process_event(Event::user_turn(text, Utc::now())) {
                    Ok(()) => SubmitOutcome::Accepted,
                    Err(TransitionError::EmptyInput) => SubmitOutcome::IgnoredEmpty,
                    Err(e) => {
                        tracing::debug!(error = %e, "Submission rejected");
                        SubmitOutcome::Busy
                    }
                };
                let _ = ack.send(outcome);
            }
            SessionCommand::Cancel { ack } => {
                let cancelled = self.process_event(Event::CancelRequested).is_ok();
                let _ = ack.send(cancelled);
            }
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Pure state transition
        let result = transition(&self.state, &self.context, event)?;

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.name() != self.state.name() {
            tracing::debug!(from = old_state.name(), to = self.state.name(), "Session state changed");
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        self.snapshot_tx.send_replace(self.snapshot());
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.context.session_id.clone(),
            state: self.state.clone(),
            messages: self.transcript.clone(),
            latest_report: self.latest_report.clone(),
            context_exchanges: self.conversation.len(),
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage(message) => {
                self.context.next_message_id = message.id + 1;
                self.transcript.push(message.clone());
                let _ = self.broadcast_tx.send(SessionEvent::Message(message));
            }

            Effect::ExtendContext(exchange) => {
                self.conversation.push(exchange);
            }

            Effect::RequestReply { turn, utterance } => {
                let request = self
                    .assembler
                    .assemble(&self.conversation.render(), &utterance);

                let cancel_token = CancellationToken::new();
                self.llm_cancel_token = Some(cancel_token.clone());

                let llm = self.llm.clone();
                let event_tx = self.event_tx.clone();
                let deadline = self.request_timeout;
                let session_id = self.context.session_id.clone();

                tokio::spawn(async move {
                    tracing::info!(
                        %session_id,
                        turn,
                        context_bytes = request.segment(SegmentRole::Context).map_or(0, str::len),
                        "Requesting dispatcher reply (background)"
                    );

                    // Race the backend call against cancellation
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::info!(%session_id, turn, "Backend request cancelled");
                        }

                        result = tokio::time::timeout(deadline, llm.complete(&request)) => {
                            let event = match result {
                                Ok(Ok(response)) => Event::BackendReplied {
                                    turn,
                                    raw: response.text,
                                    received_at: Utc::now(),
                                },
                                Ok(Err(error)) => Event::BackendFailed { turn, error },
                                Err(_) => Event::DeadlineElapsed { turn, after: deadline },
                            };
                            let _ = event_tx.send(event).await;
                        }
                    }
                });
            }

            Effect::AbortRequest => {
                tracing::info!(session_id = %self.context.session_id, "Aborting backend request");
                if let Some(token) = self.llm_cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::PublishReport(report) => {
                let fresh: Vec<DispatchAction> = report
                    .requested_actions()
                    .into_iter()
                    .filter(|action| self.notified.insert(*action))
                    .collect();

                if !fresh.is_empty() {
                    let notifier = self.notifier.clone();
                    let session_id = self.context.session_id.clone();
                    let severity = report.severity();
                    tokio::spawn(async move {
                        notifier.notify(&session_id, &fresh, severity).await;
                    });
                }

                self.latest_report = Some((*report).clone());
                let _ = self.broadcast_tx.send(SessionEvent::Report(report));
            }

            Effect::ReportFailure(error) => {
                let kind = error.kind();
                tracing::warn!(
                    session_id = %self.context.session_id,
                    kind = kind.as_str(),
                    raw_output = error.raw_output(),
                    error = %error,
                    "Dispatcher turn failed"
                );
                let _ = self.broadcast_tx.send(SessionEvent::Error {
                    kind,
                    message: kind.user_message().to_string(),
                });
            }

            Effect::NotifyStateChange => {
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::StateChange(self.state.clone()));
            }
        }
    }
}
