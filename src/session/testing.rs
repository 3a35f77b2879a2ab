//! Mock implementations and runtime tests
//!
//! These mocks drive a real session task without network access.

use super::*;
use crate::interpreter::TimestampSource;
use crate::llm::{LlmError, LlmRequest, LlmResponse, SegmentRole};
use crate::report::{DispatchAction, Urgency};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock backend that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue raw model text
    pub fn queue_text(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::text(text)));
    }

    /// Queue a reply whose fenced report carries only `response`
    pub fn queue_reply(&self, response: &str) {
        self.queue_text(&fenced(&serde_json::json!({ "response": response })));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

/// Backend that never answers
pub struct HangingLlmClient;

#[async_trait]
impl LlmService for HangingLlmClient {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        std::future::pending().await
    }

    fn model_id(&self) -> &str {
        "hanging"
    }
}

// ============================================================================
// Mock Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<(Vec<DispatchAction>, Option<Urgency>)>>,
}

impl RecordingNotifier {
    pub fn recorded(&self) -> Vec<(Vec<DispatchAction>, Option<Urgency>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorityNotifier for RecordingNotifier {
    async fn notify(&self, _session_id: &str, actions: &[DispatchAction], severity: Option<Urgency>) {
        self.calls.lock().unwrap().push((actions.to_vec(), severity));
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn fenced(report: &serde_json::Value) -> String {
    format!("Understood.\n```json\n{report}\n```")
}

fn start(llm: Arc<dyn LlmService>) -> SessionHandle {
    start_with(llm, Arc::new(LogOnlyNotifier), SessionSettings::default())
}

fn start_with(
    llm: Arc<dyn LlmService>,
    notifier: Arc<dyn AuthorityNotifier>,
    settings: SessionSettings,
) -> SessionHandle {
    SessionFactory::new(settings, llm, notifier).spawn()
}

/// Wait until the session has settled out of `AwaitingResponse`
async fn settled(handle: &SessionHandle) -> SessionSnapshot {
    let mut rx = handle.watch();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| !s.state.is_awaiting()),
    )
    .await
    .expect("session did not settle")
    .expect("session closed")
    .clone();
    snapshot
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_session_starts_with_greeting() {
    let handle = start(Arc::new(MockLlmClient::new()));
    let snapshot = handle.snapshot();

    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].id, 1);
    assert_eq!(snapshot.messages[0].text, crate::message::GREETING);
    assert!(snapshot.latest_report.is_none());
}

#[tokio::test]
async fn test_successful_turns_grow_log_by_two() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_reply("Fire department dispatched.");
    llm.queue_reply("On the way.");
    let handle = start(llm.clone());

    assert_eq!(
        handle.submit_turn("fire at my house").await.unwrap(),
        SubmitOutcome::Accepted
    );
    let snapshot = settled(&handle).await;
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.messages.len(), 3);

    assert_eq!(
        handle.submit_turn("send water").await.unwrap(),
        SubmitOutcome::Accepted
    );
    let snapshot = settled(&handle).await;
    assert_eq!(snapshot.messages.len(), 5);
    assert_eq!(snapshot.context_exchanges, 2);

    let ids: Vec<u64> = snapshot.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(snapshot.messages[4].text, "On the way.");
    assert_eq!(
        snapshot.latest_report.as_ref().map(|r| r.response.as_str()),
        Some("On the way.")
    );

    // The second request carries the first exchange as context
    let requests = llm.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].segment(SegmentRole::Context), Some(""));
    assert_eq!(
        requests[1].segment(SegmentRole::Context),
        Some("\nUser: fire at my house\nDispatcher: Fire department dispatched.")
    );
    assert_eq!(requests[1].segment(SegmentRole::UserTurn), Some("send water"));
}

#[tokio::test]
async fn test_default_settings_keep_whole_context() {
    let llm = Arc::new(MockLlmClient::new());
    let turns = 22;
    for i in 0..turns {
        llm.queue_reply(&format!("reply {i}"));
    }
    let handle = start(llm.clone());

    for i in 0..turns {
        assert_eq!(
            handle.submit_turn(format!("turn {i}")).await.unwrap(),
            SubmitOutcome::Accepted
        );
        settled(&handle).await;
    }

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.context_exchanges, turns);

    let requests = llm.recorded_requests();
    assert_eq!(requests.len(), turns);
    let last_context = requests[turns - 1]
        .segment(SegmentRole::Context)
        .unwrap();
    assert!(last_context.starts_with("\nUser: turn 0\nDispatcher: reply 0"));
    assert!(last_context.ends_with("\nUser: turn 20\nDispatcher: reply 20"));
}

#[tokio::test]
async fn test_dispatcher_message_records_timestamp_source() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_text(&fenced(&serde_json::json!({
        "response": "Units en route.",
        "timestamp": "2026-03-01T12:30:00Z",
    })));
    llm.queue_text(&fenced(&serde_json::json!({
        "response": "Stay on the line.",
        "timestamp": "yesterday",
    })));
    let handle = start(llm);

    handle.submit_turn("car crash").await.unwrap();
    settled(&handle).await;
    handle.submit_turn("two people hurt").await.unwrap();
    let snapshot = settled(&handle).await;

    let first = &snapshot.messages[2];
    assert_eq!(first.timestamp_source, Some(TimestampSource::Report));
    assert_eq!(first.timestamp.to_rfc3339(), "2026-03-01T12:30:00+00:00");

    assert_eq!(snapshot.messages[4].timestamp_source, Some(TimestampSource::Receipt));
    // User messages and the greeting carry no marker
    assert_eq!(snapshot.messages[0].timestamp_source, None);
    assert_eq!(snapshot.messages[3].timestamp_source, None);
}

#[tokio::test]
async fn test_empty_submission_is_ignored() {
    let llm = Arc::new(MockLlmClient::new());
    let handle = start(llm.clone());

    for text in ["", "   ", "\n"] {
        assert_eq!(
            handle.submit_turn(text).await.unwrap(),
            SubmitOutcome::IgnoredEmpty
        );
    }

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(llm.recorded_requests().is_empty());
}

#[tokio::test]
async fn test_second_submission_while_awaiting_is_busy() {
    let handle = start(Arc::new(HangingLlmClient));

    assert_eq!(
        handle.submit_turn("help").await.unwrap(),
        SubmitOutcome::Accepted
    );
    assert!(handle.snapshot().state.is_awaiting());

    assert_eq!(
        handle.submit_turn("hello?").await.unwrap(),
        SubmitOutcome::Busy
    );
    assert_eq!(handle.snapshot().messages.len(), 2);
}

#[tokio::test]
async fn test_malformed_reply_keeps_user_message_and_context() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_text("I understand, stay calm.");
    llm.queue_reply("Help is coming.");
    let handle = start(llm.clone());

    handle.submit_turn("help").await.unwrap();
    let snapshot = settled(&handle).await;

    let SessionState::Error { kind, message } = &snapshot.state else {
        panic!("expected error state, got {:?}", snapshot.state);
    };
    assert_eq!(*kind, TurnErrorKind::MalformedResponse);
    assert!(!message.contains("stay calm"));
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[1].text, "help");
    assert_eq!(snapshot.context_exchanges, 0);

    // Error is recoverable; the failed exchange never reaches the context
    handle.submit_turn("help please").await.unwrap();
    let snapshot = settled(&handle).await;
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.messages.len(), 4);
    assert_eq!(
        llm.recorded_requests()[1].segment(SegmentRole::Context),
        Some("")
    );
}

#[tokio::test]
async fn test_backend_failure_goes_to_error() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_error(LlmError::rate_limit("quota exhausted"));
    let handle = start(llm);

    handle.submit_turn("help").await.unwrap();
    let snapshot = settled(&handle).await;

    assert!(matches!(
        snapshot.state,
        SessionState::Error {
            kind: TurnErrorKind::TransportFailure,
            ..
        }
    ));
    assert_eq!(snapshot.messages.len(), 2);
}

#[tokio::test]
async fn test_cancel_returns_to_idle() {
    let handle = start(Arc::new(HangingLlmClient));

    handle.submit_turn("help").await.unwrap();
    assert!(handle.cancel().await.unwrap());

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.context_exchanges, 0);

    // Nothing left to cancel
    assert!(!handle.cancel().await.unwrap());
}

#[tokio::test]
async fn test_deadline_goes_to_timed_out() {
    let settings = SessionSettings {
        request_timeout: Duration::from_millis(50),
        ..SessionSettings::default()
    };
    let handle = start_with(Arc::new(HangingLlmClient), Arc::new(LogOnlyNotifier), settings);

    handle.submit_turn("help").await.unwrap();
    let snapshot = settled(&handle).await;

    assert!(matches!(
        snapshot.state,
        SessionState::Error {
            kind: TurnErrorKind::TimedOut,
            ..
        }
    ));
    assert_eq!(snapshot.messages.len(), 2);
}

#[tokio::test]
async fn test_latest_report_survives_failure() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_reply("Help is coming.");
    llm.queue_text("```json\n{not valid}\n```");
    let handle = start(llm);

    handle.submit_turn("help").await.unwrap();
    settled(&handle).await;
    handle.submit_turn("hurry").await.unwrap();
    let snapshot = settled(&handle).await;

    assert!(matches!(
        snapshot.state,
        SessionState::Error {
            kind: TurnErrorKind::InvalidJson,
            ..
        }
    ));
    assert_eq!(
        snapshot.latest_report.map(|r| r.response),
        Some("Help is coming.".to_string())
    );
}

#[tokio::test]
async fn test_notifier_receives_each_action_once() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_text(&fenced(&serde_json::json!({
        "response": "Fire department dispatched.",
        "emergency": { "type": "fire", "severity": "high" },
        "actions_to_be_taken": [{ "action": "alert_Fire_Department", "priority": "high" }]
    })));
    llm.queue_text(&fenced(&serde_json::json!({
        "response": "Police are on the way too.",
        "emergency": { "type": "fire", "severity": "critical" },
        "actions_to_be_taken": [
            { "action": "alert_Fire_Department", "priority": "high" },
            { "action": "alert_Police", "priority": "medium" }
        ]
    })));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = start_with(llm, notifier.clone(), SessionSettings::default());

    handle.submit_turn("my kitchen is on fire").await.unwrap();
    settled(&handle).await;
    handle.submit_turn("someone broke in too").await.unwrap();
    settled(&handle).await;

    // Notifications run on their own task
    let mut recorded = notifier.recorded();
    for _ in 0..100 {
        if recorded.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        recorded = notifier.recorded();
    }

    assert_eq!(
        recorded,
        vec![
            (vec![DispatchAction::Fire], Some(Urgency::High)),
            (vec![DispatchAction::Police], Some(Urgency::Critical)),
        ]
    );
}

#[tokio::test]
async fn test_subscribers_see_turn_events_in_order() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_reply("Help is coming.");
    let handle = start(llm);
    let mut events = handle.subscribe();

    handle.submit_turn("help").await.unwrap();

    let mut received = Vec::new();
    while received.len() < 5 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed");
        received.push(event);
    }

    assert!(matches!(&received[0], SessionEvent::Message(m) if m.text == "help"));
    assert!(matches!(&received[1], SessionEvent::StateChange(s) if s.is_awaiting()));
    assert!(matches!(&received[2], SessionEvent::Message(m) if m.text == "Help is coming."));
    assert!(matches!(&received[3], SessionEvent::Report(r) if r.response == "Help is coming."));
    assert!(matches!(&received[4], SessionEvent::StateChange(SessionState::Idle)));
}

#[tokio::test]
async fn test_factory_sessions_are_independent() {
    let llm = Arc::new(MockLlmClient::new());
    llm.queue_reply("Help is coming.");
    let factory = SessionFactory::new(
        SessionSettings::default(),
        llm,
        Arc::new(LogOnlyNotifier),
    );

    let first = factory.spawn();
    first.submit_turn("help").await.unwrap();
    settled(&first).await;

    let second = factory.spawn();
    assert_ne!(first.id(), second.id());
    assert_eq!(first.snapshot().messages.len(), 3);
    assert_eq!(second.snapshot().messages.len(), 1);
}
