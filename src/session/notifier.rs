//! Hand-off point for requested dispatch actions

use crate::report::{DispatchAction, Urgency};
use async_trait::async_trait;

/// Receives authorities the dispatcher newly requested in a session
///
/// Each action reaches the notifier at most once per session, the first time
/// a report lists it.
#[async_trait]
pub trait AuthorityNotifier: Send + Sync {
    async fn notify(&self, session_id: &str, actions: &[DispatchAction], severity: Option<Urgency>);
}

/// Logs requested actions and contacts nobody
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl AuthorityNotifier for LogOnlyNotifier {
    async fn notify(&self, session_id: &str, actions: &[DispatchAction], severity: Option<Urgency>) {
        for action in actions {
            tracing::info!(
                session_id,
                action = action.function_name(),
                authority = action.display_name(),
                severity = ?severity,
                "Dispatch action requested"
            );
        }
    }
}
