//! Effects produced by state transitions

use crate::context::Exchange;
use crate::error::TurnError;
use crate::message::Message;
use crate::report::DispatchReport;

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append to the transcript. The id is already assigned.
    AppendMessage(Message),

    /// Record a completed exchange in the running context
    ExtendContext(Exchange),

    /// Start the backend call for this turn
    RequestReply { turn: u64, utterance: String },

    /// Abandon the in-flight backend call
    AbortRequest,

    /// Store the latest report and forward newly requested actions
    PublishReport(Box<DispatchReport>),

    /// Log the failure with diagnostics and tell clients
    ReportFailure(TurnError),

    /// Notify connected clients of the new state
    NotifyStateChange,
}

impl Effect {
    pub fn publish_report(report: DispatchReport) -> Self {
        Effect::PublishReport(Box::new(report))
    }
}
