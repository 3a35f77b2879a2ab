//! Dispatcher prompt construction
//!
//! Every request carries three segments in fixed order: the dispatcher
//! contract, the rendered conversation context, and the caller's new message.

use crate::llm::{GenerationConfig, LlmRequest, PromptSegment, SegmentRole};
use crate::report::DispatchAction;
use std::fmt::Write;

/// Persona and duties
const PERSONA: &str = "You are Joe, a highly trained 911 emergency operator AI. Your role is to swiftly handle emergency calls, dispatch the right responders, and provide life-saving instructions. Tell the user your current actions taken.";

/// Example envelope shown to the model. Field names here are what the report parser reads.
const REPORT_EXAMPLE: &str = r#"{
  "call_id": "A123456",
  "timestamp": "2025-02-26T14:35:00Z",
  "victim": {
    "name": "Jane Doe",
    "age": 34,
    "condition": "Unconscious, not breathing"
  },
  "caller": {
    "name": "John Doe",
    "phone_number": "+1-555-1234",
    "relationship": "Husband"
  },
  "location": {
    "address": "123 Main St, Springfield, IL",
    "latitude": 39.7817,
    "longitude": -89.6501
  },
  "emergency": {
    "type": "medical",
    "description": "Unconscious person, not breathing",
    "severity": "critical"
  },
  "actions_to_be_taken": [
    { "action": "alert_EMS", "priority": "high" }
  ],
  "instructions_given": [
    "checked_breathing",
    "done_cpr"
  ],
  "response": "EMS dispatched. Continue CPR until help arrives.",
  "status": "Active - EMS en route",
  "operator": "Joe"
}"#;

const REQUIREMENTS: &str = r"Key Requirements:
- Write your reply to the caller in the `response` field.
- Request the appropriate authorities in `actions_to_be_taken` using the function names above.
- Log every instruction already given in `instructions_given` and do not repeat them.
- Leave unknown fields out instead of guessing or sending empty strings.
- `severity` and `priority` are one of: low, medium, high, critical.
- Return the report as a single fenced ```json code block.";

/// Builds backend requests for one session
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    contract: String,
    generation: GenerationConfig,
}

impl PromptAssembler {
    pub fn new(generation: GenerationConfig) -> Self {
        Self {
            contract: system_contract(),
            generation,
        }
    }

    /// `utterance` must already be trimmed and non-empty; the session guarantees this.
    pub fn assemble(&self, context: &str, utterance: &str) -> LlmRequest {
        debug_assert!(!utterance.trim().is_empty(), "empty utterance reached the assembler");
        LlmRequest {
            segments: vec![
                PromptSegment::new(SegmentRole::SystemContract, self.contract.clone()),
                PromptSegment::new(SegmentRole::Context, context),
                PromptSegment::new(SegmentRole::UserTurn, utterance),
            ],
            generation: self.generation,
        }
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(GenerationConfig::default())
    }
}

/// The fixed dispatcher contract
pub fn system_contract() -> String {
    let mut contract = String::from(PERSONA);
    contract.push_str("\nAuthorities Joe Can Notify (System Functions):\n");
    for action in DispatchAction::ALL {
        let _ = writeln!(
            contract,
            "{} \u{2192} {}()",
            action.display_name(),
            action.function_name()
        );
    }
    contract.push_str("JSON Response Format:\n");
    contract.push_str(REPORT_EXAMPLE);
    contract.push_str("\n\n");
    contract.push_str(REQUIREMENTS);
    contract
}
