//! Structured dispatch report
//!
//! The JSON envelope the dispatcher model is asked to emit on every turn.
//! Only `response` is required. Everything else is parsed best-effort: a field
//! with an unexpected shape is dropped and logged, it never fails the turn.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parsed report. Absent means the model did not know or sent something unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub call_id: Option<String>,
    /// Raw timestamp as sent; see [`crate::interpreter`] for resolution
    pub timestamp: Option<String>,
    pub victim: Option<Victim>,
    pub caller: Option<Caller>,
    pub location: Option<Location>,
    pub emergency: Option<Emergency>,
    pub actions_to_be_taken: Vec<ActionRequest>,
    pub instructions_given: Vec<String>,
    /// Text shown to the caller
    pub response: String,
    pub status: Option<String>,
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Victim {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Emergency {
    #[serde(rename = "type", default, deserialize_with = "non_empty_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_urgency")]
    pub severity: Option<Urgency>,
}

/// One requested dispatch. Never executed by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionRequest {
    pub action: DispatchAction,
    pub priority: Option<Urgency>,
}

/// Ordered scale shared by emergency severity and action priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for Urgency {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}

/// Authorities the dispatcher may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    Ems,
    Fire,
    Police,
    SearchRescue,
    Disaster,
    Lifeguards,
    Hazmat,
}

impl DispatchAction {
    pub const ALL: [DispatchAction; 7] = [
        Self::Ems,
        Self::Fire,
        Self::Police,
        Self::SearchRescue,
        Self::Disaster,
        Self::Lifeguards,
        Self::Hazmat,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ems => "EMS",
            Self::Fire => "Fire Department",
            Self::Police => "Police",
            Self::SearchRescue => "Search & Rescue",
            Self::Disaster => "Disaster Response",
            Self::Lifeguards => "Lifeguards",
            Self::Hazmat => "Hazmat Teams",
        }
    }

    /// Name declared to the model in the prompt contract
    pub fn function_name(self) -> &'static str {
        match self {
            Self::Ems => "alert_EMS",
            Self::Fire => "alert_Fire_Department",
            Self::Police => "alert_Police",
            Self::SearchRescue => "alert_Search_Rescue",
            Self::Disaster => "alert_Disaster_Response",
            Self::Lifeguards => "alert_Lifeguards",
            Self::Hazmat => "alert_Hazmat",
        }
    }
}

impl fmt::Display for DispatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for DispatchAction {
    type Err = UnknownValue;

    /// Accepts display names and `alert_*` function names, with or without `()`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let stripped = trimmed.strip_suffix("()").unwrap_or(trimmed);
        let stripped = stripped.strip_prefix("alert_").unwrap_or(stripped);
        let key: String = stripped
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match key.as_str() {
            "ems" | "ambulance" => Ok(Self::Ems),
            "fire" | "firedepartment" => Ok(Self::Fire),
            "police" => Ok(Self::Police),
            "searchrescue" | "searchandrescue" => Ok(Self::SearchRescue),
            "disaster" | "disasterresponse" => Ok(Self::Disaster),
            "lifeguard" | "lifeguards" => Ok(Self::Lifeguards),
            "hazmat" | "hazmatteam" | "hazmatteams" => Ok(Self::Hazmat),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value: {0}")]
pub struct UnknownValue(pub String);

/// Why a parsed JSON value is not an acceptable report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("report is not a JSON object")]
    NotAnObject,
    #[error("report has no `response` string")]
    MissingResponse,
    #[error("report `response` is empty")]
    EmptyResponse,
}

impl DispatchReport {
    /// Validate a parsed value. Fails only when `response` is unusable.
    pub fn from_value(value: Value) -> Result<Self, SchemaViolation> {
        let Value::Object(obj) = value else {
            return Err(SchemaViolation::NotAnObject);
        };

        let response = match obj.get("response") {
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(SchemaViolation::EmptyResponse)
            }
            Some(Value::String(s)) => s.trim().to_string(),
            _ => return Err(SchemaViolation::MissingResponse),
        };

        Ok(Self {
            call_id: text_field(&obj, "call_id"),
            timestamp: text_field(&obj, "timestamp"),
            victim: typed_field(&obj, "victim"),
            caller: typed_field(&obj, "caller"),
            location: typed_field(&obj, "location"),
            emergency: typed_field(&obj, "emergency"),
            actions_to_be_taken: actions_field(&obj),
            instructions_given: instructions_field(&obj),
            response,
            status: text_field(&obj, "status"),
            operator: text_field(&obj, "operator"),
        })
    }

    pub fn severity(&self) -> Option<Urgency> {
        self.emergency.as_ref().and_then(|e| e.severity)
    }

    /// Distinct requested authorities, in first-requested order
    pub fn requested_actions(&self) -> Vec<DispatchAction> {
        let mut actions: Vec<DispatchAction> = Vec::new();
        for request in &self.actions_to_be_taken {
            if !actions.contains(&request.action) {
                actions.push(request.action);
            }
        }
        actions
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => {
            tracing::warn!(field = key, value = %other, "Dropping non-text report field");
            None
        }
    }
}

fn typed_field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(field = key, error = %e, "Dropping malformed report field");
            None
        }
    }
}

fn actions_field(obj: &Map<String, Value>) -> Vec<ActionRequest> {
    let Some(Value::Array(entries)) = obj.get("actions_to_be_taken") else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let (name, priority) = match entry {
                Value::String(name) => (name.as_str(), None),
                Value::Object(fields) => (
                    fields.get("action").and_then(Value::as_str)?,
                    fields
                        .get("priority")
                        .and_then(Value::as_str)
                        .and_then(|p| p.parse().ok()),
                ),
                _ => return None,
            };
            match name.parse() {
                Ok(action) => Some(ActionRequest { action, priority }),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unknown dispatch action");
                    None
                }
            }
        })
        .collect()
}

fn instructions_field(obj: &Map<String, Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = obj.get("instructions_given") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_age<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_coordinate<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_urgency<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Urgency>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
