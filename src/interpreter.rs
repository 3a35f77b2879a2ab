//! Backend output interpretation
//!
//! The model replies with free text that should contain one fenced
//! ```` ```json ```` block holding a [`DispatchReport`]. Only the first block
//! counts; prose around it is ignored.

use crate::report::{DispatchReport, SchemaViolation};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\b[ \t]*(.*?)```").expect("fence pattern is valid"));

/// A successfully interpreted reply
#[derive(Debug, Clone, PartialEq)]
pub struct InterpretedTurn {
    pub report: DispatchReport,
    pub timestamp: DateTime<Utc>,
    pub timestamp_source: TimestampSource,
}

impl InterpretedTurn {
    pub fn response(&self) -> &str {
        &self.report.response
    }
}

/// Where [`InterpretedTurn::timestamp`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// The report's own `timestamp`
    Report,
    /// Missing or unparseable in the report; local receipt time used instead
    Receipt,
}

/// Why a reply could not be used. All variants keep the raw text for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    #[error("no ```json block in backend output")]
    MalformedResponse { raw: String },
    #[error("fenced block is not valid JSON: {message}")]
    InvalidJson { raw: String, message: String },
    #[error("unacceptable report: {violation}")]
    SchemaViolation {
        raw: String,
        violation: SchemaViolation,
    },
}

impl InterpretError {
    pub fn raw(&self) -> &str {
        match self {
            Self::MalformedResponse { raw }
            | Self::InvalidJson { raw, .. }
            | Self::SchemaViolation { raw, .. } => raw,
        }
    }
}

/// Content of the first ```` ```json ```` block, trimmed
pub fn extract_fenced_json(raw: &str) -> Option<&str> {
    JSON_FENCE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Interpret one backend reply received at `received_at`
pub fn interpret(raw: &str, received_at: DateTime<Utc>) -> Result<InterpretedTurn, InterpretError> {
    let Some(block) = extract_fenced_json(raw) else {
        return Err(InterpretError::MalformedResponse {
            raw: raw.to_string(),
        });
    };

    let value: serde_json::Value =
        serde_json::from_str(block).map_err(|e| InterpretError::InvalidJson {
            raw: raw.to_string(),
            message: e.to_string(),
        })?;

    let report =
        DispatchReport::from_value(value).map_err(|violation| InterpretError::SchemaViolation {
            raw: raw.to_string(),
            violation,
        })?;

    let (timestamp, timestamp_source) = match report.timestamp.as_deref().and_then(parse_timestamp) {
        Some(ts) => (ts, TimestampSource::Report),
        None => {
            if let Some(unparsed) = report.timestamp.as_deref() {
                tracing::debug!(timestamp = unparsed, "Report timestamp unparseable, using receipt time");
            }
            (received_at, TimestampSource::Receipt)
        }
    };

    Ok(InterpretedTurn {
        report,
        timestamp,
        timestamp_source,
    })
}

/// RFC 3339 instants, or naive ISO-8601 date-times taken as UTC
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
