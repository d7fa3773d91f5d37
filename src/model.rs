//! Record variants and structural validation.
//!
//! Validation here is deliberately structural only: field presence, type
//! agreement, and timestamp ordering. Semantic checks such as "does
//! `traceId` refer to a trace that will actually be enqueued" are left to
//! the server, the same way `opentelemetry_sdk::trace::SpanData` carries no
//! knowledge of whether its `TraceId` was ever exported successfully.

use crate::error::LangfuseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Severity of an observation. A single typed enum is exposed at the API
/// boundary; inconsistently-cased string forms never leak out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationLevel {
    Debug,
    Default,
    Warning,
    Error,
}

impl Default for ObservationLevel {
    fn default() -> Self {
        ObservationLevel::Default
    }
}

/// The kind of observation backing a builder, per the RecordModel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Span,
    Generation,
    Event,
}

/// The declared type of a [`ScoreValue`]; the value variant actually present
/// must agree with this, enforced by [`validate_score_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoreDataType {
    Numeric,
    Categorical,
    Boolean,
}

/// A typed score value. Modeled as a tagged variant rather than an untyped
/// JSON value, with [`validate_score_create`] enforcing agreement with
/// [`ScoreDataType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Numeric(f64),
    Categorical(String),
    Boolean(bool),
}

/// Token usage on a generation. All three counters are non-negative by
/// construction (`u64`); `total != input + output` is tolerated when all
/// three are present, treating the server as authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCreate {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceUpdate {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationCreate {
    pub id: String,
    pub trace_id: String,
    #[serde(skip)]
    pub kind: ObservationKind,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_observation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub level: ObservationLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_parameters: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationUpdate {
    pub id: String,
    pub trace_id: String,
    #[serde(skip)]
    pub kind: ObservationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_observation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<ObservationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_parameters: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<String>,
    pub name: String,
    pub value: ScoreValue,
    pub data_type: ScoreDataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
}

fn validation_err(field: &'static str, message: impl Into<String>) -> LangfuseError {
    LangfuseError::Validation {
        field,
        message: message.into(),
    }
}

fn validate_usage(usage: &Usage) -> crate::error::Result<()> {
    // u64 fields can't be negative, so this exists purely to document the
    // invariant and leaves room for a future signed representation.
    let _ = usage;
    Ok(())
}

pub fn validate_trace_create(t: &TraceCreate) -> crate::error::Result<()> {
    if t.id.is_empty() {
        return Err(validation_err("id", "trace id must not be empty"));
    }
    if t.name.is_empty() {
        return Err(validation_err("name", "trace name must not be empty"));
    }
    Ok(())
}

pub fn validate_trace_update(t: &TraceUpdate) -> crate::error::Result<()> {
    if t.id.is_empty() {
        return Err(validation_err("id", "trace id must not be empty"));
    }
    if let Some(end_time) = t.end_time {
        if end_time < t.timestamp {
            return Err(validation_err("endTime", "endTime must be >= timestamp"));
        }
    }
    Ok(())
}

pub fn validate_observation_create(o: &ObservationCreate) -> crate::error::Result<()> {
    if o.id.is_empty() {
        return Err(validation_err("id", "observation id must not be empty"));
    }
    if o.trace_id.is_empty() {
        return Err(validation_err("traceId", "traceId must not be empty"));
    }
    if o.name.is_empty() {
        return Err(validation_err("name", "observation name must not be empty"));
    }
    if let Some(end_time) = o.end_time {
        if end_time < o.start_time {
            return Err(validation_err("endTime", "endTime must be >= startTime"));
        }
    }
    if o.kind == ObservationKind::Generation {
        if let Some(completion_start) = o.completion_start_time {
            if completion_start < o.start_time {
                return Err(validation_err(
                    "completionStartTime",
                    "completionStartTime must be >= startTime",
                ));
            }
            if let Some(end_time) = o.end_time {
                if completion_start > end_time {
                    return Err(validation_err(
                        "completionStartTime",
                        "completionStartTime must be <= endTime",
                    ));
                }
            }
        }
        if let Some(usage) = &o.usage {
            validate_usage(usage)?;
        }
    }
    Ok(())
}

pub fn validate_observation_update(o: &ObservationUpdate) -> crate::error::Result<()> {
    if o.id.is_empty() {
        return Err(validation_err("id", "observation id must not be empty"));
    }
    if o.trace_id.is_empty() {
        return Err(validation_err("traceId", "traceId must not be empty"));
    }
    if let (Some(start), Some(end)) = (o.start_time, o.end_time) {
        if end < start {
            return Err(validation_err("endTime", "endTime must be >= startTime"));
        }
    }
    if o.kind == ObservationKind::Generation {
        if let Some(usage) = &o.usage {
            validate_usage(usage)?;
        }
    }
    Ok(())
}

pub fn validate_score_create(s: &ScoreCreate) -> crate::error::Result<()> {
    if s.trace_id.is_empty() {
        return Err(validation_err("traceId", "traceId must not be empty"));
    }
    if s.name.is_empty() {
        return Err(validation_err("name", "score name must not be empty"));
    }
    let agrees = matches!(
        (&s.data_type, &s.value),
        (ScoreDataType::Numeric, ScoreValue::Numeric(_))
            | (ScoreDataType::Categorical, ScoreValue::Categorical(_))
            | (ScoreDataType::Boolean, ScoreValue::Boolean(_))
    );
    if !agrees {
        return Err(validation_err(
            "value",
            format!("score value does not match declared dataType {:?}", s.data_type),
        ));
    }
    Ok(())
}

/// A validated, queue-ready event. The queue and dispatcher only ever see
/// this opaque enum; all invariant enforcement happens in the builder
/// before construction.
#[derive(Debug, Clone)]
pub enum Event {
    TraceCreate(TraceCreate),
    TraceUpdate(TraceUpdate),
    ObservationCreate(ObservationCreate),
    ObservationUpdate(ObservationUpdate),
    ScoreCreate(ScoreCreate),
}

impl Event {
    pub fn id(&self) -> &str {
        match self {
            Event::TraceCreate(t) => &t.id,
            Event::TraceUpdate(t) => &t.id,
            Event::ObservationCreate(o) => &o.id,
            Event::ObservationUpdate(o) => &o.id,
            Event::ScoreCreate(s) => s.id.as_deref().unwrap_or(""),
        }
    }

    /// The wire `type` tag for this event.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Event::TraceCreate(_) => "trace-create",
            Event::TraceUpdate(_) => "trace-update",
            Event::ObservationCreate(o) => match o.kind {
                ObservationKind::Span => "span-create",
                ObservationKind::Generation => "generation-create",
                ObservationKind::Event => "event-create",
            },
            Event::ObservationUpdate(o) => match o.kind {
                ObservationKind::Span => "span-update",
                ObservationKind::Generation => "generation-update",
                ObservationKind::Event => "event-update",
            },
            Event::ScoreCreate(_) => "score-create",
        }
    }

    pub fn body_json(&self) -> serde_json::Result<JsonValue> {
        match self {
            Event::TraceCreate(t) => serde_json::to_value(t),
            Event::TraceUpdate(t) => serde_json::to_value(t),
            Event::ObservationCreate(o) => serde_json::to_value(o),
            Event::ObservationUpdate(o) => serde_json::to_value(o),
            Event::ScoreCreate(s) => serde_json::to_value(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn generation_rejects_end_before_start() {
        let start = now();
        let obs = ObservationCreate {
            id: "observationid1234".into(),
            trace_id: "traceid1234567890".into(),
            kind: ObservationKind::Generation,
            name: "gen".into(),
            start_time: start,
            parent_observation_id: None,
            end_time: Some(start - ChronoDuration::seconds(1)),
            input: None,
            output: None,
            metadata: None,
            level: ObservationLevel::Default,
            status_message: None,
            version: None,
            model: Some("gpt".into()),
            model_parameters: None,
            completion_start_time: None,
            usage: None,
        };
        let err = validate_observation_create(&obs).unwrap_err();
        match err {
            LangfuseError::Validation { field, .. } => assert_eq!(field, "endTime"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn score_value_must_agree_with_data_type() {
        let score = ScoreCreate {
            id: None,
            trace_id: "traceid1234567890".into(),
            observation_id: None,
            name: "accuracy".into(),
            value: ScoreValue::Categorical("good".into()),
            data_type: ScoreDataType::Numeric,
            source: None,
            comment: None,
            config_id: None,
            author_user_id: None,
            queue_id: None,
        };
        assert!(validate_score_create(&score).is_err());
    }
}
