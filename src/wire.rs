//! Wire protocol types for `POST {host}/api/public/ingestion`.
//!
//! Structured the way `opentelemetry-otlp`'s HTTP exporter
//! (`opentelemetry-otlp::exporter::http`) builds its request: a typed
//! envelope serialized with `serde_json` rather than hand-built JSON
//! strings.

use crate::model::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One event inside a batch ingestion request.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub body: JsonValue,
}

impl IngestionEvent {
    pub fn from_event(event: &Event, now: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(IngestionEvent {
            id: event.id().to_string(),
            kind: event.wire_type().to_string(),
            timestamp: now,
            body: event.body_json()?,
        })
    }
}

/// `ingestionBatchMetadata` sent alongside every batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestionBatchMetadata {
    pub sdk_version: String,
    pub sdk_integration: String,
    pub client_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionBatchRequest {
    pub batch: Vec<IngestionEvent>,
    pub metadata: IngestionBatchMetadata,
}

/// Per-event status entry in a 200 OK ingestion response.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionEventError {
    pub id: String,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionResponse {
    pub success: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<IngestionEventError>,
}

/// Non-2xx error body shape.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: String,
}
