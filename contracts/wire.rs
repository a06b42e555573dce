//! Collector wire format
//!
//! JSON envelopes the harvester ships on each flush: metric points, spans
//! with nested check events, and standalone custom events.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Service name attached to every span
pub const SERVICE_NAME: &str = "fault-stub";

/// Generate a 64-bit hex identifier for span/trace correlation
pub fn random_hex_id() -> String {
    let id: u64 = rand::thread_rng().gen();
    hex::encode(id.to_be_bytes())
}

/// Attribute block shared by every entry in a batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonBlock {
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Metric point kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Count,
    Gauge,
    Summary,
}

/// One metric point in a flush batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: MetricKind,

    /// Number for counts and gauges, `{count, sum}` object for summaries
    pub value: serde_json::Value,

    /// Unix epoch milliseconds
    pub timestamp: i64,

    #[serde(rename = "interval.ms", skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Metrics flush envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEnvelope {
    pub common: CommonBlock,
    pub metrics: Vec<MetricPoint>,
}

/// Synthetic span recorded around a handler invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanPayload {
    pub id: String,

    #[serde(rename = "trace.id")]
    pub trace_id: String,

    /// Unix epoch milliseconds
    pub timestamp: i64,

    pub attributes: HashMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventPayload>,
}

impl SpanPayload {
    /// Span for one handled request, with a nested check event
    pub fn request(
        path: &str,
        method: &str,
        check_label: &str,
        started: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), "service.responseTime".into());
        attributes.insert("duration.ms".to_string(), (duration.as_millis() as u64).into());
        attributes.insert("service.name".to_string(), SERVICE_NAME.into());
        attributes.insert("http.method".to_string(), method.into());
        attributes.insert("http.path".to_string(), path.into());
        attributes.insert("isWeb".to_string(), true.into());

        Self {
            id: random_hex_id(),
            trace_id: random_hex_id(),
            timestamp: started.timestamp_millis(),
            attributes,
            events: vec![EventPayload::check(check_label, started)],
        }
    }
}

/// Spans flush envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEnvelope {
    pub common: CommonBlock,
    pub spans: Vec<SpanPayload>,
}

/// Custom event recorded around a handler invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "eventType")]
    pub event_type: String,

    /// Unix epoch milliseconds
    pub timestamp: i64,

    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl EventPayload {
    /// Nested check event attached to a request span
    pub fn check(label: &str, at: DateTime<Utc>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("check.message".to_string(), "Checking".into());
        attributes.insert("check.type".to_string(), label.into());
        attributes.insert("service.name".to_string(), SERVICE_NAME.into());

        Self {
            event_type: "exception".to_string(),
            timestamp: at.timestamp_millis(),
            attributes,
        }
    }

    /// Standalone custom event for one handled request
    pub fn request(path: &str, method: &str, at: DateTime<Utc>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("path".to_string(), path.into());
        attributes.insert("http.method".to_string(), method.into());
        attributes.insert("isWeb".to_string(), true.into());
        attributes.insert("service.name".to_string(), SERVICE_NAME.into());

        Self {
            event_type: "CustomEvent".to_string(),
            timestamp: at.timestamp_millis(),
            attributes,
        }
    }
}
