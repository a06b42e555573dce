//! Telemetry for the fault stub
//!
//! - `metrics` - named outcome counters, timing histograms, memory gauge
//! - `harvester` - buffers spans/events and periodically flushes
//!   everything to the remote collector
//! - `sampler` - background resident-memory sampler feeding the gauge

pub mod harvester;
pub mod metrics;
pub mod sampler;

pub use harvester::Harvester;
pub use metrics::StubMetrics;
pub use sampler::spawn_memory_sampler;

use std::collections::HashMap;
use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("flush failed: {0}")]
    Flush(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

const DEFAULT_METRICS_URL: &str = "https://metric-api.collector.example.com/metric/v1";
const DEFAULT_SPANS_URL: &str = "https://trace-api.collector.example.com/trace/v1";
const DEFAULT_EVENTS_URL: &str = "https://event-api.collector.example.com/event/v1";

/// Harvester configuration
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Collector ingest key, sent as the `Api-Key` header
    pub api_key: String,

    /// Metrics ingest endpoint
    pub metrics_url: String,

    /// Spans ingest endpoint
    pub spans_url: String,

    /// Events ingest endpoint
    pub events_url: String,

    /// Flush interval in milliseconds
    pub flush_interval_ms: u64,

    /// Timeout per flush request in milliseconds
    pub timeout_ms: u64,

    /// Span/event queue capacity; overflow is dropped with a warning
    pub max_queue_size: usize,

    /// Attributes attached to every shipped batch
    pub common_attributes: HashMap<String, serde_json::Value>,
}

impl HarvesterConfig {
    /// Defaults with the given ingest key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            metrics_url: DEFAULT_METRICS_URL.to_string(),
            spans_url: DEFAULT_SPANS_URL.to_string(),
            events_url: DEFAULT_EVENTS_URL.to_string(),
            flush_interval_ms: 5000,
            timeout_ms: 5000,
            max_queue_size: 1000,
            common_attributes: default_common_attributes(),
        }
    }

    /// Build from environment: `COLLECTOR_API_KEY` is required, the three
    /// URL overrides are optional.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("COLLECTOR_API_KEY")
            .map_err(|_| TelemetryError::Config("COLLECTOR_API_KEY unset".to_string()))?;

        let mut config = Self::with_api_key(api_key);
        if let Ok(url) = std::env::var("COLLECTOR_METRICS_URL") {
            config.metrics_url = url;
        }
        if let Ok(url) = std::env::var("COLLECTOR_SPANS_URL") {
            config.spans_url = url;
        }
        if let Ok(url) = std::env::var("COLLECTOR_EVENTS_URL") {
            config.events_url = url;
        }

        Ok(config)
    }
}

fn default_common_attributes() -> HashMap<String, serde_json::Value> {
    [
        ("app.name".to_string(), crate::contracts::SERVICE_NAME.into()),
        ("host.name".to_string(), "localhost".into()),
        ("env".to_string(), "testing".into()),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HarvesterConfig::with_api_key("key");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.flush_interval_ms, 5000);
        assert_eq!(config.max_queue_size, 1000);
        assert!(config.metrics_url.contains("metric"));
        assert!(config.common_attributes.contains_key("app.name"));
    }

    #[test]
    fn test_from_env_requires_api_key() {
        std::env::remove_var("COLLECTOR_API_KEY");
        assert!(matches!(
            HarvesterConfig::from_env(),
            Err(TelemetryError::Config(_))
        ));

        std::env::set_var("COLLECTOR_API_KEY", "test-key");
        std::env::set_var("COLLECTOR_METRICS_URL", "http://localhost:9999/metrics");
        let config = HarvesterConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.metrics_url, "http://localhost:9999/metrics");
        std::env::remove_var("COLLECTOR_API_KEY");
        std::env::remove_var("COLLECTOR_METRICS_URL");
    }
}
