//! Collector harvester
//!
//! Buffers spans and events on a channel and, on a fixed interval, ships
//! them together with a snapshot of the metric registry to the remote
//! collector. Emission is fire-and-forget: queue overflow and flush
//! failures are logged and dropped, never surfaced to a request.

use chrono::Utc;
use prometheus::proto::MetricType;
use prometheus::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{HarvesterConfig, Result, StubMetrics, TelemetryError};
use crate::contracts::{
    CommonBlock, EventPayload, MetricEnvelope, MetricKind, MetricPoint, SpanEnvelope, SpanPayload,
};

/// Buffering telemetry harvester with a background flush task
pub struct Harvester {
    span_tx: mpsc::Sender<SpanPayload>,
    event_tx: mpsc::Sender<EventPayload>,
    metrics: Arc<StubMetrics>,
}

impl Harvester {
    /// Create the harvester and spawn its flush loop
    pub fn new(
        config: HarvesterConfig,
        registry: Arc<Registry>,
        metrics: Arc<StubMetrics>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TelemetryError::Config(e.to_string()))?;

        let (span_tx, span_rx) = mpsc::channel(config.max_queue_size);
        let (event_tx, event_rx) = mpsc::channel(config.max_queue_size);

        let bookkeeping = Arc::clone(&metrics);
        tokio::spawn(run_flush_loop(
            config, registry, client, span_rx, event_rx, bookkeeping,
        ));

        Ok(Self {
            span_tx,
            event_tx,
            metrics,
        })
    }

    /// Queue a span for the next flush (non-blocking)
    pub fn record_span(&self, span: SpanPayload) {
        match self.span_tx.try_send(span) {
            Ok(()) => self.metrics.record_span_queued(),
            Err(e) => tracing::warn!(error = %e, "dropping span, queue unavailable"),
        }
    }

    /// Queue an event for the next flush (non-blocking)
    pub fn record_event(&self, event: EventPayload) {
        match self.event_tx.try_send(event) {
            Ok(()) => self.metrics.record_event_queued(),
            Err(e) => tracing::warn!(error = %e, "dropping event, queue unavailable"),
        }
    }
}

async fn run_flush_loop(
    config: HarvesterConfig,
    registry: Arc<Registry>,
    client: reqwest::Client,
    mut span_rx: mpsc::Receiver<SpanPayload>,
    mut event_rx: mpsc::Receiver<EventPayload>,
    metrics: Arc<StubMetrics>,
) {
    let mut spans: Vec<SpanPayload> = Vec::new();
    let mut events: Vec<EventPayload> = Vec::new();
    let mut tick = tokio::time::interval(Duration::from_millis(config.flush_interval_ms));
    // The first tick completes immediately; consume it so flushes start
    // one interval in
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                flush(&config, &registry, &client, &mut spans, &mut events, &metrics).await;
            }
            Some(span) = span_rx.recv() => spans.push(span),
            Some(event) = event_rx.recv() => events.push(event),
        }
    }
}

async fn flush(
    config: &HarvesterConfig,
    registry: &Registry,
    client: &reqwest::Client,
    spans: &mut Vec<SpanPayload>,
    events: &mut Vec<EventPayload>,
    metrics: &StubMetrics,
) {
    let common = CommonBlock {
        attributes: config.common_attributes.clone(),
    };
    let now = Utc::now().timestamp_millis();

    let mut posts = Vec::new();

    let metric_points = snapshot_points(registry, config.flush_interval_ms, now);
    if !metric_points.is_empty() {
        let envelope = vec![MetricEnvelope {
            common: common.clone(),
            metrics: metric_points,
        }];
        posts.push(post_json(
            client,
            &config.metrics_url,
            &config.api_key,
            serde_json::json!(envelope),
        ));
    }

    if !spans.is_empty() {
        let envelope = vec![SpanEnvelope {
            common,
            spans: std::mem::take(spans),
        }];
        posts.push(post_json(
            client,
            &config.spans_url,
            &config.api_key,
            serde_json::json!(envelope),
        ));
    }

    if !events.is_empty() {
        let batch = std::mem::take(events);
        posts.push(post_json(
            client,
            &config.events_url,
            &config.api_key,
            serde_json::json!(batch),
        ));
    }

    for outcome in futures::future::join_all(posts).await {
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "collector flush failed");
            metrics.record_flush_failure();
        }
    }
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: serde_json::Value,
) -> Result<()> {
    let response = client
        .post(url)
        .header("Api-Key", api_key)
        .header("X-Request-Id", Uuid::new_v4().to_string())
        .json(&body)
        .send()
        .await
        .map_err(|e| TelemetryError::Flush(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TelemetryError::Flush(format!(
            "collector returned {}",
            status
        )))
    }
}

/// Snapshot every registered metric into collector points
pub fn snapshot_points(registry: &Registry, interval_ms: u64, timestamp: i64) -> Vec<MetricPoint> {
    let mut points = Vec::new();

    for family in registry.gather() {
        let name = family.get_name().to_string();
        for metric in family.get_metric() {
            let attributes: HashMap<String, serde_json::Value> = metric
                .get_label()
                .iter()
                .map(|label| (label.get_name().to_string(), label.get_value().into()))
                .collect();

            let (kind, value, interval) = match family.get_field_type() {
                MetricType::COUNTER => (
                    MetricKind::Count,
                    serde_json::Value::from(metric.get_counter().get_value()),
                    Some(interval_ms),
                ),
                MetricType::GAUGE => (
                    MetricKind::Gauge,
                    serde_json::Value::from(metric.get_gauge().get_value()),
                    None,
                ),
                MetricType::HISTOGRAM => {
                    let histogram = metric.get_histogram();
                    (
                        MetricKind::Summary,
                        serde_json::json!({
                            "count": histogram.get_sample_count(),
                            "sum": histogram.get_sample_sum(),
                        }),
                        Some(interval_ms),
                    )
                }
                _ => continue,
            };

            points.push(MetricPoint {
                name: name.clone(),
                kind,
                value,
                timestamp,
                interval_ms: interval,
                attributes,
            });
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ProbeOutcome;

    fn test_config() -> HarvesterConfig {
        let mut config = HarvesterConfig::with_api_key("test-key");
        // Far enough out that no flush fires during a test
        config.flush_interval_ms = 3_600_000;
        config
    }

    #[test]
    fn test_snapshot_points_kinds() {
        let registry = Arc::new(Registry::new());
        let metrics = StubMetrics::new(Arc::clone(&registry)).unwrap();

        metrics.record_redis_outcome(ProbeOutcome::Down);
        metrics.set_resident_bytes(4096.0);
        metrics.observe_response_time("/", "GET", 0.004);

        let points = snapshot_points(&registry, 5000, 1_700_000_000_000);

        let counter = points
            .iter()
            .find(|p| p.name == "fault_stub_redis_down_hits_total")
            .unwrap();
        assert_eq!(counter.kind, MetricKind::Count);
        assert_eq!(counter.interval_ms, Some(5000));
        assert_eq!(counter.attributes["db_type"], "redis");

        let gauge = points
            .iter()
            .find(|p| p.name == "fault_stub_resident_memory_bytes")
            .unwrap();
        assert_eq!(gauge.kind, MetricKind::Gauge);
        assert_eq!(gauge.interval_ms, None);

        let summary = points
            .iter()
            .find(|p| p.name == "fault_stub_response_time_seconds")
            .unwrap();
        assert_eq!(summary.kind, MetricKind::Summary);
        assert_eq!(summary.value["count"], 1);
    }

    #[tokio::test]
    async fn test_record_span_is_non_blocking() {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(StubMetrics::new(Arc::clone(&registry)).unwrap());
        let harvester =
            Harvester::new(test_config(), Arc::clone(&registry), Arc::clone(&metrics)).unwrap();

        let span = SpanPayload::request(
            "/redisup",
            "GET",
            "Redis is Up",
            Utc::now(),
            Duration::from_millis(3),
        );
        harvester.record_span(span);
        harvester.record_event(EventPayload::request("/redisup", "GET", Utc::now()));

        assert_eq!(metrics.spans_recorded(), 1);
        assert_eq!(metrics.events_recorded(), 1);
    }
}
