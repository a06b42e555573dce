//! Outcome counters and timing metrics
//!
//! Every simulated outcome increments exactly one named counter. Counters
//! carry static attribute labels describing the backend they watch and are
//! snapshotted by the harvester on each flush.

use prometheus::{Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};
use std::sync::Arc;

use super::{Result, TelemetryError};
use crate::contracts::ProbeOutcome;

const NAMESPACE: &str = "fault_stub";

/// Counter and gauge set for the stub
pub struct StubMetrics {
    /// Cache dial succeeded promptly
    redis_up_hits: IntCounter,

    /// Cache dial or command failed
    redis_down_hits: IntCounter,

    /// Cache answered past the slow threshold
    redis_slow_hits: IntCounter,

    /// SCM probe succeeded (see the note on the up handler's wiring)
    git_up_hits: IntCounter,

    /// SCM probe failed or returned non-200
    git_down_hits: IntCounter,

    /// Simulated database cache hits
    database_cache_hits: IntCounter,

    /// Simulated database cache misses
    database_cache_misses: IntCounter,

    /// Handler response time by path and method
    response_time: HistogramVec,

    /// Outbound call response time by host and status
    outbound_response_time: HistogramVec,

    /// Sampled resident memory
    resident_memory_bytes: Gauge,

    /// Spans queued for flush
    spans_recorded: IntCounter,

    /// Events queued for flush
    events_recorded: IntCounter,

    /// Collector flush requests that failed
    flush_failures: IntCounter,
}

impl StubMetrics {
    /// Create the full metric set and register it with the given registry
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let redis_opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(NAMESPACE)
                .const_label("db_type", "redis")
                .const_label("db_instance", "trial")
        };
        let git_opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(NAMESPACE)
                .const_label("check_type", "gitweb")
                .const_label("instance", "proxy")
        };
        let database_opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(NAMESPACE)
                .const_label("db_type", "sql")
                .const_label("db_instance", "customers")
        };

        let redis_up_hits = IntCounter::with_opts(redis_opts(
            "redis_up_hits_total",
            "Cache probes that connected promptly",
        ))?;
        let redis_down_hits = IntCounter::with_opts(redis_opts(
            "redis_down_hits_total",
            "Cache probes that failed to connect",
        ))?;
        let redis_slow_hits = IntCounter::with_opts(redis_opts(
            "redis_slow_hits_total",
            "Cache probes that answered past the slow threshold",
        ))?;

        let git_up_hits = IntCounter::with_opts(git_opts(
            "git_up_hits_total",
            "SCM probes that succeeded",
        ))?;
        let git_down_hits = IntCounter::with_opts(git_opts(
            "git_down_hits_total",
            "SCM probes that failed or returned non-200",
        ))?;

        let database_cache_hits = IntCounter::with_opts(database_opts(
            "database_cache_hits_total",
            "Simulated database cache hits",
        ))?;
        let database_cache_misses = IntCounter::with_opts(database_opts(
            "database_cache_misses_total",
            "Simulated database cache misses",
        ))?;

        let response_time = HistogramVec::new(
            HistogramOpts::new("response_time_seconds", "Handler response time")
                .namespace(NAMESPACE)
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 0.9, 1.0, 2.5]),
            &["path", "method"],
        )?;

        let outbound_response_time = HistogramVec::new(
            HistogramOpts::new("outbound_response_time_seconds", "Outbound call response time")
                .namespace(NAMESPACE)
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["host", "status"],
        )?;

        let resident_memory_bytes = Gauge::with_opts(
            Opts::new("resident_memory_bytes", "Sampled resident memory").namespace(NAMESPACE),
        )?;

        let spans_recorded = IntCounter::with_opts(
            Opts::new("spans_recorded_total", "Spans queued for flush").namespace(NAMESPACE),
        )?;
        let events_recorded = IntCounter::with_opts(
            Opts::new("events_recorded_total", "Events queued for flush").namespace(NAMESPACE),
        )?;
        let flush_failures = IntCounter::with_opts(
            Opts::new("flush_failures_total", "Failed collector flush requests")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(redis_up_hits.clone()))?;
        registry.register(Box::new(redis_down_hits.clone()))?;
        registry.register(Box::new(redis_slow_hits.clone()))?;
        registry.register(Box::new(git_up_hits.clone()))?;
        registry.register(Box::new(git_down_hits.clone()))?;
        registry.register(Box::new(database_cache_hits.clone()))?;
        registry.register(Box::new(database_cache_misses.clone()))?;
        registry.register(Box::new(response_time.clone()))?;
        registry.register(Box::new(outbound_response_time.clone()))?;
        registry.register(Box::new(resident_memory_bytes.clone()))?;
        registry.register(Box::new(spans_recorded.clone()))?;
        registry.register(Box::new(events_recorded.clone()))?;
        registry.register(Box::new(flush_failures.clone()))?;

        Ok(Self {
            redis_up_hits,
            redis_down_hits,
            redis_slow_hits,
            git_up_hits,
            git_down_hits,
            database_cache_hits,
            database_cache_misses,
            response_time,
            outbound_response_time,
            resident_memory_bytes,
            spans_recorded,
            events_recorded,
            flush_failures,
        })
    }

    /// Count one classified cache probe outcome
    pub fn record_redis_outcome(&self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Up => self.redis_up_hits.inc(),
            ProbeOutcome::Down => self.redis_down_hits.inc(),
            ProbeOutcome::Slow => self.redis_slow_hits.inc(),
        }
    }

    pub fn record_git_up(&self) {
        self.git_up_hits.inc();
    }

    pub fn record_git_down(&self) {
        self.git_down_hits.inc();
    }

    pub fn record_database_hit(&self) {
        self.database_cache_hits.inc();
    }

    pub fn record_database_miss(&self) {
        self.database_cache_misses.inc();
    }

    pub fn observe_response_time(&self, path: &str, method: &str, seconds: f64) {
        self.response_time
            .with_label_values(&[path, method])
            .observe(seconds);
    }

    pub fn observe_outbound(&self, host: &str, status: u16, seconds: f64) {
        self.outbound_response_time
            .with_label_values(&[host, &status.to_string()])
            .observe(seconds);
    }

    pub fn set_resident_bytes(&self, bytes: f64) {
        self.resident_memory_bytes.set(bytes);
    }

    pub fn record_span_queued(&self) {
        self.spans_recorded.inc();
    }

    pub fn record_event_queued(&self) {
        self.events_recorded.inc();
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.inc();
    }

    // Current counter values, used by the one-shot check command and tests

    pub fn redis_up_hits(&self) -> u64 {
        self.redis_up_hits.get()
    }

    pub fn redis_down_hits(&self) -> u64 {
        self.redis_down_hits.get()
    }

    pub fn redis_slow_hits(&self) -> u64 {
        self.redis_slow_hits.get()
    }

    pub fn git_up_hits(&self) -> u64 {
        self.git_up_hits.get()
    }

    pub fn git_down_hits(&self) -> u64 {
        self.git_down_hits.get()
    }

    pub fn database_cache_hits(&self) -> u64 {
        self.database_cache_hits.get()
    }

    pub fn database_cache_misses(&self) -> u64 {
        self.database_cache_misses.get()
    }

    pub fn spans_recorded(&self) -> u64 {
        self.spans_recorded.get()
    }

    pub fn events_recorded(&self) -> u64 {
        self.events_recorded.get()
    }

    pub fn response_time_sample_count(&self, path: &str, method: &str) -> u64 {
        self.response_time
            .with_label_values(&[path, method])
            .get_sample_count()
    }
}

/// Encode a registry's metrics in the text exposition format
pub fn encode_text(registry: &Registry) -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(TelemetryError::Metrics)?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Flush(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_metrics() -> (Arc<Registry>, StubMetrics) {
        let registry = Arc::new(Registry::new());
        let metrics = StubMetrics::new(Arc::clone(&registry)).unwrap();
        (registry, metrics)
    }

    #[test]
    fn test_outcome_counters() {
        let (_registry, metrics) = create_test_metrics();

        metrics.record_redis_outcome(ProbeOutcome::Up);
        metrics.record_redis_outcome(ProbeOutcome::Down);
        metrics.record_redis_outcome(ProbeOutcome::Down);
        metrics.record_redis_outcome(ProbeOutcome::Slow);

        assert_eq!(metrics.redis_up_hits(), 1);
        assert_eq!(metrics.redis_down_hits(), 2);
        assert_eq!(metrics.redis_slow_hits(), 1);
    }

    #[test]
    fn test_git_counters() {
        let (_registry, metrics) = create_test_metrics();

        metrics.record_git_down();
        metrics.record_git_down();
        metrics.record_git_up();

        assert_eq!(metrics.git_down_hits(), 2);
        assert_eq!(metrics.git_up_hits(), 1);
    }

    #[test]
    fn test_database_counters() {
        let (_registry, metrics) = create_test_metrics();

        metrics.record_database_hit();
        metrics.record_database_miss();
        metrics.record_database_miss();

        assert_eq!(metrics.database_cache_hits(), 1);
        assert_eq!(metrics.database_cache_misses(), 2);
    }

    #[test]
    fn test_response_time_histogram() {
        let (_registry, metrics) = create_test_metrics();

        metrics.observe_response_time("/redisup", "GET", 0.012);
        metrics.observe_response_time("/redisup", "GET", 0.020);
        metrics.observe_response_time("/fetch", "GET", 0.001);

        assert_eq!(metrics.response_time_sample_count("/redisup", "GET"), 2);
        assert_eq!(metrics.response_time_sample_count("/fetch", "GET"), 1);
    }

    #[test]
    fn test_encode_text_contains_counters() {
        let (registry, metrics) = create_test_metrics();

        metrics.record_redis_outcome(ProbeOutcome::Down);
        metrics.set_resident_bytes(1024.0);

        let text = encode_text(&registry).unwrap();
        assert!(text.contains("fault_stub_redis_down_hits_total"));
        assert!(text.contains("fault_stub_resident_memory_bytes"));
        assert!(text.contains("db_type=\"redis\""));
    }
}
