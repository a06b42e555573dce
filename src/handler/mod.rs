//! HTTP surface of the fault stub
//!
//! Registers the fixed route set; every probe route runs a single probe
//! through its fault proxy, counts the classified outcome, and restores
//! the proxy before returning. The HTTP status of a probe route is always
//! 200: outcomes live in counters and log lines only.

mod middleware;

pub use middleware::{check_label, telemetry_middleware};

use axum::http::StatusCode;
use axum::{extract::State, middleware::from_fn_with_state, routing::get, Router};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;

use crate::client::Proxy;
use crate::contracts::ProbeOutcome;
use crate::engine::{classify, HttpProbe, ProbeError, TcpProbe, INJECTED_LATENCY_MS};
use crate::telemetry::{Harvester, StubMetrics};

/// Listen address of the cache proxy
pub const CACHE_PROXY_LISTEN: &str = "localhost:7379";

/// Upstream the cache proxy forwards to
pub const CACHE_UPSTREAM: &str = "localhost:6379";

/// Upstream the SCM proxy forwards to
pub const SCM_UPSTREAM: &str = "github.com:80";

/// Target of the legacy outbound-call route
pub const OUTBOUND_URL: &str = "http://www.example.com";

/// Name of the latency toxic installed by the slow route
pub const LATENCY_TOXIC: &str = "latency_downstream";

const SCM_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Application state shared by every handler
pub struct AppState {
    pub metrics: Arc<StubMetrics>,
    pub harvester: Harvester,
    pub cache_proxy: Option<Proxy>,
    pub scm_proxy: Option<Proxy>,
    pub cache: TcpProbe,
    pub scm: HttpProbe,
    pub scm_url: String,
    pub outbound_url: String,
}

impl AppState {
    pub fn new(
        metrics: Arc<StubMetrics>,
        harvester: Harvester,
        cache_proxy: Option<Proxy>,
        scm_proxy: Option<Proxy>,
        cache_addr: impl Into<String>,
        scm_url: impl Into<String>,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            metrics,
            harvester,
            cache_proxy,
            scm_proxy,
            cache: TcpProbe::new(cache_addr),
            scm: HttpProbe::new(SCM_PROBE_TIMEOUT)?,
            scm_url: scm_url.into(),
            outbound_url: OUTBOUND_URL.to_string(),
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/fetch", get(fetch))
        .route("/outbound", get(outbound))
        .route("/redisup", get(redis_up))
        .route("/redisdown", get(redis_down))
        .route("/redisslow", get(redis_slow))
        .route("/gitupstatus", get(git_up))
        .route("/gitdownstatus", get(git_down))
        .layer(from_fn_with_state(Arc::clone(&state), telemetry_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    tokio::time::sleep(Duration::from_millis(5)).await;
    "index!"
}

async fn fetch(State(state): State<Arc<AppState>>) -> &'static str {
    database_call(&state).await;
    "fetch!"
}

/// Simulated database lookup: an even coin between cache hit and miss
async fn database_call(state: &AppState) {
    let miss = rand::thread_rng().gen_range(0..10) < 5;
    if miss {
        state.metrics.record_database_miss();
        tokio::time::sleep(Duration::from_millis(10)).await;
    } else {
        state.metrics.record_database_hit();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn outbound(State(state): State<Arc<AppState>>) -> &'static str {
    let start = Instant::now();
    let _ = state.scm.fetch(&state.outbound_url).await;

    // The recorded status is synthetic: mostly 200 with occasional faults
    let statuses = [200u16, 200, 200, 200, 200, 404, 503];
    let status = statuses[rand::thread_rng().gen_range(0..statuses.len())];

    let host = reqwest::Url::parse(&state.outbound_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    state
        .metrics
        .observe_outbound(&host, status, start.elapsed().as_secs_f64());

    "outbound!"
}

async fn redis_up(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.cache.dial().await {
        Ok(()) => {
            state.metrics.record_redis_outcome(ProbeOutcome::Up);
            tracing::info!("cache up probe connected");
        }
        Err(e) => tracing::debug!(error = %e, "cache up probe did not connect"),
    }
    StatusCode::OK
}

async fn redis_down(State(state): State<Arc<AppState>>) -> StatusCode {
    if let Some(proxy) = &state.cache_proxy {
        if let Err(e) = proxy.disable().await {
            tracing::warn!(error = %e, "failed to disable cache proxy");
        }
    }

    if let Err(e) = state.cache.dial().await {
        state.metrics.record_redis_outcome(ProbeOutcome::Down);
        tracing::info!(error = %e, "cache down probe failed to connect");
    }

    if let Some(proxy) = &state.cache_proxy {
        if let Err(e) = proxy.enable().await {
            tracing::warn!(error = %e, "failed to re-enable cache proxy");
        }
    }

    StatusCode::OK
}

async fn redis_slow(State(state): State<Arc<AppState>>) -> StatusCode {
    if let Some(proxy) = &state.cache_proxy {
        if let Err(e) = proxy
            .add_latency_toxic(LATENCY_TOXIC, INJECTED_LATENCY_MS)
            .await
        {
            tracing::warn!(error = %e, "failed to add latency toxic");
        }
    }

    // A full command round trip, so the injected downstream latency is
    // visible in the elapsed time
    let start = Instant::now();
    let result = state.cache.ping().await;
    let elapsed = start.elapsed();

    let outcome = classify(&result, elapsed);
    state.metrics.record_redis_outcome(outcome);
    tracing::info!(
        ?outcome,
        elapsed_ms = elapsed.as_millis() as u64,
        "cache slow probe"
    );

    if let Some(proxy) = &state.cache_proxy {
        if let Err(e) = proxy.remove_toxic(LATENCY_TOXIC).await {
            tracing::warn!(error = %e, "failed to remove latency toxic");
        }
    }

    StatusCode::OK
}

async fn git_up(State(state): State<Arc<AppState>>) -> StatusCode {
    // TODO: count the success branch against git_up_hits once the
    // dashboards reading these counters are updated; today both branches
    // land on the down counter.
    match state.scm.fetch(&state.scm_url).await {
        Ok(status) => {
            tracing::info!(status, "scm up probe response");
            state.metrics.record_git_down();
        }
        Err(e) => {
            tracing::info!(error = %e, "scm up probe failed");
            state.metrics.record_git_down();
        }
    }
    StatusCode::OK
}

async fn git_down(State(state): State<Arc<AppState>>) -> StatusCode {
    if let Some(proxy) = &state.scm_proxy {
        if let Err(e) = proxy.disable().await {
            tracing::warn!(error = %e, "failed to disable scm proxy");
        }
    }

    match state.scm.fetch(&state.scm_url).await {
        Err(e) => {
            state.metrics.record_git_down();
            tracing::info!(error = %e, "scm down probe failed");
        }
        Ok(status) if status != 200 => {
            state.metrics.record_git_down();
            tracing::info!(status, "scm down probe returned non-200");
        }
        Ok(status) => {
            tracing::info!(status, "scm answered while its proxy was disabled");
        }
    }

    if let Some(proxy) = &state.scm_proxy {
        if let Err(e) = proxy.enable().await {
            tracing::warn!(error = %e, "failed to re-enable scm proxy");
        }
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::HarvesterConfig;
    use axum::body::Body;
    use axum::http::Request;
    use prometheus::Registry;
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(StubMetrics::new(Arc::clone(&registry)).unwrap());
        let mut config = HarvesterConfig::with_api_key("test-key");
        config.flush_interval_ms = 3_600_000;
        let harvester = Harvester::new(config, registry, Arc::clone(&metrics)).unwrap();

        Arc::new(
            AppState::new(
                metrics,
                harvester,
                None,
                None,
                "127.0.0.1:1",
                "http://127.0.0.1:1/",
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_index_route() {
        let state = test_state().await;
        let response = create_router(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"index!");
    }

    #[tokio::test]
    async fn test_fetch_route_counts_hit_or_miss() {
        let state = test_state().await;
        let response = create_router(Arc::clone(&state))
            .oneshot(Request::get("/fetch").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let total =
            state.metrics.database_cache_hits() + state.metrics.database_cache_misses();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let state = test_state().await;
        let response = create_router(state)
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
