//! Telemetry wrapper around every registered route
//!
//! Records a timing observation, a synthetic span with a nested check
//! event, and a standalone custom event for each request. Every request
//! is recorded; there is no sampling.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use super::AppState;
use crate::contracts::{EventPayload, SpanPayload};

pub async fn telemetry_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let started = Utc::now();
    let timer = Instant::now();

    let response = next.run(request).await;
    let elapsed = timer.elapsed();

    state
        .metrics
        .observe_response_time(&path, &method, elapsed.as_secs_f64());
    state.harvester.record_span(SpanPayload::request(
        &path,
        &method,
        check_label(&path),
        started,
        elapsed,
    ));
    state
        .harvester
        .record_event(EventPayload::request(&path, &method, started));

    response
}

/// Label for the check event nested in each route's span
pub fn check_label(path: &str) -> &'static str {
    match path {
        "/redisup" => "Redis is Up",
        "/redisdown" => "Redis is Down",
        "/redisslow" => "Redis is Slow",
        "/gitupstatus" => "Git is Up",
        "/gitdownstatus" => "Git is Down",
        _ => "simple",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_labels_for_probe_routes() {
        assert_eq!(check_label("/redisup"), "Redis is Up");
        assert_eq!(check_label("/redisdown"), "Redis is Down");
        assert_eq!(check_label("/redisslow"), "Redis is Slow");
        assert_eq!(check_label("/gitupstatus"), "Git is Up");
        assert_eq!(check_label("/gitdownstatus"), "Git is Down");
    }

    #[test]
    fn test_check_label_fallback() {
        assert_eq!(check_label("/"), "simple");
        assert_eq!(check_label("/fetch"), "simple");
        assert_eq!(check_label("/outbound"), "simple");
        assert_eq!(check_label("/anything-else"), "simple");
    }
}
