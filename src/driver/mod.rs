//! Periodic random-endpoint driver
//!
//! Ticks at a fixed rate and, on each tick, issues one bounded-timeout
//! GET to a probe route chosen uniformly at random. Request errors are
//! logged and discarded; the loop only stops on SIGINT/SIGTERM.

use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;

/// The five probe routes the driver exercises
pub const PROBE_ROUTES: [&str; 5] = [
    "/redisup",
    "/redisdown",
    "/redisslow",
    "/gitupstatus",
    "/gitdownstatus",
];

/// Driver errors
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("client construction failed: {0}")]
    Client(String),
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Base URL of the stub
    pub target: String,

    /// Tick interval
    pub interval: Duration,

    /// Per-request timeout; in-flight requests are bounded by this, not
    /// cancelled on shutdown
    pub request_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            target: "http://localhost:8000".to_string(),
            interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(1),
        }
    }
}

/// Pick one probe route uniformly at random
pub fn pick_route() -> &'static str {
    PROBE_ROUTES[rand::thread_rng().gen_range(0..PROBE_ROUTES.len())]
}

/// Run the driver until the shutdown channel fires
pub async fn run(
    config: &DriverConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), DriverError> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| DriverError::Client(e.to_string()))?;

    let mut tick = tokio::time::interval(config.interval);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let url = format!("{}{}", config.target, pick_route());
                match client.get(&url).send().await {
                    Ok(response) => match response.text().await {
                        Ok(body) => tracing::info!(%url, body = %body, "probe tick"),
                        Err(e) => tracing::warn!(%url, error = %e, "failed to read body"),
                    },
                    Err(e) => tracing::warn!(%url, error = %e, "probe request failed"),
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("driver stopping");
                break;
            }
        }
    }

    Ok(())
}

/// Receiver that fires once on SIGINT or SIGTERM
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for SIGINT");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        let _ = tx.send(true);
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_route_set() {
        assert_eq!(PROBE_ROUTES.len(), 5);
        assert!(PROBE_ROUTES.contains(&"/redisslow"));
    }

    #[test]
    fn test_pick_route_stays_in_set() {
        for _ in 0..100 {
            assert!(PROBE_ROUTES.contains(&pick_route()));
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = DriverConfig {
            target: "http://127.0.0.1:1".to_string(),
            interval: Duration::from_millis(10),
            request_timeout: Duration::from_millis(50),
        };

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { run(&config, rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("driver did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
