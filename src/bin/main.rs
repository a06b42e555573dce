//! Fault stub entry point
//!
//! `serve` runs the stub HTTP server, `drive` runs the periodic
//! random-endpoint client, `check` performs a one-shot probe.

use clap::{Parser, Subcommand};
use fault_stub::client::toxiproxy::DEFAULT_CONTROL_URL;
use fault_stub::client::ToxiproxyClient;
use fault_stub::contracts::{ProbeOutcome, ProbeReport, ProbeService};
use fault_stub::driver::{self, DriverConfig};
use fault_stub::engine::{HttpProbe, TcpProbe, SLOW_THRESHOLD};
use fault_stub::handler::{
    create_router, AppState, CACHE_PROXY_LISTEN, CACHE_UPSTREAM, SCM_UPSTREAM,
};
use fault_stub::telemetry::{spawn_memory_sampler, Harvester, HarvesterConfig, StubMetrics};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fault-stub")]
#[command(about = "Dependency fault stub - simulated cache/SCM outages with telemetry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the stub HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Proxy control API endpoint
        #[arg(long, default_value = DEFAULT_CONTROL_URL, env = "TOXIPROXY_URL")]
        control_url: String,
    },

    /// Run the periodic random-endpoint driver
    Drive {
        /// Base URL of the stub
        #[arg(long, default_value = "http://localhost:8000")]
        target: String,

        /// Tick interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,

        /// Per-request timeout in milliseconds
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,
    },

    /// One-shot probe of a backend through its proxy
    Check {
        /// Backend to probe: redis or git
        #[arg(short, long)]
        service: String,

        /// Proxy control API endpoint
        #[arg(long, default_value = DEFAULT_CONTROL_URL, env = "TOXIPROXY_URL")]
        control_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            control_url,
        } => {
            let config = HarvesterConfig::from_env()?;

            let registry = Arc::new(Registry::new());
            #[cfg(target_os = "linux")]
            registry.register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))?;

            let metrics = Arc::new(StubMetrics::new(Arc::clone(&registry))?);
            let harvester = Harvester::new(config, registry, Arc::clone(&metrics))?;

            // The proxies simulate the cache and SCM backends going up,
            // down, or slow; creation failures leave detached handles and
            // the probe routes then classify dial failures as down
            let control = ToxiproxyClient::new(control_url)?;
            let cache_proxy = match control
                .create_proxy("redis", CACHE_PROXY_LISTEN, CACHE_UPSTREAM)
                .await
            {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create cache proxy");
                    None
                }
            };
            let scm_proxy = match control.create_proxy("git", "", SCM_UPSTREAM).await {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create scm proxy");
                    None
                }
            };

            let scm_url = scm_proxy
                .as_ref()
                .map(|p| format!("http://{}", p.listen()))
                .unwrap_or_else(|| "http://127.0.0.1:0".to_string());

            spawn_memory_sampler(Arc::clone(&metrics));

            let state = Arc::new(AppState::new(
                metrics,
                harvester,
                cache_proxy,
                scm_proxy,
                CACHE_PROXY_LISTEN,
                scm_url,
            )?);

            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            tracing::info!(%addr, "starting fault stub");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, create_router(state)).await?;
        }

        Commands::Drive {
            target,
            interval_ms,
            timeout_ms,
        } => {
            let config = DriverConfig {
                target,
                interval: Duration::from_millis(interval_ms),
                request_timeout: Duration::from_millis(timeout_ms),
            };

            tracing::info!(target = %config.target, "starting driver");
            let shutdown = driver::shutdown_signal();
            driver::run(&config, shutdown).await?;
        }

        Commands::Check {
            service,
            control_url,
        } => {
            let control = ToxiproxyClient::new(control_url)?;

            let report = match service.to_lowercase().as_str() {
                "redis" => {
                    let proxy = control.proxy("redis").await?;
                    let probe = TcpProbe::new(proxy.listen().to_string());

                    let start = Instant::now();
                    let result = probe.ping().await;
                    report_for(ProbeService::Redis, result.err(), start.elapsed())
                }
                "git" => {
                    let proxy = control.proxy("git").await?;
                    let probe = HttpProbe::new(Duration::from_secs(2))?;
                    let url = format!("http://{}", proxy.listen());

                    let start = Instant::now();
                    let result = probe.fetch(&url).await;
                    report_for(ProbeService::Git, result.err(), start.elapsed())
                }
                other => {
                    eprintln!("Unknown service: {}", other);
                    std::process::exit(1);
                }
            };

            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.outcome == ProbeOutcome::Down {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn report_for(
    service: ProbeService,
    error: Option<impl std::fmt::Display>,
    elapsed: Duration,
) -> ProbeReport {
    match error {
        Some(e) => ProbeReport::down(service, e.to_string()),
        None if elapsed < SLOW_THRESHOLD => {
            ProbeReport::up(service, elapsed.as_millis() as u64)
        }
        None => ProbeReport::slow(service, elapsed.as_millis() as u64),
    }
}
