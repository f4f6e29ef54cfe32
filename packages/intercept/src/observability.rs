// packages/intercept/src/observability.rs
//! Logging and metrics setup

use crate::utils::config::LoggingConfig;
use crate::utils::errors::{InterceptError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| InterceptError::Config(format!("Invalid log filter '{}': {}", config.filter, e)))?;

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| InterceptError::Local(format!("Tracing already initialized: {}", e)))
}

/// Serve Prometheus metrics on `listen`; must be called inside a tokio runtime
pub fn init_metrics(listen: &str) -> Result<SocketAddr> {
    let addr: SocketAddr = listen.parse().map_err(|e| InterceptError::InvalidEndpoint {
        endpoint: listen.to_string(),
        reason: format!("{}", e),
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| InterceptError::Local(format!("Failed to install metrics exporter: {}", e)))?;

    metrics::describe_counter!(
        "sut_intercept_requests_total",
        "Requests forwarded to the replay server, by kind"
    );
    metrics::describe_counter!(
        "sut_intercept_gate_bypass_total",
        "Operations routed to the real implementation for excluded callers"
    );
    metrics::describe_histogram!(
        "sut_intercept_exchange_seconds",
        "Round-trip time of a single request"
    );
    metrics::describe_counter!(
        "sut_intercept_stub_requests_total",
        "Requests answered by the replay stub, by command"
    );

    Ok(addr)
}
