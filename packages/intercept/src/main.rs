// packages/intercept/src/main.rs
//! Replay stub server
//!
//! Answers intercepted requests from a YAML script so a system under test
//! can run without the full capture/replay server.

use anyhow::{Context, Result};
use sut_intercept::observability::{init_metrics, init_tracing};
use sut_intercept::protocol::WireCodec;
use sut_intercept::stub::{ReplayScript, ReplayStub};
use sut_intercept::InterceptConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => InterceptConfig::load_from(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => InterceptConfig::load().context("Failed to load configuration")?,
    };

    init_tracing(&config.logging)?;
    info!("Starting replay stub v{}", sut_intercept::VERSION);

    if let Some(listen) = &config.stub.metrics_listen {
        let addr = init_metrics(listen)?;
        info!("Metrics exporter listening on {}", addr);
    }

    let script = match &config.stub.script {
        Some(path) => ReplayScript::load(path)
            .with_context(|| format!("Failed to load replay script {}", path.display()))?,
        None => ReplayScript::new(),
    };
    info!("Loaded {} scripted exchanges", script.exchanges.len());

    let stub = ReplayStub::bind(&config.stub.listen, &script)
        .await?
        .with_codec(WireCodec::from_config(&config.wire)?);
    let received = stub.received();

    stub.serve_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal");
    })
    .await?;

    let received = received.lock().clone();
    info!(
        requests = %serde_json::to_string(&received)?,
        "Served {} requests",
        received.len()
    );
    Ok(())
}
