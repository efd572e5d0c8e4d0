//! TickForge engine binary.
//!
//! Usage: `tickforge [config.json]`
//!
//! Runs the full pipeline with live I/O workers until stdin reaches EOF or
//! a `quit` line arrives. Operators interact over the IPC endpoints
//! (`PING` / `STATUS` / `HALT`); `RUST_LOG` controls log verbosity.

use std::io::BufRead;

use anyhow::{Context, Result};
use tickforge_engine::{EngineConfig, StaticReconciler, TradingEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => EngineConfig::default(),
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        market_data = %config.market_data_endpoint,
        commands = %config.command_endpoint,
        telemetry = %config.telemetry_endpoint,
        "starting tickforge"
    );

    let mut engine = TradingEngine::new(config);
    let mut reconciler = StaticReconciler::new();
    engine
        .start(Some(&mut reconciler))
        .context("starting trading engine")?;

    info!("engine running; type 'quit' (or close stdin) to shut down");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.unwrap_or_default();
        if line.trim().eq_ignore_ascii_case("quit") {
            break;
        }
    }

    engine.stop();
    info!("shutdown complete");
    Ok(())
}
