//! Parking gate event correlator (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────────┐
//!                      │                   GATE CORRELATOR                     │
//!   POST /entry-event  │  ┌────────┐   entry-event   ┌──────────┐              │
//!  ────────────────────┼─▶│ ingest │───── queue ────▶│ ingestor │──put──┐      │
//!                      │  │ server │                 └──────────┘       ▼      │
//!   POST /exit-event   │  │        │   exit-event    ┌────────────┐  ┌───────┐ │
//!  ────────────────────┼─▶│        │───── queue ────▶│ correlator │◀─│ store │ │
//!                      │  └────────┘                 └─────┬──────┘  └───────┘ │
//!                      │                                   │ summary           │
//!                      │                             ┌─────▼──────┐            │
//!                      │                             │ forwarder  │────────────┼──▶ writer
//!                      │                             │ 15 x 1s    │            │    (POST /log)
//!                      │                             └─────┬──────┘            │
//!                      │                                   │ latency           │
//!   GET /metrics       │                             ┌─────▼──────┐            │
//!  ◀───────────────────┼─────────────────────────────│  metrics   │            │
//!                      │                             └────────────┘            │
//!                      └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use gate_correlator::config::load_config;
use gate_correlator::lifecycle;
use gate_correlator::observability::init_logging;

#[derive(Parser)]
#[command(name = "gate-correlator")]
#[command(about = "Correlates parking gate entry/exit events and forwards stay summaries", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment are used when omitted.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        ingest = %config.ingest.bind_address,
        metrics_enabled = config.observability.metrics_enabled,
        metrics_address = %config.observability.metrics_address,
        "gate-correlator starting"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
