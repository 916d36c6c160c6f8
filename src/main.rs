//! # streamhost
//!
//! Session host binary: loads settings, installs telemetry, and runs one
//! streaming session until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use streamhost_engine::{create_default_registry, SignalingEngineBuilder};
use streamhost_runtime::{LoggingHandler, OrchestratorConfig, SessionOrchestrator, StartOptions};
use streamhost_settings::{default_config_root, load_settings_from_path, settings_path};
use streamhost_telemetry::{init_telemetry, TelemetryConfig};

/// Streaming session host.
#[derive(Parser, Debug)]
#[command(name = "streamhost", about = "Streaming session host")]
struct Cli {
    /// Directory holding `settings.json` and `signal_override.json`.
    #[arg(long)]
    config_root: Option<PathBuf>,

    /// Signaling transport type (overrides settings if specified).
    #[arg(long)]
    transport: Option<String>,

    /// Signaling endpoint URL (overrides settings if specified).
    #[arg(long)]
    url: Option<String>,

    /// Poll interval in seconds (overrides settings if specified).
    #[arg(long)]
    interval: Option<f64>,

    /// Use the software encoder.
    #[arg(long)]
    software_encoder: bool,

    /// Skip the ready path: resolve overrides and start the session directly.
    #[arg(long)]
    no_auto_start: bool,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_root = cli.config_root.clone().unwrap_or_else(default_config_root);
    let path = settings_path(&config_root);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(transport) = cli.transport {
        settings.signaling.transport_type = transport;
    }
    if let Some(url) = cli.url {
        settings.signaling.endpoint_url = url;
    }
    if let Some(interval) = cli.interval {
        settings.signaling.poll_interval_secs = interval;
    }
    if cli.software_encoder {
        settings.hardware_encoder = false;
    }
    if cli.no_auto_start {
        settings.auto_start = false;
    }
    settings.validate().context("Invalid settings")?;

    let _telemetry = init_telemetry(
        TelemetryConfig {
            json: cli.log_json || settings.logging.json,
            ..Default::default()
        }
        .with_level_name(&settings.logging.level),
    );

    tracing::info!(
        config_root = %config_root.display(),
        transport = %settings.signaling.transport_type,
        endpoint = %settings.signaling.endpoint_url,
        "starting streamhost"
    );

    let config = OrchestratorConfig::from(&settings).with_override_root(&config_root);
    let mut orchestrator = SessionOrchestrator::new(
        config,
        Arc::new(create_default_registry()),
        Arc::new(SignalingEngineBuilder::new()),
    );
    orchestrator.add_handler(Arc::new(LoggingHandler::new()));

    if settings.auto_start {
        orchestrator.on_ready().context("Failed to start session")?;
    } else {
        let _ = orchestrator.resolve_overrides();
        orchestrator
            .start(StartOptions::default())
            .context("Failed to start session")?;
    }

    if let Some(session_id) = orchestrator.session_id() {
        tracing::info!(session_id = %session_id, "session running");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    if let Err(e) = orchestrator.stop() {
        tracing::warn!(error = %e, "session teardown reported an error");
    }
    Ok(())
}
