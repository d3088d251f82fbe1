//! # courier
//!
//! Bayeux long-poll server binary. Loads settings, installs logging, and
//! serves the broker over HTTP until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use courier_broker::{Broker, BrokerConfig};
use courier_server::ServerConfig;
use courier_settings::CourierSettings;
use courier_telemetry::TelemetryConfig;

/// Bayeux long-poll pub/sub server.
#[derive(Parser, Debug)]
#[command(name = "courier", about = "Bayeux long-poll pub/sub server")]
struct Cli {
    /// Settings file (defaults to `~/.courier/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Route that accepts envelope batches (overrides settings).
    #[arg(long)]
    path: Option<String>,

    /// Longest connect hold in milliseconds (overrides settings).
    #[arg(long)]
    max_hold_ms: Option<u64>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Command-line flags win over the file and environment.
    fn apply(&self, settings: &mut CourierSettings) {
        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.path {
            settings.server.path = path.clone();
        }
        if let Some(ms) = self.max_hold_ms {
            settings.broker.max_hold_ms = ms;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn telemetry_config(settings: &CourierSettings) -> Result<TelemetryConfig> {
    let log_level = courier_telemetry::parse_level(&settings.logging.level)
        .context("logging.level is not a tracing level")?;
    let module_levels = settings
        .logging
        .modules
        .iter()
        .map(|(module, level)| {
            courier_telemetry::parse_level(level)
                .map(|level| (module.clone(), level))
                .with_context(|| format!("logging.modules.{module} is not a tracing level"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TelemetryConfig {
        log_level,
        module_levels,
        json: settings.logging.json,
    })
}

fn server_config(settings: &CourierSettings) -> ServerConfig {
    ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        path: settings.server.path.clone(),
        max_body_bytes: settings.server.max_body_bytes,
    }
}

fn broker_config(settings: &CourierSettings) -> BrokerConfig {
    BrokerConfig {
        default_advice: settings.broker.advice,
        max_hold: settings.broker.max_hold(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_file = cli.config.clone().unwrap_or_else(courier_settings::settings_path);
    let settings = courier_settings::load_settings_from_path(&settings_file, |s| cli.apply(s))
        .with_context(|| format!("Failed to load settings from {}", settings_file.display()))?;

    courier_telemetry::init_telemetry(&telemetry_config(&settings)?)
        .context("Failed to initialize logging")?;

    tracing::info!(settings = %settings_file.display(), "starting courier");

    let broker = Arc::new(Broker::new(broker_config(&settings)));
    let handle = courier_server::start(server_config(&settings), Arc::clone(&broker))
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.bind_addr()))?;

    tracing::info!(
        addr = %handle.addr(),
        path = %settings.server.path,
        max_hold = ?broker.config().max_hold,
        "courier ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!(sessions = broker.session_count(), "shutting down");
    handle.shutdown().await;
    Ok(())
}
