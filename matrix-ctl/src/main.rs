//! Fourkay Matrix Controller
//!
//! A console application that keeps a Fourkay 8x8 HDMI matrix's routing
//! table in view and lets an operator switch it over TCP.

mod console;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use matrix_bridge::{spawn_bridge, BridgeEvent};
use matrix_sim::{VirtualMatrix, VirtualMatrixServer};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use console::Console;
use settings::Settings;

/// Fourkay 8x8 HDMI matrix controller
#[derive(Parser, Debug)]
#[command(name = "matrix-ctl", version, about, long_about = None)]
struct Cli {
    /// Matrix hostname or IP address
    #[arg(long, env = "MATRIX_HOST")]
    host: Option<String>,

    /// Matrix TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Status poll interval in milliseconds (300-30000)
    #[arg(long, value_name = "MS")]
    poll_interval: Option<u64>,

    /// Delay before reconnecting after a dropped connection, 0 to disable
    #[arg(long, value_name = "MS")]
    reconnect_delay: Option<u64>,

    /// Settings file to use instead of the default location
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save: bool,

    /// Serve a virtual matrix on localhost and control that instead
    #[arg(long)]
    simulate: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.endpoint.port = port;
        }
        if let Some(ms) = self.poll_interval {
            settings.endpoint.poll_interval_ms = ms;
        }
        if let Some(ms) = self.reconnect_delay {
            settings.endpoint.reconnect_delay_ms = ms;
        }
    }
}

/// Mirror bridge events into the log
async fn log_events(mut events: broadcast::Receiver<BridgeEvent>, show_traffic: bool) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Event log fell behind, skipped {} events", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if event.is_traffic() && !show_traffic {
            debug!("Traffic: {:?}", event);
            continue;
        }

        match event {
            BridgeEvent::DataIn { data } => {
                info!("<- {:?}", String::from_utf8_lossy(&data));
            }
            BridgeEvent::DataOut { data } => {
                info!("-> {:?}", String::from_utf8_lossy(&data));
            }
            BridgeEvent::ConnectionStatusChanged { status, message } => match message {
                Some(message) => info!("Connection {}: {}", status.name(), message),
                None => info!("Connection {}", status.name()),
            },
            BridgeEvent::RouteChanged { input, output } => {
                info!("Output {} now fed by input {}", output + 1, input.saturating_add(1));
            }
            BridgeEvent::SelectedInputChanged { input } => {
                info!("Input {} selected", input + 1);
            }
            BridgeEvent::MalformedResponse { message } => {
                warn!("Malformed response: {}", message);
            }
            BridgeEvent::Error { source, message } => {
                warn!("{} error: {}", source, message);
            }
            BridgeEvent::Configured { endpoint } => {
                debug!("Configured for {}", endpoint.address());
            }
            BridgeEvent::Stopped => debug!("Bridge stopped"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "matrix_ctl=info,matrix_protocol=info,matrix_bridge=info,matrix_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);

    if cli.save {
        let path = settings.save(cli.config.as_deref())?;
        info!("Saved settings to {}", path.display());
    }

    info!("Starting matrix controller");

    let mut endpoint = settings.endpoint.clone();
    let simulator = if cli.simulate {
        let server = VirtualMatrixServer::spawn(
            "127.0.0.1:0",
            VirtualMatrix::from_config(&settings.simulator),
        )
        .await
        .context("Failed to start virtual matrix")?;
        endpoint.host = server.local_addr().ip().to_string();
        endpoint.port = server.local_addr().port();
        Some(server)
    } else {
        None
    };

    let (bridge, bridge_task) = spawn_bridge();
    tokio::spawn(log_events(bridge.subscribe(), settings.show_traffic));

    bridge.start(endpoint.clone()).await?;
    Console::new(bridge.clone(), endpoint).run().await?;

    bridge.shutdown().await?;
    bridge_task.await.context("Bridge task failed")?;

    if let Some(server) = simulator {
        server.shutdown().await?;
    }

    info!("Matrix controller stopped");
    Ok(())
}
