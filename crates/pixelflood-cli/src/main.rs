use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use pixelflood_core::config::{CanvasSize, ServerConfig};
use pixelflood_server::display::Headless;
use pixelflood_server::listener::start_server;
use pixelflood_server::state::ServerState;

#[derive(Parser)]
#[command(
    name = "pixelflood",
    about = "Collaborative pixel canvas server driven by a hot-reloadable behavior script",
    version
)]
struct Cli {
    /// Lua behavior script; edits are picked up while the server runs
    behavior: PathBuf,

    /// Interface to bind on
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on (default: 1234)
    #[arg(short, long)]
    port: Option<u16>,

    /// Canvas size as <width>x<height> (default: 640x480)
    #[arg(short, long)]
    size: Option<CanvasSize>,

    /// Integer zoom factor for the display (default: 1)
    #[arg(short, long)]
    zoom: Option<u32>,

    /// Per-client lines per second (default: 1000)
    #[arg(long)]
    pps: Option<u32>,

    /// Lines a client may burst per window (default: 10)
    #[arg(long)]
    burst: Option<u32>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// File config first, then flags on top.
    fn to_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(size) = self.size {
            config.width = size.width;
            config.height = size.height;
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        if let Some(pps) = self.pps {
            config.pps = pps;
        }
        if let Some(burst) = self.burst {
            config.burst = burst;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let behavior = cli
        .behavior
        .canonicalize()
        .with_context(|| format!("behavior script not found: {}", cli.behavior.display()))?;

    let config = cli.to_config()?;
    let state = ServerState::new(config)?;

    tokio::select! {
        result = start_server(state, behavior, Box::new(Headless)) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
