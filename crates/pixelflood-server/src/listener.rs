//! TCP accept loop plus startup of the background tasks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::behavior::BehaviorLoader;
use crate::display::Display;
use crate::state::ServerState;
use crate::ticker::Ticker;

/// Bind the listener, start the loader and tick driver, then accept clients
/// until the process is stopped.
pub async fn start_server(
    state: Arc<ServerState>,
    behavior: PathBuf,
    display: Box<dyn Display>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %addr,
        width = state.config.width,
        height = state.config.height,
        "Pixelflood server listening"
    );

    tokio::spawn(BehaviorLoader::new(state.engine.clone(), behavior).watch());
    tokio::spawn(Ticker::new(state.canvas.clone(), state.engine.clone()).run(display));

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                state.registry.admit(stream, peer);
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}
