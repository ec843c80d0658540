//! Per-client read pacing.
//!
//! Throughput is capped by scheduling, not by counting: a session sleeps for
//! one window, then reads at most `burst` lines, then sleeps again. Clients
//! that pipeline thousands of lines just wait longer; nobody gets told to
//! slow down.

use std::time::Duration;

use pixelflood_core::config::ServerConfig;

/// Pacing policy applied to every session's read loop.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Sleep between read windows.
    pub window: Duration,
    /// Max lines processed per window.
    pub burst: u32,
}

impl Pacing {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            window: config.tick_interval(),
            burst: config.burst,
        }
    }
}
