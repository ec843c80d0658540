//! Server configuration: defaults, file loading, and CLI-facing parsers.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PixelfloodError, Result};

/// Runtime configuration for a pixelflood server.
///
/// Every field has a default so an empty config file (or none at all) yields
/// a working server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind the TCP listener on.
    pub host: String,
    pub port: u16,

    /// Canvas size in logical pixels.
    pub width: u32,
    pub height: u32,

    /// Integer zoom factor applied when presenting the canvas.
    pub zoom: u32,

    /// Per-client throughput cap in protocol lines per second.
    pub pps: u32,

    /// Lines a client may submit in one scheduling window.
    pub burst: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1234,
            width: 640,
            height: 480,
            zoom: 1,
            pps: 1000,
            burst: 10,
        }
    }
}

impl ServerConfig {
    /// Load config from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(PixelfloodError::Io)?;
        let config: ServerConfig =
            serde_json::from_str(&raw).map_err(|e| PixelfloodError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject rate and zoom settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pps == 0 {
            return Err(PixelfloodError::Config("pps must be at least 1".into()));
        }
        if self.burst == 0 {
            return Err(PixelfloodError::Config("burst must be at least 1".into()));
        }
        if self.zoom == 0 {
            return Err(PixelfloodError::Config("zoom must be at least 1".into()));
        }
        Ok(())
    }

    /// Sleep between scheduling windows so that `burst` lines per window
    /// averages out to `pps` lines per second.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.burst as f64 / self.pps as f64)
    }
}

/// Canvas dimensions in the `<width>x<height>` form the CLI accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for CanvasSize {
    type Err = PixelfloodError;

    fn from_str(s: &str) -> Result<Self> {
        let re = regex::Regex::new(r"^(\d+)x(\d+)$").unwrap();
        let caps = re.captures(s).ok_or_else(|| {
            PixelfloodError::Config(format!("invalid size '{s}', expected <width>x<height>"))
        })?;
        let width = caps[1]
            .parse()
            .map_err(|_| PixelfloodError::Config(format!("width out of range in '{s}'")))?;
        let height = caps[2]
            .parse()
            .map_err(|_| PixelfloodError::Config(format!("height out of range in '{s}'")))?;
        Ok(Self { width, height })
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
