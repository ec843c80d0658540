//! Canvas, wire protocol, config, and errors for the pixelflood server.

pub mod canvas;
pub mod config;
pub mod error;
pub mod protocol;
