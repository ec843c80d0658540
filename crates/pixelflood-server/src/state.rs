//! Server shared state.

use std::sync::{Arc, Mutex};

use pixelflood_core::canvas::Canvas;
use pixelflood_core::config::ServerConfig;

use crate::behavior::BehaviorEngine;
use crate::bus::EventBus;
use crate::rate_limit::Pacing;
use crate::registry::Registry;

/// Everything the listener, ticker, loader, and session tasks share.
pub struct ServerState {
    pub config: ServerConfig,
    pub canvas: Arc<Mutex<Canvas>>,
    pub bus: Arc<EventBus>,
    pub engine: Arc<BehaviorEngine>,
    pub registry: Arc<Registry>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        config.validate()?;

        let canvas = Arc::new(Mutex::new(Canvas::new(
            config.width,
            config.height,
            config.zoom,
        )));
        let bus = Arc::new(EventBus::new());
        let engine = Arc::new(BehaviorEngine::new(canvas.clone(), bus.clone())?);
        let registry = Arc::new(Registry::new(engine.clone(), Pacing::from_config(&config)));

        Ok(Arc::new(Self {
            config,
            canvas,
            bus,
            engine,
            registry,
        }))
    }
}
