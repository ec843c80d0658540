//! Tick driver — the ~30Hz loop that pumps display input, fires TICK, and
//! presents the canvas.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use pixelflood_core::canvas::Canvas;
use pixelflood_core::protocol::{EVENT_QUIT, EVENT_RESIZE, EVENT_TICK, keydown_event};

use crate::behavior::BehaviorEngine;
use crate::display::{Display, InputEvent};

/// ~30 frames per second.
const FRAME_INTERVAL: Duration = Duration::from_micros(33_333);

pub struct Ticker {
    canvas: Arc<Mutex<Canvas>>,
    engine: Arc<BehaviorEngine>,
}

impl Ticker {
    pub fn new(canvas: Arc<Mutex<Canvas>>, engine: Arc<BehaviorEngine>) -> Self {
        Self { canvas, engine }
    }

    /// Run until the display asks to quit. Clients keep being served after
    /// that; only presentation and TICK stop.
    pub async fn run(self, mut display: Box<dyn Display>) {
        info!("Tick driver started");
        let mut interval = tokio::time::interval(FRAME_INTERVAL);
        loop {
            interval.tick().await;

            for event in display.poll_events() {
                match event {
                    InputEvent::Resize { width, height } => {
                        self.canvas.lock().unwrap().resize(width, height);
                        self.engine.fire(EVENT_RESIZE, None, &[]);
                    }
                    InputEvent::Key(key) => {
                        self.engine.fire(&keydown_event(key), None, &[]);
                    }
                    InputEvent::Quit => {
                        self.engine.fire(EVENT_QUIT, None, &[]);
                        info!("Display closed, tick driver stopping");
                        return;
                    }
                }
            }

            self.engine.fire(EVENT_TICK, None, &[]);

            let mut canvas = self.canvas.lock().unwrap();
            canvas.advance_frame();
            display.present(&canvas);
        }
    }
}
