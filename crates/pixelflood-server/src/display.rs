//! Presentation seam between the canvas and whatever shows it.
//!
//! The server itself only ever talks to this trait. The default deployment
//! is headless; a windowed front end implements the same two methods and
//! feeds resize/key/quit events back into the tick loop.

use pixelflood_core::canvas::Canvas;

/// Input collected from the display since the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The viewport changed; the canvas follows it.
    Resize { width: u32, height: u32 },
    /// A key press, forwarded to scripts as `KEYDOWN-<key>`.
    Key(char),
    /// Stop presenting. Network serving continues.
    Quit,
}

pub trait Display: Send {
    /// Drain pending input. Must not block.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    /// Show the current canvas contents.
    fn present(&mut self, canvas: &Canvas);
}

/// No window, no input. The canvas still exists and scripts still run.
pub struct Headless;

impl Display for Headless {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn present(&mut self, _canvas: &Canvas) {}
}
