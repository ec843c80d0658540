//! Pixelflood wire protocol: newline-terminated ASCII command lines.
//!
//! A line is `COMMAND arg1 arg2 ...`. The server gives commands no intrinsic
//! meaning; it maps each to a `COMMAND-<NAME>` event and the loaded behavior
//! script decides what, if anything, happens.

/// Longest accepted line in bytes, including nothing past the newline.
/// Anything longer is a protocol violation and costs the peer its connection.
pub const MAX_LINE_BYTES: usize = 1600;

/// Event fired when a client connection is accepted.
pub const EVENT_CONNECT: &str = "CONNECT";
/// Event fired exactly once when a session tears down.
pub const EVENT_DISCONNECT: &str = "DISCONNECT";
/// Event fired every frame by the tick driver.
pub const EVENT_TICK: &str = "TICK";
/// Event fired after the canvas was resized from the display.
pub const EVENT_RESIZE: &str = "RESIZE";
/// Event fired when the display asks the tick driver to stop.
pub const EVENT_QUIT: &str = "QUIT";
/// Event fired after a behavior script was (re)loaded.
pub const EVENT_LOAD: &str = "LOAD";
/// Event fired before a behavior script is replaced.
pub const EVENT_UNLOAD: &str = "UNLOAD";

/// A parsed protocol line: uppercased command name plus its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

/// Split a wire line into a command, or `None` for blank lines.
///
/// The command name is case-insensitive; arguments keep their original form
/// so behavior scripts see exactly what the client sent.
pub fn parse_line(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let name = words.next()?.to_uppercase();
    let args = words.map(str::to_string).collect();
    Some(Command { name, args })
}

/// Event name a command dispatches to, e.g. `PX` -> `COMMAND-PX`.
pub fn command_event(name: &str) -> String {
    format!("COMMAND-{}", name.to_uppercase())
}

/// Event name for a key press on the display, e.g. `KEYDOWN-a`.
pub fn keydown_event(key: char) -> String {
    format!("KEYDOWN-{key}")
}
