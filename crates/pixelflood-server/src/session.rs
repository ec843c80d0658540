//! One connected client: its outbox, lifecycle latches, and serve loop.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info};
use uuid::Uuid;

use pixelflood_core::protocol::{EVENT_CONNECT, MAX_LINE_BYTES, command_event, parse_line};

use crate::behavior::BehaviorEngine;
use crate::rate_limit::Pacing;
use crate::registry::Registry;

/// A client connection. Cheap to share; all methods take `&self`.
///
/// The outbox sender doubles as the liveness flag: while it is present the
/// session is connected, taking it closes the socket (the writer task exits
/// when its channel senders are gone).
pub struct Session {
    id: Uuid,
    addr: SocketAddr,
    connected_at: DateTime<Utc>,
    outbox: Mutex<Option<mpsc::UnboundedSender<String>>>,
    torn_down: AtomicBool,
}

impl Session {
    pub(crate) fn new(addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr,
            connected_at: Utc::now(),
            outbox: Mutex::new(None),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a line for the client, newline appended by the writer.
    /// Dropped silently when the session is no longer connected.
    pub fn send(&self, line: &str) {
        let outbox = self.outbox.lock().unwrap();
        if let Some(tx) = outbox.as_ref() {
            // The writer may already have exited on a broken pipe.
            let _ = tx.send(line.to_string());
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outbox.lock().unwrap().is_some()
    }

    /// Install the outbox once the writer task is running.
    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<String>) {
        let mut outbox = self.outbox.lock().unwrap();
        *outbox = Some(tx);
    }

    /// Drop the outbox, which closes the connection. Idempotent.
    pub(crate) fn close_outbox(&self) {
        let mut outbox = self.outbox.lock().unwrap();
        outbox.take();
    }

    /// Claim the one-time teardown. Whoever gets `true` fires DISCONNECT.
    pub(crate) fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::SeqCst)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uptime = (Utc::now() - self.connected_at).num_seconds();
        write!(f, "{} [{}s]", self.addr, uptime)
    }
}

/// Serve one client until it leaves, misbehaves, or gets evicted.
pub(crate) async fn run(
    session: Arc<Session>,
    stream: TcpStream,
    engine: Arc<BehaviorEngine>,
    registry: Arc<Registry>,
    pacing: Pacing,
) {
    info!(peer = %session, "Client connected");

    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(write_outbound(writer, rx));

    // CONNECT observes the session before it can be written to; sends from
    // the CONNECT handler are dropped.
    engine.fire(EVENT_CONNECT, Some(&session), &[]);
    session.attach(tx);

    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    'serve: while session.is_connected() {
        // A fresh connection waits out a full window before its first read,
        // so reconnecting never buys extra budget.
        tokio::time::sleep(pacing.window).await;

        for _ in 0..pacing.burst {
            match lines.next().await {
                Some(Ok(line)) => {
                    let Some(command) = parse_line(&line) else {
                        // Blank line: give the rest of this window back.
                        continue 'serve;
                    };
                    let handled =
                        engine.fire(&command_event(&command.name), Some(&session), &command.args);
                    if !handled {
                        debug!(peer = %session, command = %command.name, "Unknown command");
                        break 'serve;
                    }
                    if !session.is_connected() {
                        break 'serve;
                    }
                }
                Some(Err(e)) => {
                    // Oversized line or a socket error; either way the peer is done.
                    debug!(peer = %session, error = %e, "Dropping client");
                    break 'serve;
                }
                None => break 'serve,
            }
        }
    }

    engine.disconnect(&session);
    registry.release(&session);
    debug!(peer = %session, "Client gone");
}

/// Writer half: drains the outbox onto the socket, one line per message.
async fn write_outbound(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}
