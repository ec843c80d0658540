//! Session registry — one live session per client address.
//!
//! A new connection from an address that already has a session evicts the
//! old one first (disconnect event, task abort), so a crashed client that
//! reconnects never strands a ghost. Entries are removed by the session's
//! own teardown, keyed by session id so a late teardown can never remove
//! its successor.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::info;

use crate::behavior::BehaviorEngine;
use crate::rate_limit::Pacing;
use crate::session::{self, Session};

struct RegisteredClient {
    session: Arc<Session>,
    task: JoinHandle<()>,
}

pub struct Registry {
    engine: Arc<BehaviorEngine>,
    pacing: Pacing,
    clients: Mutex<HashMap<IpAddr, RegisteredClient>>,
}

impl Registry {
    pub fn new(engine: Arc<BehaviorEngine>, pacing: Pacing) -> Self {
        Self {
            engine,
            pacing,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Take ownership of an accepted connection and spawn its serve task.
    pub fn admit(self: &Arc<Self>, stream: TcpStream, addr: std::net::SocketAddr) -> Arc<Session> {
        let session = Arc::new(Session::new(addr));
        let mut clients = self.clients.lock().unwrap();

        if let Some(old) = clients.remove(&addr.ip()) {
            info!(peer = %old.session, "Evicting previous session for reconnecting address");
            self.engine.disconnect(&old.session);
            old.task.abort();
        }

        let task = tokio::spawn(session::run(
            session.clone(),
            stream,
            self.engine.clone(),
            self.clone(),
            self.pacing,
        ));
        clients.insert(
            addr.ip(),
            RegisteredClient {
                session: session.clone(),
                task,
            },
        );
        session
    }

    /// Remove a finished session's entry. No-op if the address has already
    /// been taken over by a newer session.
    pub fn release(&self, session: &Session) {
        let mut clients = self.clients.lock().unwrap();
        let ip = session.addr().ip();
        if clients
            .get(&ip)
            .is_some_and(|entry| entry.session.id() == session.id())
        {
            clients.remove(&ip);
        }
    }

    /// Number of registered (live) sessions.
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
