//! Behavior engine — owns the Lua state that gives the protocol its meaning,
//! and the loader that hot-swaps the script when its file changes on disk.
//!
//! Scripts never see the engine. They get exactly one capability, `on(event,
//! handler)`, plus the canvas and session handles passed into each handler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use mlua::{AnyUserData, Function, Lua, MultiValue, Table, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use pixelflood_core::canvas::Canvas;
use pixelflood_core::protocol::{EVENT_DISCONNECT, EVENT_LOAD, EVENT_UNLOAD};

use crate::bus::EventBus;
use crate::lua_api::{CanvasHandle, SessionHandle};
use crate::session::Session;

/// How often the loader checks the script file for changes.
const RELOAD_POLL: Duration = Duration::from_secs(1);

/// Lua runtime plus the plumbing to marshal server events into it.
pub struct BehaviorEngine {
    lua: Lua,
    bus: Arc<EventBus>,
    canvas_handle: AnyUserData,
    /// One stable userdata per live session, so scripts can key tables by it.
    session_handles: Mutex<HashMap<Uuid, AnyUserData>>,
}

impl BehaviorEngine {
    pub fn new(canvas: Arc<Mutex<Canvas>>, bus: Arc<EventBus>) -> anyhow::Result<Self> {
        let lua = Lua::new();
        let canvas_handle = lua.create_userdata(CanvasHandle::new(canvas))?;
        Ok(Self {
            lua,
            bus,
            canvas_handle,
            session_handles: Mutex::new(HashMap::new()),
        })
    }

    /// Fire an event with the standard argument convention:
    /// `handler(canvas [, session] [, args...])`.
    ///
    /// Returns false only when no handler is registered for the event.
    pub fn fire(&self, event: &str, session: Option<&Arc<Session>>, args: &[String]) -> bool {
        match self.event_args(session, args) {
            Ok(values) => self.bus.fire(event, values),
            Err(e) => {
                // Must not look like a missing handler, that kicks clients.
                error!(event = %event, error = %e, "Could not marshal event arguments");
                true
            }
        }
    }

    /// Tear a session down and fire DISCONNECT exactly once, no matter how
    /// many paths (EOF, eviction, script kick, protocol error) race to it.
    pub fn disconnect(&self, session: &Arc<Session>) {
        session.close_outbox();
        if session.begin_teardown() {
            self.fire(EVENT_DISCONNECT, Some(session), &[]);
            self.session_handles.lock().unwrap().remove(&session.id());
        }
    }

    /// Swap the behavior script: UNLOAD to the old handlers, clear the
    /// table, run `source` in a fresh environment, then LOAD to the new
    /// handlers. Dispatch stays locked throughout, so no client or tick
    /// event can interleave with a half-swapped script.
    ///
    /// Errors roll nothing back. A script that fails to parse leaves the
    /// table empty; one that dies partway through execution leaves whatever
    /// it registered before the error. LOAD fires only on success.
    pub fn reload(&self, source: &str, origin: &str) -> anyhow::Result<()> {
        let _dispatch = self.bus.lock_dispatch();

        self.bus.fire_locked(EVENT_UNLOAD, self.event_args(None, &[])?);
        self.bus.clear_all();

        let env = self.fresh_env(origin)?;
        self.lua
            .load(source)
            .set_name(format!("@{origin}"))
            .set_environment(env)
            .exec()?;

        self.bus.fire_locked(EVENT_LOAD, self.event_args(None, &[])?);
        Ok(())
    }

    /// Environment for one script load: the standard globals copied into a
    /// fresh table, the `on` capability, and the script's own path. Globals
    /// a script creates die with its environment at the next reload.
    fn fresh_env(&self, origin: &str) -> mlua::Result<Table> {
        let env = self.lua.create_table()?;
        for pair in self.lua.globals().pairs::<Value, Value>() {
            let (key, value) = pair?;
            env.set(key, value)?;
        }

        let bus = self.bus.clone();
        let on = self
            .lua
            .create_function(move |_, (event, handler): (String, Function)| {
                bus.register(event, handler);
                Ok(())
            })?;
        env.set("on", on)?;
        env.set("__file__", origin)?;
        Ok(env)
    }

    fn event_args(
        &self,
        session: Option<&Arc<Session>>,
        args: &[String],
    ) -> mlua::Result<MultiValue> {
        let mut values = Vec::with_capacity(2 + args.len());
        values.push(Value::UserData(self.canvas_handle.clone()));
        if let Some(session) = session {
            values.push(Value::UserData(self.session_handle(session)?));
        }
        for arg in args {
            values.push(Value::String(self.lua.create_string(arg)?));
        }
        Ok(MultiValue::from_vec(values))
    }

    fn session_handle(&self, session: &Arc<Session>) -> mlua::Result<AnyUserData> {
        let mut handles = self.session_handles.lock().unwrap();
        if let Some(handle) = handles.get(&session.id()) {
            return Ok(handle.clone());
        }
        let handle = self
            .lua
            .create_userdata(SessionHandle::new(session.clone()))?;
        handles.insert(session.id(), handle.clone());
        Ok(handle)
    }
}

/// Polls the behavior script's mtime and reloads it through the engine.
pub struct BehaviorLoader {
    engine: Arc<BehaviorEngine>,
    path: PathBuf,
    /// mtime of the last successful load. `None` until one succeeds, so the
    /// first poll always loads.
    loaded_mtime: Option<SystemTime>,
}

impl BehaviorLoader {
    pub fn new(engine: Arc<BehaviorEngine>, path: PathBuf) -> Self {
        Self {
            engine,
            path,
            loaded_mtime: None,
        }
    }

    /// Poll forever. The first interval tick fires immediately, so the
    /// initial load happens right at startup.
    pub async fn watch(mut self) {
        info!(path = %self.path.display(), "Behavior loader started");
        let mut interval = tokio::time::interval(RELOAD_POLL);
        loop {
            interval.tick().await;
            self.poll().await;
        }
    }

    /// Reload when the file's mtime has moved past the last loaded one.
    ///
    /// A failed load does not advance the mark: the broken script gets
    /// retried every poll until it loads, and until then the handler table
    /// stays empty.
    async fn poll(&mut self) {
        let mtime = match tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
        {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Behavior script unreadable");
                return;
            }
        };
        if self.loaded_mtime.is_some_and(|seen| mtime <= seen) {
            return;
        }

        let source = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Behavior script unreadable");
                return;
            }
        };

        let origin = self.path.display().to_string();
        match self.engine.reload(&source, &origin) {
            Ok(()) => {
                info!(path = %origin, handlers = self.engine.bus.len(), "Behavior script loaded");
                self.loaded_mtime = Some(mtime);
            }
            Err(e) => error!(path = %origin, error = %e, "Behavior reload failed"),
        }
    }
}
