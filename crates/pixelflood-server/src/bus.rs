//! Event bus — named events dispatched to handler functions from the
//! loaded behavior script.
//!
//! Registration is last-wins: one handler per event name. Dispatch is
//! serialized through a single mutex so at most one handler runs at a time,
//! no matter how many client tasks fire events concurrently. Handlers can
//! therefore mutate shared state without their own locking, the same
//! guarantee a single-threaded scheduler would give them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use mlua::{Function, MultiValue};
use tracing::warn;

/// Registry of event handlers, keyed by event name.
pub struct EventBus {
    /// Held for the full duration of every handler call.
    dispatch: Mutex<()>,
    handlers: Mutex<HashMap<String, Function>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            dispatch: Mutex::new(()),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handler, replacing any previous one for the same event.
    pub fn register(&self, event: impl Into<String>, handler: Function) {
        let mut handlers = self.handlers.lock().unwrap();
        handlers.insert(event.into(), handler);
    }

    /// Drop every registered handler.
    pub fn clear_all(&self) {
        let mut handlers = self.handlers.lock().unwrap();
        handlers.clear();
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fire an event. Returns false only when no handler is registered;
    /// a handler that errors is logged and still counts as handled.
    pub fn fire(&self, event: &str, args: MultiValue) -> bool {
        let _dispatch = self.dispatch.lock().unwrap();
        self.fire_locked(event, args)
    }

    /// Fire while the caller already holds the dispatch lock.
    pub(crate) fn fire_locked(&self, event: &str, args: MultiValue) -> bool {
        // Clone the function out so a handler can re-register itself (or
        // others) without deadlocking on the table lock.
        let handler = self.handlers.lock().unwrap().get(event).cloned();
        let Some(handler) = handler else {
            return false;
        };

        if let Err(e) = handler.call::<()>(args) {
            warn!(event = %event, error = %e, "Event handler failed");
        }
        true
    }

    /// Take the dispatch lock for a multi-step operation (script reload).
    /// No handler runs anywhere while the guard is held.
    pub(crate) fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use mlua::Lua;

    use super::*;

    fn counting_handler(lua: &Lua, hits: Arc<AtomicU32>) -> Function {
        lua.create_function(move |_, ()| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_fire_without_handler_reports_unhandled() {
        let bus = EventBus::new();
        assert!(!bus.fire("COMMAND-PX", MultiValue::new()));
    }

    #[test]
    fn test_fire_runs_the_handler() {
        let lua = Lua::new();
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU32::new(0));

        bus.register("TICK", counting_handler(&lua, hits.clone()));
        assert!(bus.fire("TICK", MultiValue::new()));
        assert!(bus.fire("TICK", MultiValue::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_last_registration_wins() {
        let lua = Lua::new();
        let bus = EventBus::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        bus.register("CONNECT", counting_handler(&lua, first.clone()));
        bus.register("CONNECT", counting_handler(&lua, second.clone()));
        assert_eq!(bus.len(), 1);

        bus.fire("CONNECT", MultiValue::new());
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_error_still_counts_as_handled() {
        let lua = Lua::new();
        let bus = EventBus::new();

        let failing: Function = lua
            .load("return function() error('boom') end")
            .eval()
            .unwrap();
        bus.register("COMMAND-PX", failing);

        assert!(bus.fire("COMMAND-PX", MultiValue::new()));
    }

    #[test]
    fn test_handler_receives_arguments() {
        let lua = Lua::new();
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen2 = seen.clone();
        let handler = lua
            .create_function(move |_, (a, b): (String, String)| {
                seen2.lock().unwrap().push((a, b));
                Ok(())
            })
            .unwrap();
        bus.register("COMMAND-PX", handler);

        let args = MultiValue::from_vec(vec![
            mlua::Value::String(lua.create_string("10").unwrap()),
            mlua::Value::String(lua.create_string("20").unwrap()),
        ]);
        assert!(bus.fire("COMMAND-PX", args));
        assert_eq!(*seen.lock().unwrap(), vec![("10".into(), "20".into())]);
    }

    #[test]
    fn test_handler_can_register_during_dispatch() {
        let lua = Lua::new();
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicU32::new(0));

        let bus2 = bus.clone();
        let lua2 = lua.clone();
        let hits2 = hits.clone();
        let registering = lua
            .create_function(move |_, ()| {
                bus2.register("LATE", counting_handler(&lua2, hits2.clone()));
                Ok(())
            })
            .unwrap();
        bus.register("LOAD", registering);

        assert!(bus.fire("LOAD", MultiValue::new()));
        assert!(bus.fire("LATE", MultiValue::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_all() {
        let lua = Lua::new();
        let bus = EventBus::new();
        bus.register("TICK", counting_handler(&lua, Arc::new(AtomicU32::new(0))));
        bus.register("QUIT", counting_handler(&lua, Arc::new(AtomicU32::new(0))));
        assert_eq!(bus.len(), 2);

        bus.clear_all();
        assert!(bus.is_empty());
        assert!(!bus.fire("TICK", MultiValue::new()));
    }
}
