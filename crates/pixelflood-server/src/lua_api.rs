//! Lua-facing handles for the canvas and for client sessions.
//!
//! Behavior scripts only ever see these userdata wrappers; the underlying
//! canvas and session objects stay on the Rust side.

use std::sync::{Arc, Mutex};

use mlua::{MetaMethod, MultiValue, UserData, UserDataMethods, Value};

use pixelflood_core::canvas::{Canvas, Rgb};

use crate::session::Session;

/// `canvas` userdata: `get`, `set`, `clear`, `size`.
pub struct CanvasHandle {
    canvas: Arc<Mutex<Canvas>>,
}

impl CanvasHandle {
    pub fn new(canvas: Arc<Mutex<Canvas>>) -> Self {
        Self { canvas }
    }
}

impl UserData for CanvasHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // canvas:get(x, y) -> r, g, b | nil
        methods.add_method("get", |_, this, (x, y): (i64, i64)| {
            let canvas = this.canvas.lock().unwrap();
            let pixel = coord(x, y).and_then(|(x, y)| canvas.get(x, y));
            Ok(match pixel {
                Some(p) => MultiValue::from_vec(vec![
                    Value::Integer(p.r as i64),
                    Value::Integer(p.g as i64),
                    Value::Integer(p.b as i64),
                ]),
                None => MultiValue::from_vec(vec![Value::Nil]),
            })
        });

        // canvas:set(x, y, r, g, b [, a]) — out-of-range coordinates are
        // dropped, out-of-range channels are a script error.
        methods.add_method(
            "set",
            |_, this, (x, y, r, g, b, a): (i64, i64, u8, u8, u8, Option<u8>)| {
                if let Some((x, y)) = coord(x, y) {
                    let mut canvas = this.canvas.lock().unwrap();
                    canvas.set(x, y, Rgb::new(r, g, b), a.unwrap_or(0xff));
                }
                Ok(())
            },
        );

        // canvas:clear([r, g, b]) — solid fill, defaults to black. A fourth
        // argument is accepted and ignored; clear never blends.
        methods.add_method(
            "clear",
            |_, this, (r, g, b, _a): (Option<u8>, Option<u8>, Option<u8>, Option<u8>)| {
                let mut canvas = this.canvas.lock().unwrap();
                canvas.clear(Rgb::new(r.unwrap_or(0), g.unwrap_or(0), b.unwrap_or(0)));
                Ok(())
            },
        );

        // canvas:size() -> width, height
        methods.add_method("size", |_, this, ()| {
            let canvas = this.canvas.lock().unwrap();
            Ok(canvas.size())
        });
    }
}

fn coord(x: i64, y: i64) -> Option<(u32, u32)> {
    Some((u32::try_from(x).ok()?, u32::try_from(y).ok()?))
}

/// `session` userdata: `send`, `disconnect`, `addr`, plus `tostring`.
pub struct SessionHandle {
    session: Arc<Session>,
}

impl SessionHandle {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl UserData for SessionHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // session:send(line) — queues line + newline; silently dropped once
        // the session is gone.
        methods.add_method("send", |_, this, line: String| {
            this.session.send(&line);
            Ok(())
        });

        // session:disconnect() — closes the connection. The session's own
        // task notices and runs the full teardown, including DISCONNECT.
        methods.add_method("disconnect", |_, this, ()| {
            this.session.close_outbox();
            Ok(())
        });

        // session:addr() -> "ip:port"
        methods.add_method("addr", |_, this, ()| Ok(this.session.addr().to_string()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(this.session.to_string())
        });
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use mlua::Lua;
    use tokio::sync::mpsc;

    use super::*;

    fn test_canvas() -> (Arc<Mutex<Canvas>>, Lua) {
        let canvas = Arc::new(Mutex::new(Canvas::new(4, 4, 1)));
        let lua = Lua::new();
        lua.globals()
            .set("canvas", CanvasHandle::new(canvas.clone()))
            .unwrap();
        (canvas, lua)
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:41234".parse().unwrap()
    }

    #[test]
    fn set_and_get_round_trip() {
        let (canvas, lua) = test_canvas();
        lua.load(
            r#"
            canvas:set(1, 2, 255, 128, 0)
            local r, g, b = canvas:get(1, 2)
            assert(r == 255 and g == 128 and b == 0)
        "#,
        )
        .exec()
        .unwrap();
        assert_eq!(
            canvas.lock().unwrap().get(1, 2),
            Some(Rgb::new(255, 128, 0))
        );
    }

    #[test]
    fn get_out_of_bounds_is_nil() {
        let (_canvas, lua) = test_canvas();
        lua.load(
            r#"
            assert(canvas:get(99, 0) == nil)
            assert(canvas:get(0, -1) == nil)
        "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn set_out_of_bounds_is_dropped() {
        let (canvas, lua) = test_canvas();
        lua.load("canvas:set(99, 99, 1, 2, 3)").exec().unwrap();
        lua.load("canvas:set(-1, 0, 1, 2, 3, 128)").exec().unwrap();
        assert_eq!(canvas.lock().unwrap().get(0, 0), Some(Rgb::BLACK));
    }

    #[test]
    fn set_with_alpha_blends() {
        let (canvas, lua) = test_canvas();
        lua.load("canvas:set(0, 0, 255, 255, 255, 128)")
            .exec()
            .unwrap();
        assert_eq!(
            canvas.lock().unwrap().get(0, 0),
            Some(Rgb::new(128, 128, 128))
        );
    }

    #[test]
    fn channel_out_of_range_is_an_error() {
        let (_canvas, lua) = test_canvas();
        assert!(lua.load("canvas:set(0, 0, 300, 0, 0)").exec().is_err());
    }

    #[test]
    fn clear_defaults_to_black() {
        let (canvas, lua) = test_canvas();
        lua.load("canvas:set(1, 1, 9, 9, 9) canvas:clear()")
            .exec()
            .unwrap();
        assert_eq!(canvas.lock().unwrap().get(1, 1), Some(Rgb::BLACK));

        lua.load("canvas:clear(10, 20, 30, 77)").exec().unwrap();
        assert_eq!(canvas.lock().unwrap().get(3, 3), Some(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn size_returns_both_dimensions() {
        let (_canvas, lua) = test_canvas();
        lua.load(
            r#"
            local w, h = canvas:size()
            assert(w == 4 and h == 4)
        "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn session_send_reaches_the_outbox() {
        let session = Arc::new(Session::new(test_addr()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.attach(tx);

        let lua = Lua::new();
        lua.globals()
            .set("session", SessionHandle::new(session))
            .unwrap();
        lua.load(r#"session:send("HELLO 1")"#).exec().unwrap();
        assert_eq!(rx.try_recv().unwrap(), "HELLO 1");
    }

    #[test]
    fn session_disconnect_closes_the_outbox() {
        let session = Arc::new(Session::new(test_addr()));
        let (tx, _rx) = mpsc::unbounded_channel();
        session.attach(tx);

        let lua = Lua::new();
        lua.globals()
            .set("session", SessionHandle::new(session.clone()))
            .unwrap();
        lua.load("session:disconnect()").exec().unwrap();
        assert!(!session.is_connected());
        // Further sends are silent no-ops.
        lua.load(r#"session:send("late")"#).exec().unwrap();
    }

    #[test]
    fn session_is_printable_from_lua() {
        let session = Arc::new(Session::new(test_addr()));
        let lua = Lua::new();
        lua.globals()
            .set("session", SessionHandle::new(session))
            .unwrap();
        let shown: String = lua.load("return tostring(session)").eval().unwrap();
        assert!(shown.contains("127.0.0.1:41234"));

        let addr: String = lua.load("return session:addr()").eval().unwrap();
        assert_eq!(addr, "127.0.0.1:41234");
    }
}
