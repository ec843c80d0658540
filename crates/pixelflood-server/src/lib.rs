//! Pixelflood server: a shared canvas over a line-based TCP protocol, with
//! all command semantics supplied by a hot-reloadable Lua behavior script.

pub mod behavior;
pub mod bus;
pub mod display;
pub mod listener;
pub mod lua_api;
pub mod rate_limit;
pub mod registry;
pub mod session;
pub mod state;
pub mod ticker;
