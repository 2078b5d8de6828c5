//! WindowProvider service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for reading the currently
//! focused window (application + title) on the local machine. Every backend is a
//! WindowProvider; the backend is chosen once at startup (or detected by `auto`).
//! It MUST NOT decide when events are created or extended; all of that belongs
//! to HeartbeatCoalescer.

mod auto;
mod command;
mod dry_run;
mod kdotool;
mod sway;
mod wmctrl;
mod xdotool;
mod xprop;
mod r#trait;

pub use self::r#trait::{create_window_provider, WindowProvider};
