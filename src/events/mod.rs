pub mod window;

pub use window::{ActivityEvent, WindowSnapshot, UNKNOWN};
