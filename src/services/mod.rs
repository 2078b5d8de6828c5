pub mod coalescer;
pub mod event_sink;
pub mod poll_loop;
pub mod window_provider;

pub use coalescer::CoalescerConfig;
pub use event_sink::create_event_sink;
pub use poll_loop::{PollLoop, PollLoopSettings};
pub use window_provider::create_window_provider;
