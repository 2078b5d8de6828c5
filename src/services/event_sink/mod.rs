//! EventSink service: responsibility and boundaries
//!
//! This module is responsible ONLY for delivering ActivityEvent operations
//! (append / replace-last) to a bucket of the event store. It MUST NOT decide
//! when events are created or extended; that belongs to HeartbeatCoalescer.

mod http;
mod memory;
mod r#trait;

pub use self::http::HttpEventSink;
pub use self::memory::MemorySink;
pub use self::r#trait::{apply_operation, create_event_sink, EventSink};
