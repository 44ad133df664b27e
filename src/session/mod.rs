//! Live diagnostic event streams.
//!
//! A listener owns exactly one session. The session's `process` call blocks
//! the listener's thread; `close` may be called from any other thread at any
//! time and makes a blocked `process` return.

pub mod event;
pub mod filter;
pub mod ipc;
pub mod listener;
pub mod synthetic;
pub mod wire;

use std::sync::Arc;

use crate::error::TelemetryResult;

pub use event::{AllocationSample, CollectionStart, CollectionStop, RuntimeEvent};
pub use filter::{EventLevel, FilterConfig, Keywords, RUNTIME_PROVIDER};
pub use ipc::IpcSource;
pub use listener::{Listener, ListenerState};
pub use synthetic::{SyntheticFeed, SyntheticSource};

/// Something that can open a filtered event stream.
pub trait EventSource: Send + Sync {
    fn open(&self, filter: &FilterConfig) -> TelemetryResult<Arc<dyn EventSession>>;
}

/// An open event stream.
pub trait EventSession: Send + Sync {
    /// Decodes records and hands each to `sink` until the stream ends
    /// (`Ok`) or fails. After `close` the call returns promptly, usually
    /// with [`TelemetryError::StreamClosed`](crate::TelemetryError::StreamClosed).
    fn process(&self, sink: &mut dyn FnMut(RuntimeEvent)) -> TelemetryResult<()>;

    /// Idempotent.
    fn close(&self);
}
