//! Runtime memory-manager telemetry.
//!
//! Three background listeners watch a process's memory manager through its
//! diagnostic event stream:
//!
//! - [`CollectionTracker`] pairs collection start/stop events into a
//!   bounded history that any thread can read at any time.
//! - [`AllocationSampler`] forwards allocation samples to a sink.
//! - [`FullCollectionWatcher`] performs the two-phase full-collection wait
//!   and raises approach/complete/cancel notices.
//!
//! Readers never block on, or observe errors from, the listeners. A failed
//! listener logs the failure and goes quiet.

pub mod allocations;
pub mod collections;
pub mod config;
pub mod error;
pub mod notifications;
pub mod session;

pub use allocations::{AllocationLevel, AllocationSampler, AllocationSink, TracingSink};
pub use collections::{CollectionHistory, CollectionId, CollectionRecord, CollectionTracker};
pub use config::{CliArgs, TelemetryConfig};
pub use error::{TelemetryError, TelemetryResult};
pub use notifications::{FullCollectionWatcher, Notice, WaitStatus};
pub use session::{EventSource, FilterConfig, IpcSource, Listener, ListenerState, RuntimeEvent};
