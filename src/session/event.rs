use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::filter::{EventLevel, FilterConfig};
use crate::collections::record::{CollectionId, CollectionKind, CollectionReason};
use crate::notifications::{NoticePhase, WaitStatus};

/// Decoded collection-start event.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStart {
    pub id: CollectionId,
    pub timestamp: SystemTime,
    pub reason: CollectionReason,
    pub depth: u32,
    pub kind: CollectionKind,
    pub timestamp_relative_ms: f64,
}

/// Decoded collection-stop event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionStop {
    pub id: CollectionId,
    pub timestamp_relative_ms: f64,
}

/// A sampled allocation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSample {
    pub type_name: String,
    pub type_id: u64,
    pub object_count: u32,
    pub total_size_bytes: u64,
    pub timestamp_relative_ms: f64,
}

/// Everything a session can hand to its listener.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    CollectionStart(CollectionStart),
    CollectionStop(CollectionStop),
    AllocationSample(AllocationSample),
    /// Outcome of one of the runtime's full-collection waits, relayed by
    /// endpoints that watch the process from outside.
    FullCollectionNotice { phase: NoticePhase, status: WaitStatus },
    /// Any other runtime record, mirrored to the log at its own level.
    Diagnostic { level: EventLevel, message: String },
}

impl RuntimeEvent {
    /// Whether a session opened with `filter` delivers this event.
    pub fn passes(&self, filter: &FilterConfig) -> bool {
        match self {
            RuntimeEvent::CollectionStart(_)
            | RuntimeEvent::CollectionStop(_)
            | RuntimeEvent::FullCollectionNotice { .. } => filter.wants_collections(),
            RuntimeEvent::AllocationSample(_) => filter.wants_allocations(),
            RuntimeEvent::Diagnostic { level, .. } => filter.admits_level(*level),
        }
    }
}

/// Mirrors a diagnostic record to tracing at the matching severity.
pub fn forward_diagnostic(listener: &str, level: EventLevel, message: &str) {
    match level {
        EventLevel::Verbose => tracing::trace!(listener, "{message}"),
        EventLevel::Informational => tracing::debug!(listener, "{message}"),
        EventLevel::Warning => tracing::warn!(listener, "{message}"),
        EventLevel::Error => tracing::error!(listener, "{message}"),
        EventLevel::Critical => tracing::error!(listener, critical = true, "{message}"),
    }
}
