use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Composite key of one collection pass.
///
/// The runtime emits no correlation id, so start and stop are paired on the
/// emitting instance plus that instance's monotonically increasing count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId {
    pub instance: u16,
    pub sequence: u32,
}

impl CollectionId {
    pub fn new(instance: u16, sequence: u32) -> Self {
        Self { instance, sequence }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.instance, self.sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCollectionIdError {
    #[error("collection id {0:?} is not of the form <instance>-<sequence>")]
    Shape(String),
    #[error("collection id component is not a number: {0}")]
    Number(#[from] ParseIntError),
}

impl FromStr for CollectionId {
    type Err = ParseCollectionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (instance, sequence) = s
            .split_once('-')
            .ok_or_else(|| ParseCollectionIdError::Shape(s.to_string()))?;
        Ok(Self {
            instance: instance.parse()?,
            sequence: sequence.parse()?,
        })
    }
}

/// Why the runtime started a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionReason {
    AllocSmall,
    Induced,
    LowMemory,
    Empty,
    AllocLarge,
    OutOfSpaceSoh,
    OutOfSpaceLoh,
    InducedNotForced,
    Internal,
    InducedLowMemory,
    InducedCompacting,
    LowMemoryHost,
    PmFullGc,
    LowMemoryHostBlocking,
}

impl fmt::Display for CollectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionReason::AllocSmall => "small object allocation",
            CollectionReason::Induced => "induced",
            CollectionReason::LowMemory => "low memory",
            CollectionReason::Empty => "empty",
            CollectionReason::AllocLarge => "large object allocation",
            CollectionReason::OutOfSpaceSoh => "out of small object heap space",
            CollectionReason::OutOfSpaceLoh => "out of large object heap space",
            CollectionReason::InducedNotForced => "induced, not forced",
            CollectionReason::Internal => "internal",
            CollectionReason::InducedLowMemory => "induced low memory",
            CollectionReason::InducedCompacting => "induced compacting",
            CollectionReason::LowMemoryHost => "host low memory",
            CollectionReason::PmFullGc => "provisional full collection",
            CollectionReason::LowMemoryHostBlocking => "host low memory, blocking",
        };
        f.write_str(name)
    }
}

/// Mode a collection ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Blocking collection; all managed threads are suspended.
    NonConcurrent,
    Background,
    /// Blocking ephemeral collection that runs while a background one is in flight.
    Foreground,
}

impl CollectionKind {
    pub fn is_blocking(self) -> bool {
        !matches!(self, CollectionKind::Background)
    }
}

/// One observed collection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: CollectionId,
    pub timestamp: SystemTime,
    pub reason: CollectionReason,
    pub generation: u32,
    pub kind: CollectionKind,
    /// Milliseconds since the session started.
    pub start_time_relative: f64,
    /// Milliseconds since the session started; `0.0` until the stop event arrives.
    pub end_time_relative: f64,
}

impl CollectionRecord {
    pub fn is_complete(&self) -> bool {
        self.end_time_relative != 0.0
    }

    /// Elapsed milliseconds, or `None` while the collection is still in progress.
    pub fn duration_ms(&self) -> Option<f64> {
        if !self.is_complete() {
            return None;
        }
        Some((self.end_time_relative - self.start_time_relative).max(0.0))
    }
}
