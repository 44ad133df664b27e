use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Provider name of the runtime's own memory-manager events.
pub const RUNTIME_PROVIDER: &str = "Microsoft-Windows-DotNETRuntime";

/// Verbosity of a diagnostic record, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Critical,
    Error,
    Warning,
    #[default]
    Informational,
    Verbose,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventLevel::Critical => "critical",
            EventLevel::Error => "error",
            EventLevel::Warning => "warning",
            EventLevel::Informational => "informational",
            EventLevel::Verbose => "verbose",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Event categories a session subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Keywords: u64 {
        const COLLECTIONS_ONLY = 0x1;
        const ALLOCATION_SAMPLING_LOW = 0x0200_0000;
        const ALLOCATION_SAMPLING_HIGH = 0x0080_0000;
        const ALLOCATION_SAMPLING_ALL = 0x0020_0000;
        const HEAP_AND_TYPE_NAMES = 0x0100_0000;
    }
}

impl Keywords {
    pub const ANY_ALLOCATION_SAMPLING: Keywords = Keywords::ALLOCATION_SAMPLING_LOW
        .union(Keywords::ALLOCATION_SAMPLING_HIGH)
        .union(Keywords::ALLOCATION_SAMPLING_ALL);
}

/// Selection passed to [`EventSource::open`](super::EventSource::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub provider: String,
    pub verbosity: EventLevel,
    pub keywords: Keywords,
}

impl FilterConfig {
    pub fn new(provider: impl Into<String>, verbosity: EventLevel, keywords: Keywords) -> Self {
        Self {
            provider: provider.into(),
            verbosity,
            keywords,
        }
    }

    /// Runtime provider, informational, collection events only.
    pub fn collections() -> Self {
        Self::new(RUNTIME_PROVIDER, EventLevel::Informational, Keywords::COLLECTIONS_ONLY)
    }

    /// Whether a diagnostic record at `level` passes this filter.
    pub fn admits_level(&self, level: EventLevel) -> bool {
        level <= self.verbosity
    }

    pub fn wants_collections(&self) -> bool {
        self.keywords.contains(Keywords::COLLECTIONS_ONLY)
    }

    pub fn wants_allocations(&self) -> bool {
        self.keywords.intersects(Keywords::ANY_ALLOCATION_SAMPLING)
    }
}
