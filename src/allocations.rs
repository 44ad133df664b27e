//! Allocation-rate sampling.
//!
//! Samples are forwarded one by one to an [`AllocationSink`]; nothing is
//! retained here.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{TelemetryError, TelemetryResult};
use crate::session::{
    AllocationSample, EventSource, FilterConfig, Keywords, Listener, ListenerState, RuntimeEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationLevel {
    /// Sampling off; no listener thread is started.
    None,
    #[default]
    Some,
    Most,
    All,
}

impl AllocationLevel {
    /// Keyword mask requested from the session at this level.
    pub fn keywords(self) -> Keywords {
        let sampling = match self {
            AllocationLevel::None => return Keywords::empty(),
            AllocationLevel::Some => Keywords::ALLOCATION_SAMPLING_LOW,
            AllocationLevel::Most => Keywords::ALLOCATION_SAMPLING_HIGH,
            AllocationLevel::All => Keywords::ALLOCATION_SAMPLING_ALL,
        };
        sampling | Keywords::HEAP_AND_TYPE_NAMES
    }
}

impl fmt::Display for AllocationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationLevel::None => "none",
            AllocationLevel::Some => "some",
            AllocationLevel::Most => "most",
            AllocationLevel::All => "all",
        };
        f.write_str(name)
    }
}

impl FromStr for AllocationLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(AllocationLevel::None),
            "some" | "low" => Ok(AllocationLevel::Some),
            "most" | "high" => Ok(AllocationLevel::Most),
            "all" => Ok(AllocationLevel::All),
            other => Err(TelemetryError::Config(format!(
                "unknown allocation level {other:?}, expected none, some, most or all"
            ))),
        }
    }
}

/// Destination for allocation samples.
pub trait AllocationSink: Send + Sync {
    fn record(&self, sample: &AllocationSample);
}

/// Writes each sample as one `info` line on target `gcwatch::allocations`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AllocationSink for TracingSink {
    fn record(&self, sample: &AllocationSample) {
        info!(
            target: "gcwatch::allocations",
            type_name = %sample.type_name,
            type_id = sample.type_id,
            objects = sample.object_count,
            bytes = sample.total_size_bytes,
            at_ms = sample.timestamp_relative_ms,
            "allocation sample"
        );
    }
}

#[derive(Debug)]
pub struct AllocationSampler {
    level: AllocationLevel,
    listener: Option<Listener>,
}

impl AllocationSampler {
    /// Starts sampling at `level`. The provider and verbosity come from
    /// `base`; its keywords are replaced by the level's mask.
    pub fn start(
        source: Arc<dyn EventSource>,
        base: &FilterConfig,
        level: AllocationLevel,
        sink: Arc<dyn AllocationSink>,
    ) -> TelemetryResult<Self> {
        if level == AllocationLevel::None {
            info!("allocation sampling disabled");
            return Ok(Self {
                level,
                listener: None,
            });
        }

        let filter = FilterConfig {
            keywords: level.keywords(),
            ..base.clone()
        };
        let listener = Listener::spawn("gc-allocations", source, filter, move |event| {
            if let RuntimeEvent::AllocationSample(sample) = event {
                sink.record(&sample);
            }
        })?;

        Ok(Self {
            level,
            listener: Some(listener),
        })
    }

    pub fn level(&self) -> AllocationLevel {
        self.level
    }

    pub fn state(&self) -> Option<ListenerState> {
        self.listener.as_ref().map(Listener::state)
    }

    pub fn is_running(&self) -> bool {
        self.listener.as_ref().is_some_and(Listener::is_running)
    }

    pub fn dispose(&self) {
        if let Some(listener) = &self.listener {
            listener.dispose();
        }
    }
}
