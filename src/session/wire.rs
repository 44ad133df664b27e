//! Newline-delimited JSON records spoken by the diagnostics endpoint.
//!
//! A client opens a session by writing one [`FilterConfig`] line and reading
//! one [`HandshakeReply`] line. After that the endpoint streams one
//! [`WireRecord`] per line until either side closes the connection.

use std::io::{self, BufRead, Read};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::event::{AllocationSample, CollectionStart, CollectionStop, RuntimeEvent};
use super::filter::EventLevel;
use crate::collections::record::{CollectionId, CollectionKind, CollectionReason};
use crate::error::{TelemetryError, TelemetryResult};
use crate::notifications::{NoticePhase, WaitStatus};

/// Longest record accepted, newline excluded.
pub const MAX_RECORD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeReply {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireRecord {
    CollectionStart {
        instance: u16,
        count: u32,
        reason: CollectionReason,
        depth: u32,
        #[serde(rename = "type")]
        collection_type: CollectionKind,
        timestamp_unix_ms: u64,
        timestamp_relative_ms: f64,
    },
    CollectionStop {
        instance: u16,
        count: u32,
        timestamp_relative_ms: f64,
    },
    AllocationSample(AllocationSample),
    FullCollectionNotice {
        phase: NoticePhase,
        status: WaitStatus,
    },
    Diagnostic {
        level: EventLevel,
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl WireRecord {
    pub fn into_event(self) -> Option<RuntimeEvent> {
        let event = match self {
            WireRecord::CollectionStart {
                instance,
                count,
                reason,
                depth,
                collection_type,
                timestamp_unix_ms,
                timestamp_relative_ms,
            } => RuntimeEvent::CollectionStart(CollectionStart {
                id: CollectionId::new(instance, count),
                timestamp: UNIX_EPOCH
                    .checked_add(Duration::from_millis(timestamp_unix_ms))
                    .unwrap_or(UNIX_EPOCH),
                reason,
                depth,
                kind: collection_type,
                timestamp_relative_ms,
            }),
            WireRecord::CollectionStop {
                instance,
                count,
                timestamp_relative_ms,
            } => RuntimeEvent::CollectionStop(CollectionStop {
                id: CollectionId::new(instance, count),
                timestamp_relative_ms,
            }),
            WireRecord::AllocationSample(sample) => RuntimeEvent::AllocationSample(sample),
            WireRecord::FullCollectionNotice { phase, status } => {
                RuntimeEvent::FullCollectionNotice { phase, status }
            }
            WireRecord::Diagnostic { level, message } => RuntimeEvent::Diagnostic { level, message },
            WireRecord::Unknown => return None,
        };
        Some(event)
    }
}

impl From<&RuntimeEvent> for WireRecord {
    fn from(event: &RuntimeEvent) -> Self {
        match event {
            RuntimeEvent::CollectionStart(start) => WireRecord::CollectionStart {
                instance: start.id.instance,
                count: start.id.sequence,
                reason: start.reason,
                depth: start.depth,
                collection_type: start.kind,
                timestamp_unix_ms: unix_millis(start.timestamp),
                timestamp_relative_ms: start.timestamp_relative_ms,
            },
            RuntimeEvent::CollectionStop(stop) => WireRecord::CollectionStop {
                instance: stop.id.instance,
                count: stop.id.sequence,
                timestamp_relative_ms: stop.timestamp_relative_ms,
            },
            RuntimeEvent::AllocationSample(sample) => WireRecord::AllocationSample(sample.clone()),
            RuntimeEvent::FullCollectionNotice { phase, status } => WireRecord::FullCollectionNotice {
                phase: *phase,
                status: *status,
            },
            RuntimeEvent::Diagnostic { level, message } => WireRecord::Diagnostic {
                level: *level,
                message: message.clone(),
            },
        }
    }
}

/// Reads one line into `buf`, newline included, stopping one byte past
/// [`MAX_RECORD_BYTES`]. Returns the bytes read; zero at end of stream.
pub fn read_record<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    buf.clear();
    reader.take(MAX_RECORD_BYTES as u64 + 1).read_until(b'\n', buf)
}

/// Decodes a line filled by [`read_record`]. A line cut off at the size
/// limit fails with [`TelemetryError::StreamDecode`].
pub fn decode_record(buf: &[u8]) -> TelemetryResult<Option<RuntimeEvent>> {
    if buf.len() > MAX_RECORD_BYTES && buf.last() != Some(&b'\n') {
        let preview = String::from_utf8_lossy(&buf[..80]);
        return Err(TelemetryError::StreamDecode {
            line: format!("{preview}..."),
            source: serde::de::Error::custom(format!("record exceeds {MAX_RECORD_BYTES} bytes")),
        });
    }
    decode_line(&String::from_utf8_lossy(buf))
}

/// Decodes one line. `Ok(None)` means a blank line or a record kind this
/// crate does not understand.
pub fn decode_line(line: &str) -> TelemetryResult<Option<RuntimeEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let record: WireRecord =
        serde_json::from_str(line).map_err(|source| TelemetryError::StreamDecode {
            line: line.to_string(),
            source,
        })?;
    if record == WireRecord::Unknown {
        tracing::trace!(line, "skipping unrecognised record");
    }
    Ok(record.into_event())
}

/// Encodes one event as a line, newline included.
pub fn encode_event(event: &RuntimeEvent) -> String {
    // WireRecord holds only plain data; serialisation cannot fail.
    let mut line = serde_json::to_string(&WireRecord::from(event)).unwrap_or_default();
    line.push('\n');
    line
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
