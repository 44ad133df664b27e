use std::io;

use thiserror::Error;

/// Failures surfaced by the telemetry listeners.
///
/// None of these ever reach a reader of the collected data. They are
/// classified and logged on the listener thread that produced them.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("diagnostics endpoint {endpoint} unavailable: {source}")]
    SessionOpen {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("session handshake failed: {0}")]
    Handshake(String),

    #[error("malformed event record {line:?}: {source}")]
    StreamDecode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event stream closed")]
    StreamClosed,

    #[error("event stream read failed: {0}")]
    StreamIo(#[from] io::Error),

    #[error("event stream fault: {0}")]
    StreamFault(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to spawn listener thread: {0}")]
    ListenerSpawn(#[source] io::Error),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
