use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use super::filter::FilterConfig;
use super::wire::{self, HandshakeReply};
use super::{EventSession, EventSource, RuntimeEvent};
use crate::error::{TelemetryError, TelemetryResult};

/// Opens sessions against a diagnostics endpoint over TCP.
#[derive(Debug, Clone)]
pub struct IpcSource {
    endpoint: String,
}

impl IpcSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn unavailable(&self, source: std::io::Error) -> TelemetryError {
        TelemetryError::SessionOpen {
            endpoint: self.endpoint.clone(),
            source,
        }
    }
}

impl EventSource for IpcSource {
    fn open(&self, filter: &FilterConfig) -> TelemetryResult<Arc<dyn EventSession>> {
        let socket = TcpStream::connect(&self.endpoint).map_err(|e| self.unavailable(e))?;

        let mut request = serde_json::to_string(filter)
            .map_err(|e| TelemetryError::Handshake(format!("unencodable filter: {e}")))?;
        request.push('\n');
        (&socket)
            .write_all(request.as_bytes())
            .map_err(|e| self.unavailable(e))?;

        let mut reader = BufReader::new(socket.try_clone().map_err(|e| self.unavailable(e))?);
        let mut reply = Vec::new();
        if wire::read_record(&mut reader, &mut reply).map_err(|e| self.unavailable(e))? == 0 {
            return Err(TelemetryError::Handshake(
                "endpoint closed the connection during handshake".to_string(),
            ));
        }
        let reply: HandshakeReply = serde_json::from_slice(&reply)
            .map_err(|e| TelemetryError::Handshake(format!("unreadable reply: {e}")))?;
        if !reply.accepted {
            return Err(TelemetryError::Handshake(
                reply.reason.unwrap_or_else(|| "session rejected".to_string()),
            ));
        }

        debug!(endpoint = %self.endpoint, provider = %filter.provider, keywords = ?filter.keywords, "session opened");
        Ok(Arc::new(IpcSession {
            socket,
            reader: Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        }))
    }
}

struct IpcSession {
    socket: TcpStream,
    reader: Mutex<Option<BufReader<TcpStream>>>,
    closed: AtomicBool,
}

impl IpcSession {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl EventSession for IpcSession {
    fn process(&self, sink: &mut dyn FnMut(RuntimeEvent)) -> TelemetryResult<()> {
        let mut reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TelemetryError::StreamFault("session is already being processed".to_string()))?;

        let mut line = Vec::new();
        loop {
            if self.is_closed() {
                return Err(TelemetryError::StreamClosed);
            }
            match wire::read_record(&mut reader, &mut line) {
                Ok(0) if self.is_closed() => return Err(TelemetryError::StreamClosed),
                Ok(0) => {
                    trace!("endpoint ended the stream");
                    return Ok(());
                }
                Ok(_) => {
                    if let Some(event) = wire::decode_record(&line)? {
                        sink(event);
                    }
                }
                Err(_) if self.is_closed() => return Err(TelemetryError::StreamClosed),
                Err(e) => return Err(TelemetryError::StreamIo(e)),
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Unblocks a reader parked in a socket read on another thread.
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            trace!(error = %e, "socket already shut down");
        }
    }
}
