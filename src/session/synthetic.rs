//! In-process event source with deterministic, hand-fed events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::filter::FilterConfig;
use super::{EventSession, EventSource, RuntimeEvent};
use crate::error::{TelemetryError, TelemetryResult};

enum Delivery {
    Event(RuntimeEvent),
    Fault(String),
    End,
    Closed,
}

#[derive(Default)]
struct Hub {
    sessions: Vec<(FilterConfig, UnboundedSender<Delivery>)>,
    refusal: Option<String>,
    opened: usize,
}

fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source half; hand it to listeners.
#[derive(Clone, Default)]
pub struct SyntheticSource {
    hub: Arc<Mutex<Hub>>,
}

/// Feed half; drives every session opened from the paired source.
#[derive(Clone)]
pub struct SyntheticFeed {
    hub: Arc<Mutex<Hub>>,
}

impl SyntheticSource {
    pub fn new() -> (Self, SyntheticFeed) {
        let source = Self::default();
        let feed = SyntheticFeed {
            hub: Arc::clone(&source.hub),
        };
        (source, feed)
    }

    /// A source whose every `open` fails as if the endpoint were unreachable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let source = Self::default();
        lock(&source.hub).refusal = Some(reason.into());
        source
    }
}

impl EventSource for SyntheticSource {
    fn open(&self, filter: &FilterConfig) -> TelemetryResult<Arc<dyn EventSession>> {
        let mut hub = lock(&self.hub);
        if let Some(reason) = &hub.refusal {
            return Err(TelemetryError::SessionOpen {
                endpoint: "synthetic".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason.clone()),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        hub.sessions.push((filter.clone(), tx.clone()));
        hub.opened += 1;
        Ok(Arc::new(SyntheticSession {
            rx: Mutex::new(Some(rx)),
            tx,
            closed: AtomicBool::new(false),
        }))
    }
}

impl SyntheticFeed {
    /// Delivers `event` to every live session whose filter admits it and
    /// returns how many sessions received it.
    pub fn emit(&self, event: RuntimeEvent) -> usize {
        let mut hub = lock(&self.hub);
        hub.sessions.retain(|(_, tx)| !tx.is_closed());
        let mut delivered = 0;
        for (filter, tx) in &hub.sessions {
            if event.passes(filter) && tx.send(Delivery::Event(event.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Makes every live session fail with [`TelemetryError::StreamFault`].
    pub fn fault(&self, message: impl Into<String>) {
        let message = message.into();
        for (_, tx) in &lock(&self.hub).sessions {
            let _ = tx.send(Delivery::Fault(message.clone()));
        }
    }

    /// Ends every live session cleanly.
    pub fn end(&self) {
        for (_, tx) in &lock(&self.hub).sessions {
            let _ = tx.send(Delivery::End);
        }
    }

    /// Sessions whose processing loop has not yet let go of its stream.
    pub fn live_sessions(&self) -> usize {
        lock(&self.hub)
            .sessions
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    /// Total sessions ever opened.
    pub fn opened_sessions(&self) -> usize {
        lock(&self.hub).opened
    }

    /// Polls until `count` sessions have been opened or `timeout` elapses.
    pub fn wait_for_sessions(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.opened_sessions() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

struct SyntheticSession {
    rx: Mutex<Option<UnboundedReceiver<Delivery>>>,
    tx: UnboundedSender<Delivery>,
    closed: AtomicBool,
}

impl EventSession for SyntheticSession {
    fn process(&self, sink: &mut dyn FnMut(RuntimeEvent)) -> TelemetryResult<()> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TelemetryError::StreamFault("session is already being processed".to_string()))?;

        loop {
            match rx.blocking_recv() {
                Some(Delivery::Event(event)) => sink(event),
                Some(Delivery::Fault(message)) => return Err(TelemetryError::StreamFault(message)),
                Some(Delivery::Closed) => return Err(TelemetryError::StreamClosed),
                Some(Delivery::End) | None => return Ok(()),
            }
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(Delivery::Closed);
        }
    }
}
