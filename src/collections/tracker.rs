use std::sync::Arc;

use super::history::CollectionHistory;
use super::record::CollectionRecord;
use crate::error::TelemetryResult;
use crate::session::{
    CollectionStart, CollectionStop, EventSource, FilterConfig, Listener, ListenerState,
    RuntimeEvent,
};

/// Pairs collection start/stop events into a bounded history.
#[derive(Debug)]
pub struct CollectionTracker {
    history: Arc<CollectionHistory>,
    listener: Option<Listener>,
}

impl CollectionTracker {
    /// Starts listening on `source` on a dedicated thread.
    pub fn start(
        source: Arc<dyn EventSource>,
        filter: FilterConfig,
        capacity: usize,
    ) -> TelemetryResult<Self> {
        let history = Arc::new(CollectionHistory::new(capacity));
        let sink = Arc::clone(&history);
        let listener = Listener::spawn("gc-collections", source, filter, move |event| match event {
            RuntimeEvent::CollectionStart(start) => sink.record_start(start),
            RuntimeEvent::CollectionStop(stop) => sink.record_stop(stop),
            _ => {}
        })?;

        Ok(Self {
            history,
            listener: Some(listener),
        })
    }

    /// A tracker with no listener; events are fed through
    /// [`on_start`](Self::on_start) and [`on_stop`](Self::on_stop).
    pub fn detached(capacity: usize) -> Self {
        Self {
            history: Arc::new(CollectionHistory::new(capacity)),
            listener: None,
        }
    }

    pub fn on_start(&self, start: CollectionStart) {
        self.history.record_start(start);
    }

    pub fn on_stop(&self, stop: CollectionStop) {
        self.history.record_stop(stop);
    }

    pub fn snapshot(&self) -> Vec<CollectionRecord> {
        self.history.snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn set_capacity(&self, capacity: usize) {
        self.history.set_capacity(capacity);
    }

    /// Shared handle for readers that outlive or bypass the tracker.
    pub fn history(&self) -> Arc<CollectionHistory> {
        Arc::clone(&self.history)
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
