//! Dedicated-thread harness shared by every stream-backed listener.
//!
//! Lifecycle: the thread opens its session, publishes it so `dispose` can
//! close it, then blocks in `process`. Disposal sets a flag and closes the
//! session from the caller's thread; it never waits for the listener thread.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use super::event::forward_diagnostic;
use super::filter::FilterConfig;
use super::{EventSession, EventSource, RuntimeEvent};
use crate::error::{TelemetryError, TelemetryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    Starting = 0,
    Active = 1,
    /// The stream ended on its own.
    Stopped = 2,
    /// The session could not be opened, or the stream failed unexpectedly.
    Failed = 3,
    Disposed = 4,
}

impl ListenerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ListenerState::Starting,
            1 => ListenerState::Active,
            2 => ListenerState::Stopped,
            3 => ListenerState::Failed,
            _ => ListenerState::Disposed,
        }
    }
}

struct Shared {
    name: String,
    disposed: AtomicBool,
    state: AtomicU8,
    session: Mutex<Option<Arc<dyn EventSession>>>,
}

impl Shared {
    fn set_state(&self, state: ListenerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

pub struct Listener {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Listener {
    /// Starts a named thread that streams events matching `filter` into `handler`.
    ///
    /// Diagnostic records are mirrored to the log and never reach `handler`.
    pub fn spawn<H>(
        name: &str,
        source: Arc<dyn EventSource>,
        filter: FilterConfig,
        handler: H,
    ) -> TelemetryResult<Self>
    where
        H: FnMut(RuntimeEvent) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            name: name.to_string(),
            disposed: AtomicBool::new(false),
            state: AtomicU8::new(ListenerState::Starting as u8),
            session: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&thread_shared, source.as_ref(), &filter, handler))
            .map_err(TelemetryError::ListenerSpawn)?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Whether the listener thread has not exited yet.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Closes the stream. Idempotent and non-blocking.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let session = self
            .shared
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.close();
        }
        debug!(listener = %self.shared.name, "listener disposal requested");
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run<H>(shared: &Shared, source: &dyn EventSource, filter: &FilterConfig, mut handler: H)
where
    H: FnMut(RuntimeEvent),
{
    let name = shared.name.as_str();
    info!(listener = name, "listener started");

    let mut dispatch = |event: RuntimeEvent| match event {
        RuntimeEvent::Diagnostic { level, message } => forward_diagnostic(name, level, &message),
        other => handler(other),
    };

    let final_state = match open_and_process(shared, source, filter, &mut dispatch) {
        Ok(()) if shared.is_disposed() => ListenerState::Disposed,
        Ok(()) => ListenerState::Stopped,
        Err(err) if shared.is_disposed() => {
            debug!(listener = name, error = %err, "stream closed by disposal");
            ListenerState::Disposed
        }
        Err(err @ (TelemetryError::SessionOpen { .. } | TelemetryError::Handshake(_))) => {
            error!(listener = name, fatal = true, error = %err, "could not open diagnostics session");
            ListenerState::Failed
        }
        Err(err) => {
            error!(listener = name, error = ?err, "listener failed");
            ListenerState::Failed
        }
    };

    shared.set_state(final_state);
    info!(listener = name, state = ?final_state, "listener stopped");
}

fn open_and_process(
    shared: &Shared,
    source: &dyn EventSource,
    filter: &FilterConfig,
    sink: &mut dyn FnMut(RuntimeEvent),
) -> TelemetryResult<()> {
    let session = source.open(filter)?;
    {
        let mut slot = shared.session.lock().unwrap_or_else(PoisonError::into_inner);
        if shared.is_disposed() {
            // Disposal ran before the session existed; nobody else will close it.
            session.close();
            return Err(TelemetryError::StreamClosed);
        }
        *slot = Some(Arc::clone(&session));
    }
    shared.set_state(ListenerState::Active);
    session.process(sink)
}
