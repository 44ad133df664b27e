use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, trace};

use super::subscribers::{Notice, SubscriptionId, Subscribers};
use super::waiter::{FullCollectionWaiter, WaitStatus};
use crate::error::{TelemetryError, TelemetryResult};

struct Shared {
    approaching: AtomicBool,
    disposed: AtomicBool,
    subscribers: Subscribers,
}

/// Watches for full collections on a dedicated thread.
///
/// Each cycle blocks on the approach wait, then on the completion wait.
/// Disposal is cooperative: a wait already in progress is not interrupted,
/// and the thread exits the next time the loop regains control.
pub struct FullCollectionWatcher {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FullCollectionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullCollectionWatcher")
            .field("approaching", &self.approaching())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl FullCollectionWatcher {
    /// Starts the watch loop. `backoff` is slept between cycles.
    pub fn start<W: FullCollectionWaiter>(waiter: W, backoff: Duration) -> TelemetryResult<Self> {
        let shared = Arc::new(Shared {
            approaching: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            subscribers: Subscribers::default(),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("gc-notifications".to_string())
            .spawn(move || watch(&thread_shared, waiter, backoff))
            .map_err(TelemetryError::ListenerSpawn)?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// True between a successful approach wait and the end of the matching
    /// completion wait.
    pub fn approaching(&self) -> bool {
        self.shared.approaching.load(Ordering::Acquire)
    }

    pub fn on_approaching<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Notice) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(Notice::Approaching, callback)
    }

    pub fn on_complete<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Notice) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(Notice::Complete, callback)
    }

    pub fn on_cancelled<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Notice) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(Notice::Cancelled, callback)
    }

    /// Every notice, in order, as a channel.
    pub fn subscribe_channel(&self) -> (SubscriptionId, UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.shared.subscribers.subscribe_all(move |notice| {
            let _ = tx.send(notice);
        });
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.unsubscribe(id)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Asks the loop to stop. Idempotent and non-blocking.
    pub fn dispose(&self) {
        if !self.shared.disposed.swap(true, Ordering::AcqRel) {
            debug!("watcher disposal requested");
        }
    }
}

impl Drop for FullCollectionWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn watch<W: FullCollectionWaiter>(shared: &Shared, mut waiter: W, backoff: Duration) {
    debug!("watcher started");

    while !shared.disposed.load(Ordering::Acquire) {
        match waiter.wait_for_approach() {
            WaitStatus::Succeeded => {
                shared.approaching.store(true, Ordering::Release);
                debug!("full collection approaching");
                shared.subscribers.notify(Notice::Approaching);

                let status = waiter.wait_for_complete();
                shared.approaching.store(false, Ordering::Release);
                if status == WaitStatus::Succeeded {
                    debug!("full collection complete");
                    shared.subscribers.notify(Notice::Complete);
                } else {
                    // Anything short of completion closes the announced cycle.
                    debug!(?status, "full collection cancelled");
                    shared.subscribers.notify(Notice::Cancelled);
                }
            }
            WaitStatus::Canceled => {
                debug!("full collection cancelled");
                shared.subscribers.notify(Notice::Cancelled);
            }
            status => trace!(?status, "approach wait returned without outcome"),
        }

        if backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(backoff);
        }
    }

    shared.approaching.store(false, Ordering::Release);
    debug!("watcher stopped");
}
