use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Result of one blocking full-collection wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    Succeeded,
    Failed,
    Canceled,
    Timeout,
    /// Notifications are not registered, or their source has gone away.
    NotApplicable,
}

/// Which of the two waits a status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticePhase {
    Approach,
    Complete,
}

/// The runtime's two-phase full-collection wait primitive.
///
/// Both calls block the calling thread until the runtime reports an outcome.
pub trait FullCollectionWaiter: Send + 'static {
    fn wait_for_approach(&mut self) -> WaitStatus;
    fn wait_for_complete(&mut self) -> WaitStatus;
}

/// Creates an in-process waiter and the trigger that drives it.
pub fn channel_waiter() -> (ChannelWaiter, WaiterTrigger) {
    let (approach_tx, approach_rx) = mpsc::unbounded_channel();
    let (complete_tx, complete_rx) = mpsc::unbounded_channel();
    (
        ChannelWaiter {
            approach: approach_rx,
            complete: complete_rx,
        },
        WaiterTrigger {
            approach: approach_tx,
            complete: complete_tx,
        },
    )
}

/// Waiter fed by a [`WaiterTrigger`]. Once every trigger is dropped, both
/// waits return [`WaitStatus::NotApplicable`] immediately.
#[derive(Debug)]
pub struct ChannelWaiter {
    approach: UnboundedReceiver<WaitStatus>,
    complete: UnboundedReceiver<WaitStatus>,
}

impl FullCollectionWaiter for ChannelWaiter {
    fn wait_for_approach(&mut self) -> WaitStatus {
        self.approach.blocking_recv().unwrap_or(WaitStatus::NotApplicable)
    }

    fn wait_for_complete(&mut self) -> WaitStatus {
        self.complete.blocking_recv().unwrap_or(WaitStatus::NotApplicable)
    }
}

#[derive(Debug, Clone)]
pub struct WaiterTrigger {
    approach: UnboundedSender<WaitStatus>,
    complete: UnboundedSender<WaitStatus>,
}

impl WaiterTrigger {
    /// Queues an outcome for the next wait of `phase`. Returns `false` once
    /// the waiter is gone.
    pub fn post(&self, phase: NoticePhase, status: WaitStatus) -> bool {
        let tx = match phase {
            NoticePhase::Approach => &self.approach,
            NoticePhase::Complete => &self.complete,
        };
        tx.send(status).is_ok()
    }

    pub fn approach(&self) -> bool {
        self.post(NoticePhase::Approach, WaitStatus::Succeeded)
    }

    pub fn complete(&self) -> bool {
        self.post(NoticePhase::Complete, WaitStatus::Succeeded)
    }

    /// Cancels a full collection that was announced but has not run.
    pub fn cancel(&self) -> bool {
        self.post(NoticePhase::Complete, WaitStatus::Canceled)
    }
}
