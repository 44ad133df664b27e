use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use uuid::Uuid;

/// Notification raised by the full-collection watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    Approaching,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type Callback = Arc<dyn Fn(Notice) + Send + Sync>;

struct Entry {
    id: SubscriptionId,
    /// `None` receives every notice.
    notice: Option<Notice>,
    callback: Callback,
}

/// Registry of notice callbacks.
#[derive(Default)]
pub struct Subscribers {
    entries: Mutex<Vec<Entry>>,
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers").field("len", &self.len()).finish()
    }
}

impl Subscribers {
    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, notice: Option<Notice>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.entries().push(Entry {
            id,
            notice,
            callback,
        });
        id
    }

    pub fn subscribe<F>(&self, notice: Notice, callback: F) -> SubscriptionId
    where
        F: Fn(Notice) + Send + Sync + 'static,
    {
        self.add(Some(notice), Arc::new(callback))
    }

    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Notice) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(callback))
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes matching callbacks on the calling thread, with the registry
    /// unlocked so callbacks may subscribe or unsubscribe.
    pub fn notify(&self, notice: Notice) {
        let targets: Vec<Callback> = self
            .entries()
            .iter()
            .filter(|entry| entry.notice.map_or(true, |wanted| wanted == notice))
            .map(|entry| Arc::clone(&entry.callback))
            .collect();
        for callback in targets {
            callback(notice);
        }
    }
}
