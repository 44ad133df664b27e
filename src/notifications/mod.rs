//! Advance notice of full collections.

pub mod relay;
pub mod subscribers;
pub mod waiter;
pub mod watcher;

pub use relay::relay_notices;
pub use subscribers::{Notice, SubscriptionId, Subscribers};
pub use waiter::{
    channel_waiter, ChannelWaiter, FullCollectionWaiter, NoticePhase, WaitStatus, WaiterTrigger,
};
pub use watcher::FullCollectionWatcher;
