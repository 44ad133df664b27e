//! Feeds a [`ChannelWaiter`] from full-collection notices carried on an
//! event stream, for processes observed from outside.

use std::sync::Arc;

use super::waiter::{channel_waiter, ChannelWaiter};
use crate::error::TelemetryResult;
use crate::session::{EventSource, FilterConfig, Listener, RuntimeEvent};

/// Starts a listener that posts every relayed notice to the returned
/// waiter. When the listener stops, the waiter reports
/// [`WaitStatus::NotApplicable`](super::WaitStatus::NotApplicable).
pub fn relay_notices(
    source: Arc<dyn EventSource>,
    filter: FilterConfig,
) -> TelemetryResult<(Listener, ChannelWaiter)> {
    let (waiter, trigger) = channel_waiter();
    let listener = Listener::spawn("gc-notice-relay", source, filter, move |event| {
        if let RuntimeEvent::FullCollectionNotice { phase, status } = event {
            trigger.post(phase, status);
        }
    })?;
    Ok((listener, waiter))
}
