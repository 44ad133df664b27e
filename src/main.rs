//! Poll surface: attaches to a diagnostics endpoint and reports what the
//! listeners see on a fixed cadence until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use gcwatch::notifications::relay_notices;
use gcwatch::{
    AllocationSampler, CliArgs, CollectionTracker, EventSource, FullCollectionWatcher, IpcSource,
    TelemetryConfig, TracingSink,
};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = CliArgs::parse();
    let config = TelemetryConfig::load(&cli)?;
    info!(endpoint = %config.endpoint, capacity = config.history_capacity, allocations = %config.allocation_level, "gcwatch starting");

    let source: Arc<dyn EventSource> = Arc::new(IpcSource::new(config.endpoint.clone()));
    let collections = CollectionTracker::start(
        Arc::clone(&source),
        config.collections_filter(),
        config.history_capacity,
    )?;
    let allocations = AllocationSampler::start(
        Arc::clone(&source),
        &config.allocations_filter(),
        config.allocation_level,
        Arc::new(TracingSink),
    )?;
    let (relay, waiter) = relay_notices(Arc::clone(&source), config.collections_filter())?;
    let notifications = FullCollectionWatcher::start(waiter, config.watcher_backoff())?;
    notifications.on_approaching(|_| warn!("full collection approaching"));
    notifications.on_cancelled(|_| info!("full collection cancelled"));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl-C");
        }
        signal.cancel();
    });

    let mut cadence = interval(config.poll_interval());
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = cadence.tick() => report(&collections, &notifications),
        }
    }

    allocations.dispose();
    collections.dispose();
    relay.dispose();
    notifications.dispose();
    info!("gcwatch stopped");
    Ok(())
}

fn report(collections: &CollectionTracker, notifications: &FullCollectionWatcher) {
    let history = collections.snapshot();
    info!(
        held = history.len(),
        approaching = notifications.approaching(),
        listening = collections.is_running(),
        "poll"
    );
    // Newest first, the way a history table reads.
    for record in history.iter().rev() {
        debug!(
            id = %record.id,
            generation = record.generation,
            reason = %record.reason,
            kind = ?record.kind,
            duration_ms = ?record.duration_ms(),
            "collection"
        );
    }
}
