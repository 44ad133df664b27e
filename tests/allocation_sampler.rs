use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use gcwatch::allocations::{AllocationLevel, AllocationSampler, AllocationSink};
use gcwatch::collections::{CollectionId, CollectionKind, CollectionReason};
use gcwatch::session::{
    AllocationSample, CollectionStart, EventSource, FilterConfig, Keywords, ListenerState,
    RuntimeEvent, SyntheticSource,
};

const PATIENCE: Duration = Duration::from_secs(5);

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[derive(Default)]
struct RecordingSink {
    samples: Mutex<Vec<AllocationSample>>,
}

impl RecordingSink {
    fn names(&self) -> Vec<String> {
        self.samples
            .lock()
            .expect("sink lock")
            .iter()
            .map(|s| s.type_name.clone())
            .collect()
    }
}

impl AllocationSink for RecordingSink {
    fn record(&self, sample: &AllocationSample) {
        self.samples.lock().expect("sink lock").push(sample.clone());
    }
}

fn sample(type_name: &str, bytes: u64) -> RuntimeEvent {
    RuntimeEvent::AllocationSample(AllocationSample {
        type_name: type_name.to_string(),
        type_id: 0x7ff0_0010,
        object_count: 1,
        total_size_bytes: bytes,
        timestamp_relative_ms: 5.0,
    })
}

#[test]
fn test_level_keywords() {
    assert_eq!(AllocationLevel::None.keywords(), Keywords::empty());
    assert_eq!(
        AllocationLevel::Some.keywords(),
        Keywords::ALLOCATION_SAMPLING_LOW | Keywords::HEAP_AND_TYPE_NAMES
    );
    assert_eq!(
        AllocationLevel::Most.keywords(),
        Keywords::ALLOCATION_SAMPLING_HIGH | Keywords::HEAP_AND_TYPE_NAMES
    );
    assert_eq!(
        AllocationLevel::All.keywords(),
        Keywords::ALLOCATION_SAMPLING_ALL | Keywords::HEAP_AND_TYPE_NAMES
    );
}

#[test]
fn test_level_parsing() {
    assert_eq!("MOST".parse::<AllocationLevel>().expect("parses"), AllocationLevel::Most);
    assert_eq!("off".parse::<AllocationLevel>().expect("parses"), AllocationLevel::None);
    assert!("plenty".parse::<AllocationLevel>().is_err());
    assert_eq!(AllocationLevel::default(), AllocationLevel::Some);
}

#[test]
fn test_disabled_level_starts_nothing() {
    let (source, feed) = SyntheticSource::new();
    let source: Arc<dyn EventSource> = Arc::new(source);
    let sink = Arc::new(RecordingSink::default());

    let sampler =
        AllocationSampler::start(source, &FilterConfig::collections(), AllocationLevel::None, sink)
            .expect("start");

    assert_eq!(sampler.level(), AllocationLevel::None);
    assert_eq!(sampler.state(), None);
    assert!(!sampler.is_running());
    assert_eq!(feed.opened_sessions(), 0);
    sampler.dispose();
}

#[test]
fn test_samples_are_forwarded_in_order() {
    let (source, feed) = SyntheticSource::new();
    let source: Arc<dyn EventSource> = Arc::new(source);
    let sink = Arc::new(RecordingSink::default());

    let sampler = AllocationSampler::start(
        source,
        &FilterConfig::collections(),
        AllocationLevel::Most,
        Arc::clone(&sink) as Arc<dyn AllocationSink>,
    )
    .expect("start");
    assert!(feed.wait_for_sessions(1, PATIENCE));

    assert_eq!(feed.emit(sample("System.String", 64)), 1);
    assert_eq!(feed.emit(sample("System.Byte[]", 8192)), 1);
    let start = RuntimeEvent::CollectionStart(CollectionStart {
        id: CollectionId::new(1, 1),
        timestamp: SystemTime::now(),
        reason: CollectionReason::AllocSmall,
        depth: 0,
        kind: CollectionKind::NonConcurrent,
        timestamp_relative_ms: 1.0,
    });
    assert_eq!(feed.emit(start), 0, "sampler session must not subscribe to collections");

    assert!(wait_until(|| sink.names().len() == 2));
    assert_eq!(sink.names(), vec!["System.String", "System.Byte[]"]);

    sampler.dispose();
    assert!(wait_until(|| !sampler.is_running()));
    assert_eq!(sampler.state(), Some(ListenerState::Disposed));
}

#[test]
fn test_unavailable_endpoint_is_contained() {
    let source: Arc<dyn EventSource> = Arc::new(SyntheticSource::unavailable("denied"));
    let sampler = AllocationSampler::start(
        source,
        &FilterConfig::collections(),
        AllocationLevel::All,
        Arc::new(RecordingSink::default()),
    )
    .expect("start");

    assert!(wait_until(|| !sampler.is_running()));
    assert_eq!(sampler.state(), Some(ListenerState::Failed));
}
