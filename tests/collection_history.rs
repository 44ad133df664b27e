use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use gcwatch::collections::{
    CollectionHistory, CollectionId, CollectionKind, CollectionReason, CollectionTracker,
};
use gcwatch::session::{CollectionStart, CollectionStop};

fn start(id: &str, start_ms: f64) -> CollectionStart {
    CollectionStart {
        id: id.parse().expect("valid id"),
        timestamp: SystemTime::now(),
        reason: CollectionReason::AllocSmall,
        depth: 0,
        kind: CollectionKind::NonConcurrent,
        timestamp_relative_ms: start_ms,
    }
}

fn stop(id: &str, end_ms: f64) -> CollectionStop {
    CollectionStop {
        id: id.parse().expect("valid id"),
        timestamp_relative_ms: end_ms,
    }
}

fn ids(tracker: &CollectionTracker) -> Vec<String> {
    tracker.snapshot().iter().map(|r| r.id.to_string()).collect()
}

#[test]
fn test_start_stop_pair_yields_duration() {
    let tracker = CollectionTracker::detached(10);
    tracker.on_start(CollectionStart {
        id: CollectionId::new(1, 5),
        timestamp: SystemTime::now(),
        reason: CollectionReason::Induced,
        depth: 2,
        kind: CollectionKind::NonConcurrent,
        timestamp_relative_ms: 100.000,
    });
    tracker.on_stop(stop("1-5", 102.345));

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.len(), 1);
    let record = &snapshot[0];
    assert_eq!(record.id.to_string(), "1-5");
    assert_eq!(record.reason, CollectionReason::Induced);
    assert_eq!(record.generation, 2);
    assert!(record.kind.is_blocking());
    let duration = record.duration_ms().expect("completed");
    assert!((duration - 2.345).abs() < 1e-9, "duration was {duration}");
}

#[test]
fn test_capacity_evicts_oldest_first() {
    let tracker = CollectionTracker::detached(2);
    tracker.on_start(start("1-1", 1.0));
    tracker.on_start(start("1-2", 2.0));
    tracker.on_start(start("1-3", 3.0));

    assert_eq!(ids(&tracker), vec!["1-2", "1-3"]);
}

#[test]
fn test_eviction_follows_insertion_not_id_order() {
    let tracker = CollectionTracker::detached(2);
    tracker.on_start(start("1-9", 1.0));
    tracker.on_start(start("2-1", 2.0));
    tracker.on_start(start("1-3", 3.0));

    assert_eq!(ids(&tracker), vec!["2-1", "1-3"]);
}

#[test]
fn test_history_size_after_all_stops() {
    for (count, capacity) in [(5usize, 3usize), (3, 5), (7, 7), (12, 0)] {
        let tracker = CollectionTracker::detached(capacity);
        for n in 0..count {
            tracker.on_start(start(&format!("1-{n}"), n as f64));
        }
        for n in 0..count {
            tracker.on_stop(stop(&format!("1-{n}"), n as f64 + 0.5));
        }

        let expected = if capacity == 0 { count } else { count.min(capacity) };
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), expected, "count {count}, capacity {capacity}");
        assert!(snapshot.iter().all(|r| r.is_complete()));
    }
}

#[test]
fn test_stop_for_unknown_or_evicted_id_is_ignored() {
    let tracker = CollectionTracker::detached(1);
    tracker.on_start(start("1-1", 1.0));
    tracker.on_start(start("1-2", 2.0));
    let before = tracker.snapshot();

    tracker.on_stop(stop("1-1", 5.0)); // evicted
    tracker.on_stop(stop("7-7", 5.0)); // never seen

    let after = tracker.snapshot();
    assert_eq!(before, after);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].duration_ms(), None);
}

#[test]
fn test_in_progress_record_evicted_without_completion() {
    let tracker = CollectionTracker::detached(1);
    tracker.on_start(start("1-1", 1.0));
    tracker.on_start(start("1-2", 2.0));
    tracker.on_stop(stop("1-2", 4.0));

    let snapshot = tracker.snapshot();
    assert_eq!(ids(&tracker), vec!["1-2"]);
    assert_eq!(snapshot[0].duration_ms(), Some(2.0));
}

#[test]
fn test_incomplete_duration_is_sentinel_never_negative() {
    let tracker = CollectionTracker::detached(10);
    tracker.on_start(start("1-1", 50.0));
    assert_eq!(tracker.snapshot()[0].duration_ms(), None);

    // A stop stamped before its start clamps rather than underflowing.
    tracker.on_stop(stop("1-1", 49.0));
    assert_eq!(tracker.snapshot()[0].duration_ms(), Some(0.0));
}

#[test]
fn test_capacity_change_is_lazy() {
    let tracker = CollectionTracker::detached(5);
    for n in 0..5 {
        tracker.on_start(start(&format!("1-{n}"), n as f64));
    }

    tracker.set_capacity(2);
    assert_eq!(tracker.snapshot().len(), 5, "shrink does not trim eagerly");

    tracker.on_start(start("1-5", 5.0));
    assert_eq!(ids(&tracker), vec!["1-4", "1-5"]);
}

#[test]
fn test_zero_capacity_disables_eviction() {
    let tracker = CollectionTracker::detached(2);
    for n in 0..4 {
        tracker.on_start(start(&format!("1-{n}"), n as f64));
    }
    assert_eq!(tracker.snapshot().len(), 2);

    tracker.set_capacity(0);
    for n in 4..10 {
        tracker.on_start(start(&format!("1-{n}"), n as f64));
    }
    assert_eq!(tracker.snapshot().len(), 8);
    assert_eq!(tracker.capacity(), 0);
}

#[test]
fn test_colliding_start_replaces_in_place() {
    let tracker = CollectionTracker::detached(10);
    tracker.on_start(start("1-1", 1.0));
    tracker.on_start(start("1-2", 2.0));
    tracker.on_start(start("1-1", 3.0));

    let snapshot = tracker.snapshot();
    assert_eq!(ids(&tracker), vec!["1-1", "1-2"]);
    assert_eq!(snapshot[0].start_time_relative, 3.0);
}

#[test]
fn test_latest_and_lookup() {
    let history = CollectionHistory::new(3);
    assert!(history.is_empty());
    assert!(history.latest().is_none());

    history.record_start(start("3-1", 1.0));
    history.record_start(start("3-2", 2.0));
    assert_eq!(history.len(), 2);
    assert_eq!(history.latest().map(|r| r.id), Some(CollectionId::new(3, 2)));
    assert!(history.get(CollectionId::new(3, 1)).is_some());
    assert!(history.get(CollectionId::new(9, 9)).is_none());
}

#[test]
fn test_collection_id_text_form() {
    let id: CollectionId = "12-345".parse().expect("parses");
    assert_eq!(id, CollectionId::new(12, 345));
    assert_eq!(id.to_string(), "12-345");

    assert!("12".parse::<CollectionId>().is_err());
    assert!("a-1".parse::<CollectionId>().is_err());
}

#[test]
fn test_snapshots_stay_consistent_under_concurrent_writes() {
    let history = Arc::new(CollectionHistory::new(8));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let history = Arc::clone(&history);
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = history.snapshot();
                    assert!(snapshot.len() <= 8);
                    // Single instance, increasing sequence: insertion order is sequence order.
                    for pair in snapshot.windows(2) {
                        assert!(pair[0].id.sequence < pair[1].id.sequence, "out of order or duplicated");
                    }
                }
            })
        })
        .collect();

    for n in 0..2000u32 {
        history.record_start(start(&format!("1-{n}"), f64::from(n)));
        history.record_stop(stop(&format!("1-{n}"), f64::from(n) + 0.25));
        if n % 500 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert_eq!(history.len(), 8);
}
