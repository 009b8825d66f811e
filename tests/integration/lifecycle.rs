//! Lifecycle tests
//!
//! These tests drive a monitor through start, stop and reconfiguration:
//! - Start/stop transitions and their errors
//! - First delivery and document contents
//! - Interval changes between two deliveries
//! - Per-session reset of snapshots, counters and consumers

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use host_telemetry::{ErrorCode, MonitorError, RunState};
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::helpers::*;

#[test]
fn test_start_then_is_running() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));

    monitor.start(100).unwrap();

    assert!(monitor.is_running());
    assert_eq!(monitor.run_state(), RunState::Running);
    assert_eq!(monitor.interval(), Duration::from_millis(100));

    monitor.stop();
}

#[test]
fn test_start_rejects_out_of_range_intervals() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));

    for interval in [i32::MIN, -1, 0, 99, 3_600_001, i32::MAX] {
        assert_matches!(monitor.start(interval), Err(MonitorError::InvalidInterval(i)) if i == interval);
        assert_eq!(monitor.last_error(), ErrorCode::InvalidInterval);
        assert!(!monitor.is_running());
    }
}

#[test]
fn test_double_start_keeps_original_worker() {
    let collector = Arc::new(FakeCollector::default());
    let monitor = create_test_monitor(collector.clone());

    monitor.start(100).unwrap();
    assert_matches!(monitor.start(100), Err(MonitorError::AlreadyRunning));
    assert_eq!(monitor.last_error(), ErrorCode::AlreadyRunning);
    assert!(monitor.is_running());

    // Original worker keeps cycling
    let cycles = monitor.cycle_count();
    assert!(wait_until(Duration::from_secs(3), || monitor.cycle_count() > cycles + 1));

    monitor.stop();
}

#[test]
fn test_stop_on_idle_is_noop() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let _ = monitor.set_interval(5);
    assert_eq!(monitor.last_error(), ErrorCode::InvalidInterval);

    monitor.stop();

    assert!(!monitor.is_running());
    assert_eq!(monitor.last_error(), ErrorCode::InvalidInterval);
}

#[test]
fn test_double_stop_is_idempotent() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(2), || monitor.cycle_count() > 0));

    monitor.stop();
    let after_first = (
        monitor.run_state(),
        monitor.last_error(),
        monitor.cycle_count(),
        monitor.uptime(),
        monitor.last_update(),
    );

    monitor.stop();
    let after_second = (
        monitor.run_state(),
        monitor.last_error(),
        monitor.cycle_count(),
        monitor.uptime(),
        monitor.last_update(),
    );

    assert_eq!(after_first, after_second);
    assert_eq!(after_first.0, RunState::Idle);
    assert_eq!(after_first.2, 0);
    assert_eq!(after_first.3, Duration::ZERO);
    assert_eq!(after_first.4, None);
}

#[test]
fn test_first_document_within_five_cycles() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let recorder = Arc::new(RecordingConsumer::default());
    monitor.set_consumer(Some(recorder.clone()));

    monitor.start(100).unwrap();

    assert!(wait_until(Duration::from_secs(3), || recorder.count() > 0));
    // documents are delivered at the end of a cycle, before the counter moves
    assert!(monitor.cycle_count() <= 5);

    let document: Value = serde_json::from_str(&recorder.documents()[0]).unwrap();
    assert_eq!(document["cpu"][0]["name"], "Test CPU");
    assert_eq!(document["gpu"][0]["type"], "iGPU");
    assert_eq!(document["memory"]["usage_percent"], 75);
    assert_eq!(document["network"]["ethernet"][0]["ip_address"], "192.168.1.10");
    assert_eq!(document["battery"]["is_desktop"], true);
    assert!(document["timestamp"].is_string());

    monitor.stop();
    assert_eq!(monitor.last_error(), ErrorCode::Success);
}

#[test]
fn test_document_emitted_on_first_complete_cycle() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let recorder = Arc::new(RecordingConsumer::default());
    monitor.set_consumer(Some(recorder.clone()));

    // One-hour interval: only the first cycle can run in this test
    monitor.start(3_600_000).unwrap();

    assert!(wait_until(Duration::from_secs(2), || recorder.count() == 1));
    assert!(wait_until(Duration::from_secs(1), || monitor.cycle_count() == 1));

    monitor.stop();
}

#[test]
fn test_set_interval_changes_gap_between_documents() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let recorder = Arc::new(RecordingConsumer::default());
    monitor.set_consumer(Some(recorder.clone()));

    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(2), || recorder.count() > 0));

    monitor.set_interval(250).unwrap();
    assert_eq!(monitor.interval(), Duration::from_millis(250));

    // Let the sleep that started before the change run out
    std::thread::sleep(Duration::from_millis(150));
    recorder.reset();
    assert!(wait_until(Duration::from_secs(3), || recorder.count() >= 3));
    monitor.stop();

    let arrivals = recorder.arrivals();
    for pair in arrivals.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= Duration::from_millis(250), "gap too short: {gap:?}");
        assert!(gap < Duration::from_millis(250 + 200), "gap too long: {gap:?}");
    }
}

#[test]
fn test_trigger_now_cuts_sleep_short() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let recorder = Arc::new(RecordingConsumer::default());
    monitor.set_consumer(Some(recorder.clone()));

    monitor.start(3_600_000).unwrap();
    assert!(wait_until(Duration::from_secs(2), || recorder.count() == 1));

    monitor.trigger_now().unwrap();
    assert!(wait_until(Duration::from_secs(2), || recorder.count() == 2));

    monitor.stop();
}

#[test]
fn test_stop_interrupts_long_sleep() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    monitor.start(3_600_000).unwrap();
    assert!(wait_until(Duration::from_secs(2), || monitor.cycle_count() == 1));

    let started = Instant::now();
    monitor.stop();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(monitor.last_error(), ErrorCode::Success);
}

#[test]
fn test_static_snapshot_collected_once_per_session() {
    let collector = Arc::new(FakeCollector::default());
    let monitor = create_test_monitor(collector.clone());

    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(3), || monitor.cycle_count() >= 3));
    monitor.stop();

    assert_eq!(collector.static_calls.load(Ordering::SeqCst), 1);
    assert!(collector.dynamic_calls.load(Ordering::SeqCst) >= 3);

    // A new session starts from scratch
    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(2), || monitor.cycle_count() >= 1));
    monitor.stop();

    assert_eq!(collector.static_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_stop_detaches_consumer() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let recorder = Arc::new(RecordingConsumer::default());
    monitor.set_consumer(Some(recorder.clone()));

    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(2), || recorder.count() > 0));
    monitor.stop();

    let delivered = recorder.count();
    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(2), || monitor.cycle_count() >= 2));
    monitor.stop();

    assert_eq!(recorder.count(), delivered);
}

#[test]
fn test_uptime_and_last_update_track_session() {
    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    assert_eq!(monitor.uptime(), Duration::ZERO);
    assert!(monitor.last_update().is_none());

    monitor.start(100).unwrap();
    std::thread::sleep(Duration::from_millis(150));

    assert!(monitor.uptime() >= Duration::from_millis(150));
    assert!(monitor.last_update().is_some());

    monitor.stop();
    assert_eq!(monitor.uptime(), Duration::ZERO);
    assert!(monitor.last_update().is_none());
}

#[test]
fn test_start_after_stop_resets_error() {
    let collector = Arc::new(FailingDynamicCollector::default());
    let monitor = create_test_monitor(collector.clone());

    monitor.start(100).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        monitor.last_error() == ErrorCode::DataCollectionFailed
    }));
    monitor.stop();

    // stop keeps the last error for inspection
    assert_eq!(monitor.last_error(), ErrorCode::DataCollectionFailed);

    // The next session on the same monitor starts clean
    collector.recovered.store(true, Ordering::SeqCst);
    monitor.start(3_600_000).unwrap();
    assert_eq!(monitor.last_error(), ErrorCode::Success);
    assert!(wait_until(Duration::from_secs(2), || monitor.cycle_count() == 1));
    assert_eq!(monitor.last_error(), ErrorCode::Success);
    monitor.stop();

    let monitor = create_test_monitor(Arc::new(FakeCollector::default()));
    let _ = monitor.start(1);
    monitor.start(100).unwrap();
    assert_eq!(monitor.last_error(), ErrorCode::Success);
    monitor.stop();
}

#[test]
fn test_drop_stops_worker() {
    let collector = Arc::new(FakeCollector::default());
    {
        let monitor = create_test_monitor(collector.clone());
        monitor.start(100).unwrap();
        assert!(wait_until(Duration::from_secs(2), || monitor.cycle_count() > 0));
    }

    let calls = collector.dynamic_calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(collector.dynamic_calls.load(Ordering::SeqCst), calls);
}
