//! Query service over both bridge implementations.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use srf05_daq::bridge::{StateBridge, SysfsBridge};
use srf05_daq::data::{HistoryStore, RecordLog};
use srf05_daq::measurement_types::{Fragment, SensorStatus};
use srf05_daq::query::QueryService;
use srf05_daq::recorder::HistoryRecorder;
use srf05_daq::state::SensorState;

#[test]
fn test_latest_with_unreadable_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let query = QueryService::new(
        Arc::new(SysfsBridge::new(dir.path().join("gone"))),
        Arc::new(HistoryStore::new(4).unwrap()),
        450,
    );

    let json = serde_json::to_value(query.latest()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"distance_raw": -1, "distance_cm": -1, "status": "UNKNOWN"})
    );
}

#[test]
fn test_latest_from_sysfs_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("distance_raw"), "9450\n").unwrap();
    fs::write(dir.path().join("distance_cm"), "21\n").unwrap();
    fs::write(dir.path().join("status"), "ERROR\n").unwrap();

    let query = QueryService::new(
        Arc::new(SysfsBridge::new(dir.path())),
        Arc::new(HistoryStore::new(4).unwrap()),
        450,
    );
    let latest = query.latest();
    assert_eq!(latest.distance_raw, 9_450);
    assert_eq!(latest.distance_cm, 21);
    assert_eq!(latest.status, "ERROR");
}

#[test]
fn test_empty_history_renders_empty_array() {
    let query = QueryService::new(
        Arc::new(StateBridge::new(SensorState::new(), 450)),
        Arc::new(HistoryStore::new(4).unwrap()),
        450,
    );
    assert_eq!(
        serde_json::to_string(&query.history()).unwrap(),
        r#"{"history":[]}"#
    );
}

#[test]
fn test_recorded_samples_served_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let state = SensorState::new();
    let bridge = Arc::new(StateBridge::new(state.clone(), 450));
    let history = Arc::new(HistoryStore::new(2).unwrap());
    let recorder = HistoryRecorder::new(
        bridge.clone(),
        history.clone(),
        RecordLog::new(dir.path(), "csv"),
        Duration::from_secs(3600),
        450,
    );
    let query = QueryService::new(bridge, history, 450);

    for (raw, status) in [
        (450, SensorStatus::Operational),
        (900, SensorStatus::Operational),
        (900, SensorStatus::Error),
    ] {
        state.publish(Fragment { raw_ticks: raw, status });
        recorder.record_now();
    }

    let history = query.history().history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, "ERROR");
    assert_eq!(history[1].status, "OPERATIONAL");
    for entry in &history {
        assert_eq!(entry.distance_raw, 900);
        assert_eq!(entry.distance_cm, entry.distance_raw / 450);
        assert_eq!(entry.date.len(), 10);
        assert_eq!(entry.time.len(), 8);
    }
}
