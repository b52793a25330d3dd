//! Query Service
//!
//! Read-only views for the HTTP surface. `latest` goes through the
//! publication bridge and never touches the driver; `history` copies the ring
//! newest first.
//!
//! ```json
//! {"distance_raw": 9450, "distance_cm": 21, "status": "OPERATIONAL"}
//! {"history": [{"date": "2024-03-01", "time": "09:00:00",
//!               "distance_raw": 9450, "distance_cm": 21, "status": "ERROR"}]}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bridge::{PublicationBridge, UNKNOWN_STATUS, UNREADABLE_DISTANCE};
use crate::data::HistoryStore;
use crate::measurement_types::{ticks_to_cm, Reading, SensorStatus};

/// Current measurement as served by `GET /sensor/srf05`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestReading {
    /// Raw ticks, `-1` when unreadable
    pub distance_raw: i64,
    /// Centimeters, `-1` when the raw value is unreadable
    pub distance_cm: i64,
    /// `OPERATIONAL`, `ERROR` or `UNKNOWN`
    pub status: String,
}

/// One history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `YYYY-MM-DD`, local time
    pub date: String,
    /// `HH:MM:SS`, local time
    pub time: String,
    /// Raw ticks read from the bridge
    pub distance_raw: u64,
    /// Captured when the reading was appended
    pub distance_cm: u64,
    /// `OPERATIONAL` or `ERROR`
    pub status: String,
}

impl From<&Reading> for HistoryEntry {
    fn from(reading: &Reading) -> Self {
        Self {
            date: reading.date_string(),
            time: reading.time_string(),
            distance_raw: reading.raw_ticks,
            distance_cm: reading.distance_cm,
            status: reading.status.as_str().to_string(),
        }
    }
}

/// History as served by `GET /sensor/srf05/history`, newest first
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Newest entry first
    pub history: Vec<HistoryEntry>,
}

/// Read side shared by all request handlers
#[derive(Clone)]
pub struct QueryService {
    bridge: Arc<dyn PublicationBridge>,
    history: Arc<HistoryStore>,
    cm_divisor: u64,
}

impl QueryService {
    /// Serve `bridge` and `history`; `cm_divisor` converts raw bridge values
    pub fn new(bridge: Arc<dyn PublicationBridge>, history: Arc<HistoryStore>, cm_divisor: u64) -> Self {
        Self {
            bridge,
            history,
            cm_divisor,
        }
    }

    /// Latest values from the bridge.
    ///
    /// Centimeters are derived from the raw value here, not read from the
    /// bridge, so the two fields always agree. With an external publisher its
    /// divisor must equal ours; see [`cm_divisor_agrees`](crate::bridge::cm_divisor_agrees).
    pub fn latest(&self) -> LatestReading {
        let (distance_raw, distance_cm) = match self.bridge.distance_raw() {
            Some(raw) => (
                saturating_i64(raw),
                saturating_i64(ticks_to_cm(raw, self.cm_divisor)),
            ),
            None => (UNREADABLE_DISTANCE, UNREADABLE_DISTANCE),
        };

        LatestReading {
            distance_raw,
            distance_cm,
            status: normalize_status(self.bridge.status()),
        }
    }

    /// Snapshot of the history ring, newest first.
    pub fn history(&self) -> HistoryResponse {
        HistoryResponse {
            history: self
                .history
                .snapshot_newest_first()
                .iter()
                .map(HistoryEntry::from)
                .collect(),
        }
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("history_len", &self.history.len())
            .field("cm_divisor", &self.cm_divisor)
            .finish_non_exhaustive()
    }
}

fn normalize_status(label: Option<String>) -> String {
    let operational = SensorStatus::Operational.as_str();
    let error = SensorStatus::Error.as_str();
    match label.as_deref().map(str::trim) {
        Some(l) if l == operational => operational.to_string(),
        Some(l) if l == error => error.to_string(),
        _ => UNKNOWN_STATUS.to_string(),
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
