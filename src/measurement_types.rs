//! Measurement data types shared by the driver, the history and the query service.
//!
//! A measurement starts life as a [`Fragment`] produced by one `measure()` call,
//! sits in the sensor state until the next tick overwrites it, and is turned
//! into a timestamped [`Reading`] when the history recorder samples it.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational state reported alongside every raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorStatus {
    /// The last measurement completed within both timeout budgets.
    #[default]
    Operational,
    /// The sensor did not answer, or the echo never ended.
    Error,
}

impl SensorStatus {
    /// Label used on the wire and in the record log.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Operational => "OPERATIONAL",
            SensorStatus::Error => "ERROR",
        }
    }

    /// Map a published status label back to a status.
    ///
    /// Only the exact label `OPERATIONAL` counts as operational; anything
    /// else, including `UNKNOWN`, is an error for recording purposes.
    pub fn from_label(label: &str) -> Self {
        if label.trim() == "OPERATIONAL" {
            SensorStatus::Operational
        } else {
            SensorStatus::Error
        }
    }

    /// Whether this status carries a meaningful distance.
    pub fn is_operational(&self) -> bool {
        matches!(self, SensorStatus::Operational)
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one trigger/echo cycle.
///
/// When `status` is `Error`, `raw_ticks` is the value of the last successful
/// measurement (the driver never overwrites it on a timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fragment {
    /// Echo pulse width in driver poll iterations
    pub raw_ticks: u64,
    /// Outcome of the measurement
    pub status: SensorStatus,
}

impl Fragment {
    /// Centimeters for this raw value with the given divisor.
    pub fn distance_cm(&self, cm_divisor: u64) -> u64 {
        ticks_to_cm(self.raw_ticks, cm_divisor)
    }
}

/// A timestamped reading as kept in the history and written to the record log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock time the reading was taken
    pub timestamp: DateTime<Local>,
    /// Echo pulse width in driver poll iterations
    pub raw_ticks: u64,
    /// `raw_ticks / cm_divisor`, captured when the reading was created
    pub distance_cm: u64,
    /// Sensor status at the time of the reading
    pub status: SensorStatus,
}

impl Reading {
    /// Build a reading, deriving the centimeter value from `raw_ticks`.
    pub fn new(
        timestamp: DateTime<Local>,
        raw_ticks: u64,
        status: SensorStatus,
        cm_divisor: u64,
    ) -> Self {
        Self {
            timestamp,
            raw_ticks,
            distance_cm: ticks_to_cm(raw_ticks, cm_divisor),
            status,
        }
    }

    /// Build a reading from a driver fragment.
    pub fn from_fragment(timestamp: DateTime<Local>, fragment: Fragment, cm_divisor: u64) -> Self {
        Self::new(timestamp, fragment.raw_ticks, fragment.status, cm_divisor)
    }

    /// Local calendar date, `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    /// Local time of day, `HH:MM:SS`.
    pub fn time_string(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Integer conversion from raw ticks to centimeters.
///
/// A zero divisor is rejected by configuration validation; it maps to 0 here
/// rather than panicking.
pub fn ticks_to_cm(raw_ticks: u64, cm_divisor: u64) -> u64 {
    raw_ticks.checked_div(cm_divisor).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_labels() {
        assert_eq!(SensorStatus::Operational.as_str(), "OPERATIONAL");
        assert_eq!(SensorStatus::Error.to_string(), "ERROR");
        assert_eq!(SensorStatus::from_label("OPERATIONAL\n"), SensorStatus::Operational);
        assert_eq!(SensorStatus::from_label("ERROR"), SensorStatus::Error);
        assert_eq!(SensorStatus::from_label("UNKNOWN"), SensorStatus::Error);
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&SensorStatus::Operational).unwrap();
        assert_eq!(json, "\"OPERATIONAL\"");
    }

    #[test]
    fn test_reading_derives_cm_by_integer_division() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 8, 5, 9).unwrap();
        let reading = Reading::new(ts, 4_499, SensorStatus::Operational, 450);
        assert_eq!(reading.distance_cm, 9);
        assert_eq!(reading.date_string(), "2024-03-01");
        assert_eq!(reading.time_string(), "08:05:09");
    }

    #[test]
    fn test_zero_divisor_does_not_panic() {
        assert_eq!(ticks_to_cm(1000, 0), 0);
    }
}
