//! History Recorder
//!
//! Samples the publication bridge once per history interval, appends the
//! sample to the [`HistoryStore`] and writes it to its day partition. The
//! first sample is taken immediately at startup.
//!
//! Append and persist happen in the same synchronous step, so a reading is on
//! disk before a later append could evict it from the ring. A failed persist
//! is logged and counted; the reading stays in the in-memory history.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bridge::PublicationBridge;
use crate::data::{HistoryStore, RecordLog};
use crate::measurement_types::{Reading, SensorStatus};
use crate::metrics::ServiceMetrics;

/// What a single sampling step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The reading was appended; `persisted` is the file written, if any
    Recorded {
        /// Reading appended to the history
        reading: Reading,
        /// Day partition written, `None` if persisting failed
        persisted: Option<PathBuf>,
    },
    /// The bridge had no raw value; nothing was appended
    Skipped,
}

/// Periodic bridge sampler feeding history and the record log
pub struct HistoryRecorder {
    bridge: Arc<dyn PublicationBridge>,
    history: Arc<HistoryStore>,
    log: RecordLog,
    interval: Duration,
    cm_divisor: u64,
    metrics: Option<ServiceMetrics>,
}

impl HistoryRecorder {
    /// Sample `bridge` every `interval` into `history` and `log`
    pub fn new(
        bridge: Arc<dyn PublicationBridge>,
        history: Arc<HistoryStore>,
        log: RecordLog,
        interval: Duration,
        cm_divisor: u64,
    ) -> Self {
        Self {
            bridge,
            history,
            log,
            interval,
            cm_divisor,
            metrics: None,
        }
    }

    /// Count appends and persist results in `metrics`
    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Take one sample now.
    pub fn record_now(&self) -> RecordOutcome {
        let Some(raw_ticks) = self.bridge.distance_raw() else {
            warn!("Distance unreadable, skipping history sample");
            return RecordOutcome::Skipped;
        };
        let status = self
            .bridge
            .status()
            .map(|label| SensorStatus::from_label(&label))
            .unwrap_or(SensorStatus::Error);

        let reading = Reading::new(Local::now(), raw_ticks, status, self.cm_divisor);

        if let Some(evicted) = self.history.append(reading.clone()) {
            debug!(
                evicted = %evicted.timestamp.format("%Y-%m-%d %H:%M:%S"),
                "History full, dropped oldest reading"
            );
        }

        let persisted = match self.log.persist(&reading) {
            Ok(path) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_persisted();
                }
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "Failed to persist reading");
                if let Some(metrics) = &self.metrics {
                    metrics.persist_failed();
                }
                None
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_history_entries(self.history.len());
        }
        debug!(
            raw_ticks = reading.raw_ticks,
            distance_cm = reading.distance_cm,
            status = %reading.status,
            "Recorded history sample"
        );

        RecordOutcome::Recorded { reading, persisted }
    }

    /// Sample immediately, then once per interval, until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = ?self.interval,
            capacity = self.history.capacity(),
            directory = %self.log.directory().display(),
            "History recorder started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.record_now();
                }
            }
        }

        info!(entries = self.history.len(), "History recorder stopped");
    }
}
