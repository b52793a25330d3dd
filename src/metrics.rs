//! Prometheus metrics for the rangefinder daemon.
//!
//! # Metrics Exposed
//!
//! ## Counters
//! - `srf05_measurements_total`: trigger/echo cycles run by the scheduler
//! - `srf05_measurement_errors_total`: cycles that ended with status ERROR
//! - `srf05_persisted_records_total`: lines appended to day partitions
//! - `srf05_persist_failures_total`: readings that could not be persisted
//! - `srf05_http_requests_total`: requests handled by the query server
//!
//! ## Gauges
//! - `srf05_last_raw_ticks`: raw value of the latest published fragment
//! - `srf05_history_entries`: readings currently held in the history ring
//!
//! Every [`ServiceMetrics`] owns its registry, so tests and multiple daemons
//! in one process never collide on metric names.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Registry, TextEncoder,
};

use crate::error::AppResult;
use crate::measurement_types::Fragment;

/// Metrics shared by the scheduler, the recorder and the server.
///
/// Cheap to clone; all clones update the same registry.
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Measurement cycles run
    pub measurements_total: IntCounter,

    /// Measurement cycles ending in ERROR
    pub measurement_errors_total: IntCounter,

    /// Raw ticks of the latest published fragment
    pub last_raw_ticks: IntGauge,

    /// Readings held in the history ring
    pub history_entries: IntGauge,

    /// Lines appended to day partitions
    pub persisted_records_total: IntCounter,

    /// Failed persist attempts
    pub persist_failures_total: IntCounter,

    /// HTTP requests served
    pub http_requests_total: IntCounter,
}

impl ServiceMetrics {
    /// Create the metrics on a fresh registry
    pub fn new() -> AppResult<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create the metrics and register them with `registry`
    pub fn with_registry(registry: Registry) -> AppResult<Self> {
        let measurements_total = register_int_counter_with_registry!(
            "srf05_measurements_total",
            "Total trigger/echo cycles run",
            registry
        )?;

        let measurement_errors_total = register_int_counter_with_registry!(
            "srf05_measurement_errors_total",
            "Total trigger/echo cycles that ended with status ERROR",
            registry
        )?;

        let last_raw_ticks = register_int_gauge_with_registry!(
            "srf05_last_raw_ticks",
            "Raw distance of the latest published measurement",
            registry
        )?;

        let history_entries = register_int_gauge_with_registry!(
            "srf05_history_entries",
            "Readings currently held in the history ring",
            registry
        )?;

        let persisted_records_total = register_int_counter_with_registry!(
            "srf05_persisted_records_total",
            "Total records appended to day partition files",
            registry
        )?;

        let persist_failures_total = register_int_counter_with_registry!(
            "srf05_persist_failures_total",
            "Total readings that could not be persisted",
            registry
        )?;

        let http_requests_total = register_int_counter_with_registry!(
            "srf05_http_requests_total",
            "Total HTTP requests served",
            registry
        )?;

        Ok(Self {
            registry,
            measurements_total,
            measurement_errors_total,
            last_raw_ticks,
            history_entries,
            persisted_records_total,
            persist_failures_total,
            http_requests_total,
        })
    }

    /// Record one finished measurement cycle
    pub fn measurement_taken(&self, fragment: &Fragment) {
        self.measurements_total.inc();
        if !fragment.status.is_operational() {
            self.measurement_errors_total.inc();
        }
        self.last_raw_ticks
            .set(i64::try_from(fragment.raw_ticks).unwrap_or(i64::MAX));
    }

    /// Record the ring occupancy after an append
    pub fn set_history_entries(&self, len: usize) {
        self.history_entries
            .set(i64::try_from(len).unwrap_or(i64::MAX));
    }

    /// Record a persisted line
    pub fn record_persisted(&self) {
        self.persisted_records_total.inc();
    }

    /// Record a failed persist
    pub fn persist_failed(&self) {
        self.persist_failures_total.inc();
    }

    /// Record a served request
    pub fn request_served(&self) {
        self.http_requests_total.inc();
    }

    /// Gather and encode everything in the Prometheus text format
    pub fn encode(&self) -> AppResult<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics")
            .field("measurements_total", &self.measurements_total.get())
            .field("persisted_records_total", &self.persisted_records_total.get())
            .finish_non_exhaustive()
    }
}
