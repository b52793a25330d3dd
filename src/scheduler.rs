//! Measurement Scheduler
//!
//! Fires one driver cycle per period and publishes every result, success or
//! not, to the [`SensorState`]. The period is counted from the end of a cycle,
//! so cycles never overlap and a slow sensor simply stretches the cadence.
//!
//! The cycle itself is a busy-wait and runs on the blocking pool. The driver
//! is moved into the blocking task and handed back afterwards; when the
//! scheduler stops it returns the driver to the caller, who releases the line
//! by dropping it.
//!
//! Cancellation is a `watch<bool>`: `true` (or a dropped sender) means stop.
//! It is only honoured between cycles, so a cycle in progress always finishes
//! and publishes.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::{AppResult, DaqError};
use crate::hardware::{SignalLine, Srf05};
use crate::measurement_types::{Fragment, SensorStatus};
use crate::metrics::ServiceMetrics;
use crate::state::SensorState;

/// Periodic driver of the rangefinder
#[derive(Debug, Clone)]
pub struct MeasurementScheduler {
    state: SensorState,
    period: Duration,
    metrics: Option<ServiceMetrics>,
}

impl MeasurementScheduler {
    /// Publish into `state`, sleeping `period` after each cycle
    pub fn new(state: SensorState, period: Duration) -> Self {
        Self {
            state,
            period,
            metrics: None,
        }
    }

    /// Count cycles in `metrics`
    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sleep between cycles
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run cycles until shutdown is signalled, then hand the driver back.
    pub async fn run<L>(
        &self,
        mut driver: Srf05<L>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<Srf05<L>>
    where
        L: SignalLine + 'static,
    {
        info!(period = ?self.period, line = driver.line().id(), "Measurement scheduler started");
        let mut previous: Option<SensorStatus> = None;
        let mut cycles: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let (returned, fragment) = self.measure_once(driver).await?;
            driver = returned;
            cycles += 1;

            log_transition(previous, &fragment);
            previous = Some(fragment.status);

            if sleep_or_shutdown(self.period, &mut shutdown).await {
                break;
            }
        }

        info!(cycles, "Measurement scheduler stopped");
        Ok(driver)
    }

    /// Run one cycle on the blocking pool and publish its result.
    pub async fn measure_once<L>(&self, mut driver: Srf05<L>) -> AppResult<(Srf05<L>, Fragment)>
    where
        L: SignalLine + 'static,
    {
        let (driver, fragment) = tokio::task::spawn_blocking(move || {
            let fragment = driver.measure();
            (driver, fragment)
        })
        .await
        .map_err(|e| DaqError::Task(format!("measurement task failed: {}", e)))?;

        self.state.publish(fragment);
        if let Some(metrics) = &self.metrics {
            metrics.measurement_taken(&fragment);
        }
        trace!(raw_ticks = fragment.raw_ticks, status = %fragment.status, "Published measurement");

        Ok((driver, fragment))
    }
}

fn log_transition(previous: Option<SensorStatus>, fragment: &Fragment) {
    match (previous, fragment.status) {
        (None, status) => {
            info!(raw_ticks = fragment.raw_ticks, %status, "First measurement");
        }
        (Some(SensorStatus::Operational), SensorStatus::Error) => {
            warn!(raw_ticks = fragment.raw_ticks, "Sensor stopped answering");
        }
        (Some(SensorStatus::Error), SensorStatus::Operational) => {
            info!(raw_ticks = fragment.raw_ticks, "Sensor recovered");
        }
        _ => {}
    }
}

/// Wait for `period`, returning early with `true` if shutdown is signalled.
///
/// Returns whether the caller should stop.
pub(crate) async fn sleep_or_shutdown(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(period);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return *shutdown.borrow(),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Shutdown signalled");
                    return true;
                }
            }
        }
    }
}

/// Resolve once shutdown is signalled or the sender is gone.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
