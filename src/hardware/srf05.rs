//! SRF05 ultrasonic rangefinder driver (single-pin mode).
//!
//! The SRF05 shares one line for trigger and echo:
//!
//! ```text
//!          trigger        echo start wait         echo width wait
//! line  ___|‾‾‾‾|___ (input) _____________|‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾|_______
//!          <pulse>          <= start_timeout  <= xmit_timeout polls
//! ```
//!
//! Both waits are bounded busy-polls. The number of polls spent in the second
//! wait is the raw distance; its unit depends on how fast the poll loop runs,
//! which is why the centimeter divisor is configurable.
//!
//! A timeout in either wait (or a line I/O failure) sets the status to ERROR
//! and keeps the previous raw value. It is never an `Err`.

use std::time::{Duration, Instant};

use tracing::{trace, warn};

use super::capabilities::SignalLine;
use crate::config::{SensorConfig, MEASURE_START_TIMEOUT, MEASURE_XMIT_TIMEOUT};
use crate::error::AppResult;
use crate::measurement_types::{Fragment, SensorStatus};

/// Timing budgets for one trigger/echo cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTiming {
    /// Width of the trigger pulse
    pub pulse_width: Duration,
    /// Poll budget for the echo to start
    pub start_timeout: u64,
    /// Poll budget for the echo to end
    pub xmit_timeout: u64,
}

impl Default for DriverTiming {
    fn default() -> Self {
        Self {
            pulse_width: Duration::from_micros(20),
            start_timeout: MEASURE_START_TIMEOUT,
            xmit_timeout: MEASURE_XMIT_TIMEOUT,
        }
    }
}

impl From<&SensorConfig> for DriverTiming {
    fn from(config: &SensorConfig) -> Self {
        Self {
            pulse_width: config.pulse_width(),
            start_timeout: config.start_timeout,
            xmit_timeout: config.xmit_timeout,
        }
    }
}

/// How the last cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    /// Echo pulse measured, width in polls
    Width(u64),
    /// The line never went high within the start budget
    NoResponse,
    /// The line went high but did not come back low within the width budget
    EchoLost,
    /// The line itself failed
    LineFault,
}

/// Driver for one SRF05 on one line
pub struct Srf05<L: SignalLine> {
    line: L,
    timing: DriverTiming,
    last: Fragment,
    last_outcome: Option<EchoOutcome>,
}

impl<L: SignalLine> Srf05<L> {
    /// Create a driver with the default budgets
    pub fn new(line: L) -> Self {
        Self::with_timing(line, DriverTiming::default())
    }

    /// Create a driver with explicit budgets
    pub fn with_timing(line: L, timing: DriverTiming) -> Self {
        Self {
            line,
            timing,
            last: Fragment::default(),
            last_outcome: None,
        }
    }

    /// Timing budgets in use
    pub fn timing(&self) -> DriverTiming {
        self.timing
    }

    /// Last published fragment (initially raw 0, OPERATIONAL)
    pub fn last(&self) -> Fragment {
        self.last
    }

    /// How the last `measure()` ended, `None` before the first call
    pub fn last_outcome(&self) -> Option<EchoOutcome> {
        self.last_outcome
    }

    /// Borrow the underlying line
    pub fn line(&self) -> &L {
        &self.line
    }

    /// Release the driver and hand the line back
    pub fn into_line(self) -> L {
        self.line
    }

    /// Run one trigger/echo cycle.
    ///
    /// Blocks for at most the pulse width plus both poll budgets. On success
    /// the raw value is replaced; on any failure only the status changes.
    pub fn measure(&mut self) -> Fragment {
        let outcome = match self.cycle() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(line = self.line.id(), error = %e, "Signal line failed during measurement");
                EchoOutcome::LineFault
            }
        };

        match outcome {
            EchoOutcome::Width(ticks) => {
                self.last = Fragment {
                    raw_ticks: ticks,
                    status: SensorStatus::Operational,
                };
            }
            EchoOutcome::NoResponse | EchoOutcome::EchoLost | EchoOutcome::LineFault => {
                self.last.status = SensorStatus::Error;
            }
        }

        trace!(?outcome, raw_ticks = self.last.raw_ticks, "Measurement cycle finished");
        self.last_outcome = Some(outcome);
        self.last
    }

    fn cycle(&mut self) -> AppResult<EchoOutcome> {
        self.line.set_output(true)?;
        spin_for(self.timing.pulse_width);
        self.line.set_output(false)?;
        self.line.set_input()?;

        let mut t: u64 = 0;
        while !self.line.is_high()? && t < self.timing.start_timeout {
            t += 1;
        }
        if t >= self.timing.start_timeout {
            return Ok(EchoOutcome::NoResponse);
        }

        t = 0;
        while self.line.is_high()? && t < self.timing.xmit_timeout {
            t += 1;
        }
        if t >= self.timing.xmit_timeout {
            return Ok(EchoOutcome::EchoLost);
        }

        Ok(EchoOutcome::Width(t))
    }
}

/// Busy-wait for short delays where sleeping would overshoot.
fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
