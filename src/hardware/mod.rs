//! Rangefinder hardware: the line capability, its implementations and the SRF05 driver.

pub mod capabilities;
pub mod mock;
pub mod srf05;
pub mod sysfs_gpio;

pub use capabilities::SignalLine;
pub use srf05::{DriverTiming, EchoOutcome, Srf05};

use tracing::warn;

use crate::config::SensorConfig;
use crate::error::AppResult;
use mock::{EchoProfile, SimulatedSrf05};
use sysfs_gpio::SysfsLine;

/// Distance the simulated sensor reports, in centimeters.
const SIMULATED_DISTANCE_CM: u64 = 100;

/// Polls before the simulated echo starts.
const SIMULATED_ECHO_DELAY: u64 = 10;

/// Open the line described by the sensor configuration.
///
/// With `simulate = true` this never touches the platform and returns a
/// simulated sensor reporting about one meter, or the longest echo the
/// configured budgets can still measure.
pub fn open_line(config: &SensorConfig) -> AppResult<Box<dyn SignalLine>> {
    if config.simulate {
        return Ok(Box::new(SimulatedSrf05::new(config.line, simulated_echo(config))));
    }
    Ok(Box::new(SysfsLine::open(&config.gpio_root, config.line)?))
}

/// Echo the simulated sensor answers with, kept inside both poll budgets.
fn simulated_echo(config: &SensorConfig) -> EchoProfile {
    let wanted = config.cm_divisor.saturating_mul(SIMULATED_DISTANCE_CM);
    let ticks = wanted.min(config.xmit_timeout.saturating_sub(1));
    if ticks < wanted {
        warn!(
            cm_divisor = config.cm_divisor,
            xmit_timeout = config.xmit_timeout,
            raw_ticks = ticks,
            "Simulated distance exceeds the echo budget, reporting the longest measurable echo"
        );
    }

    EchoProfile::Echo {
        delay: SIMULATED_ECHO_DELAY.min(config.start_timeout.saturating_sub(1)),
        // +1: the poll that sees the echo start is not counted as width
        width: ticks.saturating_add(1),
    }
}

/// Build the driver for the configured line.
pub fn open_driver(config: &SensorConfig) -> AppResult<Srf05<Box<dyn SignalLine>>> {
    let line = open_line(config)?;
    Ok(Srf05::with_timing(line, DriverTiming::from(config)))
}
