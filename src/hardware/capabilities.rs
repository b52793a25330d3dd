//! Hardware Capabilities
//!
//! The rangefinder needs exactly one capability from the platform: a single
//! GPIO-style line that can be driven as an output and then turned around and
//! sampled as an input. Anything that implements [`SignalLine`] can host the
//! SRF05 driver: the Linux sysfs GPIO tree, a simulated sensor, or a scripted
//! line in tests.
//!
//! The trait is synchronous. The driver times the echo by counting polls in a
//! tight loop, so every call is a plain blocking call with no executor in
//! between. Callers on an async runtime run the driver on the blocking pool.
//!
//! # Contract
//! - `set_output(level)` switches the line to output mode driving `level`
//! - `set_input()` releases the line so the sensor can drive it
//! - `is_high()` samples the line; it is only meaningful in input mode
//! - Errors are line I/O failures, never timeouts (timeouts are the driver's job)

use crate::error::AppResult;

/// Capability: a bidirectional digital signal line
pub trait SignalLine: Send {
    /// Line identifier (GPIO number), for logging
    fn id(&self) -> u32;

    /// Switch to output mode and drive the given level
    fn set_output(&mut self, high: bool) -> AppResult<()>;

    /// Switch to input mode
    fn set_input(&mut self) -> AppResult<()>;

    /// Sample the current level
    fn is_high(&mut self) -> AppResult<bool>;
}

impl<L: SignalLine + ?Sized> SignalLine for Box<L> {
    fn id(&self) -> u32 {
        (**self).id()
    }

    fn set_output(&mut self, high: bool) -> AppResult<()> {
        (**self).set_output(high)
    }

    fn set_input(&mut self) -> AppResult<()> {
        (**self).set_input()
    }

    fn is_high(&mut self) -> AppResult<bool> {
        (**self).is_high()
    }
}
