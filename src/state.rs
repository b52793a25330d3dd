//! Sensor State
//!
//! The single slot holding the most recent measurement, built on
//! `tokio::sync::watch`. The scheduler is the only writer; any number of
//! query handlers read it.
//!
//! # Guarantees
//!
//! - A reader never sees an unwritten value: the slot starts at
//!   `{raw_ticks: 0, status: OPERATIONAL}`, which is also what the driver
//!   reports before its first cycle.
//! - Each publish replaces the whole `Fragment`, so `raw_ticks` and `status`
//!   read through [`SensorState::get`] always belong together.
//! - Readers going through the three-accessor bridge read raw and status in
//!   two calls and may see a pair from two different ticks. That is tolerated.
//!
//! # Example
//!
//! ```rust
//! use srf05_daq::measurement_types::{Fragment, SensorStatus};
//! use srf05_daq::state::SensorState;
//!
//! let state = SensorState::new();
//! state.publish(Fragment { raw_ticks: 9000, status: SensorStatus::Operational });
//! assert_eq!(state.get().raw_ticks, 9000);
//! ```

use std::sync::Arc;
use tokio::sync::watch;

use crate::measurement_types::Fragment;

/// Shared handle to the latest measurement
#[derive(Clone)]
pub struct SensorState {
    /// The watch channel sender (holds current value)
    sender: Arc<watch::Sender<Fragment>>,
}

impl std::fmt::Debug for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorState")
            .field("current", &*self.sender.borrow())
            .finish()
    }
}

impl Default for SensorState {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorState {
    /// Create the slot with the power-on value
    pub fn new() -> Self {
        Self::with_initial(Fragment::default())
    }

    /// Create the slot with an explicit initial value
    pub fn with_initial(initial: Fragment) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Overwrite the slot. Notifies subscribers even if the value is unchanged.
    pub fn publish(&self, fragment: Fragment) {
        self.sender.send_replace(fragment);
    }

    /// Get the current value (copy).
    pub fn get(&self) -> Fragment {
        *self.sender.borrow()
    }

    /// Subscribe to every publish.
    pub fn subscribe(&self) -> watch::Receiver<Fragment> {
        self.sender.subscribe()
    }
}
