//! State Publication Bridge
//!
//! The boundary between the measuring side and the query side: three
//! independently readable scalars (raw distance, centimeters, status label).
//! Every accessor returns `None` when its value cannot be read; consumers turn
//! that into the `-1` / `"UNKNOWN"` sentinels instead of failing.
//!
//! Two implementations:
//!
//! - [`StateBridge`] reads the in-process [`SensorState`] fed by our scheduler.
//! - [`SysfsBridge`] reads `distance_raw`, `distance_cm` and `status` text files
//!   from a directory, the layout exported by the SRF05 kernel module under
//!   `/sys/kernel/srf05`. In that deployment this daemon only serves queries.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::measurement_types::ticks_to_cm;
use crate::state::SensorState;

/// Raw value reported when the bridge cannot be read.
pub const UNREADABLE_DISTANCE: i64 = -1;

/// Status label reported when the bridge cannot be read.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// Three independently readable values describing the latest measurement
pub trait PublicationBridge: Send + Sync {
    /// Raw distance in driver ticks
    fn distance_raw(&self) -> Option<u64>;

    /// Distance in centimeters as computed by the publisher
    fn distance_cm(&self) -> Option<u64>;

    /// Status label, normally `OPERATIONAL` or `ERROR`
    fn status(&self) -> Option<String>;
}

/// Bridge over the in-process sensor state
#[derive(Debug, Clone)]
pub struct StateBridge {
    state: SensorState,
    cm_divisor: u64,
}

impl StateBridge {
    /// Expose `state`, deriving centimeters with `cm_divisor`
    pub fn new(state: SensorState, cm_divisor: u64) -> Self {
        Self { state, cm_divisor }
    }
}

impl PublicationBridge for StateBridge {
    fn distance_raw(&self) -> Option<u64> {
        Some(self.state.get().raw_ticks)
    }

    fn distance_cm(&self) -> Option<u64> {
        Some(ticks_to_cm(self.state.get().raw_ticks, self.cm_divisor))
    }

    fn status(&self) -> Option<String> {
        Some(self.state.get().status.as_str().to_string())
    }
}

/// Bridge over three attribute files in a directory
#[derive(Debug, Clone)]
pub struct SysfsBridge {
    dir: PathBuf,
}

impl SysfsBridge {
    /// Read attributes from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory being read
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_attr(&self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents.trim().to_string()),
            Err(e) => {
                trace!(path = %path.display(), error = %e, "Bridge attribute unreadable");
                None
            }
        }
    }

    fn read_number(&self, name: &str) -> Option<u64> {
        self.read_attr(name)?.parse().ok()
    }
}

/// Check that the publisher's centimeters match `raw / cm_divisor`.
///
/// Queries derive centimeters from the raw value with the local divisor, so a
/// publisher configured with another divisor would be contradicted. Returns
/// `false` and warns on a mismatch; unreadable values pass.
pub fn cm_divisor_agrees(bridge: &dyn PublicationBridge, cm_divisor: u64) -> bool {
    let (Some(raw), Some(published)) = (bridge.distance_raw(), bridge.distance_cm()) else {
        return true;
    };
    let derived = ticks_to_cm(raw, cm_divisor);
    if derived != published {
        warn!(
            raw_ticks = raw,
            published_cm = published,
            derived_cm = derived,
            cm_divisor,
            "Publisher centimeters disagree with sensor.cm_divisor"
        );
        return false;
    }
    true
}

impl PublicationBridge for SysfsBridge {
    fn distance_raw(&self) -> Option<u64> {
        self.read_number("distance_raw")
    }

    fn distance_cm(&self) -> Option<u64> {
        self.read_number("distance_cm")
    }

    fn status(&self) -> Option<String> {
        self.read_attr("status").filter(|s| !s.is_empty())
    }
}
