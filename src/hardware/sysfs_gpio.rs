//! Linux sysfs GPIO line.
//!
//! Drives a line through `/sys/class/gpio`:
//!
//! ```text
//! <root>/export            write the line number to create gpioN/
//! <root>/gpioN/direction   "high" / "low" switch to output with that level, "in" for input
//! <root>/gpioN/value       "0" / "1"
//! <root>/unexport          write the line number to release it
//! ```
//!
//! The `value` file stays open for the lifetime of the line and is sampled
//! with positioned reads, so a poll in the echo loop costs one `pread`.
//! Direction changes go through a fresh write each time.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::capabilities::SignalLine;
use crate::error::{AppResult, DaqError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Input,
    Output,
}

/// A GPIO line claimed through the sysfs interface.
pub struct SysfsLine {
    line: u32,
    root: PathBuf,
    line_dir: PathBuf,
    value: File,
    mode: Option<Mode>,
    exported_here: bool,
}

impl SysfsLine {
    /// Claim `line` under `root` (normally `/sys/class/gpio`).
    ///
    /// Exports the line if it is not exported yet and configures it as an
    /// input. Any failure here is fatal: the daemon cannot measure without
    /// its line.
    pub fn open(root: &Path, line: u32) -> AppResult<Self> {
        let line_dir = root.join(format!("gpio{}", line));
        let mut exported_here = false;

        if !line_dir.exists() {
            fs::write(root.join("export"), line.to_string())
                .map_err(|e| unavailable(line, format!("export failed: {}", e)))?;
            exported_here = true;
            debug!(line, "Exported GPIO line");
        }

        let value = OpenOptions::new()
            .read(true)
            .open(line_dir.join("value"))
            .map_err(|e| unavailable(line, format!("cannot open value: {}", e)))?;

        let mut gpio = Self {
            line,
            root: root.to_path_buf(),
            line_dir,
            value,
            mode: None,
            exported_here,
        };
        gpio.set_input()
            .map_err(|e| unavailable(line, format!("cannot configure as input: {}", e)))?;

        info!(line, path = %gpio.line_dir.display(), "Claimed GPIO line");
        Ok(gpio)
    }

    fn write_attr(&self, attr: &str, contents: &str) -> AppResult<()> {
        fs::write(self.line_dir.join(attr), contents).map_err(|e| DaqError::LineUnavailable {
            line: self.line,
            message: format!("write '{}' to {} failed: {}", contents, attr, e),
        })
    }
}

impl SignalLine for SysfsLine {
    fn id(&self) -> u32 {
        self.line
    }

    fn set_output(&mut self, high: bool) -> AppResult<()> {
        match self.mode {
            Some(Mode::Output) => self.write_attr("value", if high { "1" } else { "0" }),
            _ => {
                self.write_attr("direction", if high { "high" } else { "low" })?;
                self.mode = Some(Mode::Output);
                Ok(())
            }
        }
    }

    fn set_input(&mut self) -> AppResult<()> {
        self.write_attr("direction", "in")?;
        self.mode = Some(Mode::Input);
        Ok(())
    }

    fn is_high(&mut self) -> AppResult<bool> {
        let mut buf = [0u8; 1];
        let n = self.value.read_at(&mut buf, 0).map_err(|e| DaqError::LineUnavailable {
            line: self.line,
            message: format!("read value failed: {}", e),
        })?;
        Ok(n == 1 && buf[0] == b'1')
    }
}

impl Drop for SysfsLine {
    fn drop(&mut self) {
        if !self.exported_here {
            return;
        }
        if let Err(e) = fs::write(self.root.join("unexport"), self.line.to_string()) {
            warn!(line = self.line, error = %e, "Failed to unexport GPIO line");
        } else {
            debug!(line = self.line, "Unexported GPIO line");
        }
    }
}

fn unavailable(line: u32, message: String) -> DaqError {
    DaqError::LineUnavailable { line, message }
}
