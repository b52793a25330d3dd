//! Custom error types for the daemon.
//!
//! `DaqError` is the single error type returned by library code. It is built
//! with `thiserror` and covers the failures that can stop the daemon from
//! starting or that have to be reported during steady-state operation.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: wraps `figment` errors raised while reading the TOML file or
//!   environment overrides.
//! - **`Configuration`**: semantic validation failures (a zero divisor, an
//!   unknown bridge mode). These are caught by `Settings::validate`.
//! - **`LineUnavailable`**: the signal line could not be claimed or driven.
//!   Fatal at startup; during a measurement it is downgraded to an ERROR
//!   status by the driver.
//! - **`Persistence`**: a partition file could not be opened or appended.
//!   Reported and counted by the recorder, never fatal.
//! - **`Io`**: any other `std::io::Error`.
//!
//! Sensor timeouts are not errors at all; they are reported through
//! `SensorStatus::Error` in the measurement itself.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Every failure the daemon reports.
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signal line {line} unavailable: {message}")]
    LineUnavailable { line: u32, message: String },

    #[error("Failed to append record to '{}': {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record encoding error: {0}")]
    Encoding(String),

    #[error("HTTP server error: {0}")]
    Server(String),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

impl DaqError {
    /// Whether the daemon can keep running after this error.
    ///
    /// Only persistence failures are recoverable in steady state; everything
    /// else is a startup or wiring problem.
    pub fn can_recover(&self) -> bool {
        matches!(self, DaqError::Persistence { .. } | DaqError::Encoding(_))
    }
}
