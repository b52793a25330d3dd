//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (default `config/srf05.toml`)
//! 2. Environment variables (prefixed with `SRF05_`, nested keys split on `__`)
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock deployment: GPIO 20, divisor 450, a measurement every 500 ms, 48
//! hourly history slots.
//!
//! # Example
//! ```no_run
//! use srf05_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("Sensor on line {}", settings.sensor.line);
//! # Ok::<(), srf05_daq::error::DaqError>(())
//! ```

use crate::error::{AppResult, DaqError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/srf05.toml";

/// Timeout until the sensor has to start transmitting (poll iterations).
pub const MEASURE_START_TIMEOUT: u64 = 25_000;

/// Timeout until the sensor has to finish transmitting (poll iterations).
pub const MEASURE_XMIT_TIMEOUT: u64 = 100_000;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// Rangefinder and scheduler settings
    pub sensor: SensorConfig,
    /// In-memory history and record log settings
    pub history: HistoryConfig,
    /// Where queries read the latest reading from
    pub bridge: BridgeConfig,
    /// HTTP listener
    pub server: ServerConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "srf05-daq".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Rangefinder driver and measurement scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// GPIO number of the SRF05 data line
    pub line: u32,
    /// Root of the sysfs GPIO tree
    pub gpio_root: PathBuf,
    /// Divisor used to calculate cm from the raw tick count
    pub cm_divisor: u64,
    /// Divisor applied to `base_period` to get the measurement period
    pub update_divisor: u32,
    /// Base period the update divisor scales
    #[serde(with = "humantime_serde")]
    pub base_period: Duration,
    /// Width of the trigger pulse in microseconds
    pub pulse_width_us: u64,
    /// Poll budget while waiting for the echo to start
    pub start_timeout: u64,
    /// Poll budget while waiting for the echo to end
    pub xmit_timeout: u64,
    /// Drive a simulated sensor instead of a GPIO line
    pub simulate: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            line: 20,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            cm_divisor: 450,
            update_divisor: 20,
            base_period: Duration::from_secs(10),
            pulse_width_us: 20,
            start_timeout: MEASURE_START_TIMEOUT,
            xmit_timeout: MEASURE_XMIT_TIMEOUT,
            simulate: false,
        }
    }
}

impl SensorConfig {
    /// Time between two measurements: `base_period / update_divisor`.
    pub fn measurement_period(&self) -> Duration {
        self.base_period / self.update_divisor.max(1)
    }

    /// Trigger pulse width.
    pub fn pulse_width(&self) -> Duration {
        Duration::from_micros(self.pulse_width_us)
    }
}

/// History ring and record log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of readings kept in memory
    pub capacity: usize,
    /// Interval at which a reading is appended and flushed to disk
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Directory holding one record file per day
    pub directory: PathBuf,
    /// File extension of the day partitions
    pub extension: String,
    /// Create `directory` at startup if it does not exist
    pub create_directory: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 48,
            interval: Duration::from_secs(3600),
            directory: PathBuf::from("/opt/app/html/history"),
            extension: "csv".to_string(),
            create_directory: true,
        }
    }
}

/// Source of the values exposed by the publication bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeMode {
    /// Read the in-process sensor state fed by our own scheduler
    Internal,
    /// Read the three attribute files published by an external producer
    Sysfs,
}

/// Publication bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Which bridge implementation to use
    pub mode: BridgeMode,
    /// Directory containing `distance_raw`, `distance_cm` and `status`
    pub sysfs_dir: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mode: BridgeMode::Internal,
            sysfs_dir: PathBuf::from("/sys/kernel/srf05"),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: IpAddr,
    /// TCP port
    pub port: u16,
    /// Directory served for paths no route claims; the default history
    /// directory lives under it
    pub doc_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 80,
            doc_root: PathBuf::from("/opt/app/html"),
        }
    }
}

impl ServerConfig {
    /// Socket address the HTTP server listens on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Settings {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables override file values with prefix `SRF05_`.
    /// Example: `SRF05_SENSOR__CM_DIVISOR=58`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error: defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SRF05_").split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Parse configuration from a TOML string (no environment overrides)
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let settings = Figment::new().merge(Toml::string(toml)).extract()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.sensor.cm_divisor == 0 {
            return Err(DaqError::Configuration(
                "sensor.cm_divisor must be greater than 0".into(),
            ));
        }
        if self.sensor.update_divisor == 0 {
            return Err(DaqError::Configuration(
                "sensor.update_divisor must be greater than 0".into(),
            ));
        }
        if self.sensor.measurement_period().is_zero() {
            return Err(DaqError::Configuration(format!(
                "sensor.base_period {:?} divided by update_divisor {} leaves no time between measurements",
                self.sensor.base_period, self.sensor.update_divisor
            )));
        }
        if self.sensor.start_timeout == 0 || self.sensor.xmit_timeout == 0 {
            return Err(DaqError::Configuration(
                "sensor.start_timeout and sensor.xmit_timeout must be greater than 0".into(),
            ));
        }

        if self.history.capacity == 0 {
            return Err(DaqError::Configuration(
                "history.capacity must be greater than 0".into(),
            ));
        }
        if self.history.interval.is_zero() {
            return Err(DaqError::Configuration(
                "history.interval must be greater than 0".into(),
            ));
        }
        let extension = self.history.extension.trim();
        if extension.is_empty() || extension.contains('/') || extension.starts_with('.') {
            return Err(DaqError::Configuration(format!(
                "Invalid history.extension '{}'",
                self.history.extension
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.sensor.line, 20);
        assert_eq!(settings.sensor.cm_divisor, 450);
        assert_eq!(settings.history.capacity, 48);
        assert_eq!(settings.bridge.mode, BridgeMode::Internal);
        assert!(settings
            .history
            .directory
            .starts_with(&settings.server.doc_root));
    }

    #[test]
    fn test_measurement_period_scales_with_divisor() {
        let mut sensor = SensorConfig::default();
        assert_eq!(sensor.measurement_period(), Duration::from_millis(500));

        sensor.update_divisor = 1;
        assert_eq!(sensor.measurement_period(), Duration::from_secs(10));

        sensor.update_divisor = 40;
        assert_eq!(sensor.measurement_period(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [sensor]
            line = 17
            base_period = "2s"

            [history]
            interval = "15m"
            "#,
        )
        .unwrap();

        assert_eq!(settings.sensor.line, 17);
        assert_eq!(settings.sensor.base_period, Duration::from_secs(2));
        assert_eq!(settings.sensor.cm_divisor, 450);
        assert_eq!(settings.history.interval, Duration::from_secs(900));
        assert_eq!(settings.server.port, 80);
    }

    #[test]
    fn test_bridge_mode_parses() {
        let settings = Settings::from_toml_str(
            r#"
            [bridge]
            mode = "sysfs"
            sysfs_dir = "/tmp/srf05"
            "#,
        )
        .unwrap();
        assert_eq!(settings.bridge.mode, BridgeMode::Sysfs);
        assert_eq!(settings.bridge.sysfs_dir, PathBuf::from("/tmp/srf05"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.application.log_level = "invalid".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_divisors_rejected() {
        let mut settings = Settings::default();
        settings.sensor.cm_divisor = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sensor.update_divisor = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut settings = Settings::default();
        settings.history.capacity = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("history.capacity"));
    }
}
