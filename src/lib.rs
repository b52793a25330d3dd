//! # SRF05 Acquisition Library
//!
//! Core of the `srf05_daq` daemon: drives an SRF05 ultrasonic rangefinder on a
//! single GPIO line, keeps the latest measurement and a bounded history, writes
//! every history sample to a per-day record file and serves both over HTTP.
//!
//! ## Crate Structure
//!
//! - **`hardware`**: the `SignalLine` capability, its sysfs and simulated
//!   implementations, and the `Srf05` trigger/echo driver.
//! - **`measurement_types`**: `Fragment`, `Reading` and `SensorStatus`.
//! - **`state`**: the single-slot sensor state written by the scheduler.
//! - **`scheduler`**: periodic measurement task.
//! - **`bridge`**: the three-value publication boundary read by queries.
//! - **`data`**: the history ring (`HistoryStore`) and the record log (`RecordLog`).
//! - **`recorder`**: hourly sampler feeding history and the record log.
//! - **`query`**: JSON views of the latest reading and the history.
//! - **`server`**: hyper routes in front of the query service.
//! - **`metrics`**: Prometheus counters and gauges.
//! - **`daemon`**: startup, task wiring and shutdown.
//! - **`config`**, **`error`**, **`tracing_init`**: configuration, the
//!   `DaqError` type and logging setup.

pub mod bridge;
pub mod config;
pub mod daemon;
pub mod data;
pub mod error;
pub mod hardware;
pub mod measurement_types;
pub mod metrics;
pub mod query;
pub mod recorder;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod tracing_init;
