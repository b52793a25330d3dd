//! Daemon assembly and lifecycle.
//!
//! [`Daemon::build`] validates the settings and acquires every startup
//! resource (history directory, signal line, bridge). Any failure there is
//! fatal. [`Daemon::start`] spawns the scheduler, the recorder and the HTTP
//! server and returns a [`RunningDaemon`]; [`RunningDaemon::shutdown`] stops
//! all three and releases the line.
//!
//! ```text
//!   Srf05 ──measure──▶ SensorState ──▶ StateBridge ──┬──▶ QueryService ──▶ HTTP
//!     ▲ (blocking pool)                               │
//!   MeasurementScheduler                              └──▶ HistoryRecorder ──▶ HistoryStore
//!                                                                          └─▶ RecordLog
//! ```
//!
//! With `bridge.mode = "sysfs"` the left half is absent: the bridge reads the
//! attribute files of an external producer and no line is opened.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bridge::{cm_divisor_agrees, PublicationBridge, StateBridge, SysfsBridge};
use crate::config::{BridgeMode, Settings};
use crate::data::{HistoryStore, RecordLog};
use crate::error::{AppResult, DaqError};
use crate::hardware::{open_driver, SignalLine, Srf05};
use crate::metrics::ServiceMetrics;
use crate::query::QueryService;
use crate::recorder::HistoryRecorder;
use crate::scheduler::MeasurementScheduler;
use crate::server::{start_server, ServerContext, ServerHandle};
use crate::state::SensorState;

type LineDriver = Srf05<Box<dyn SignalLine>>;

/// Fully initialised daemon, nothing running yet
pub struct Daemon {
    settings: Settings,
    state: SensorState,
    history: Arc<HistoryStore>,
    log: RecordLog,
    bridge: Arc<dyn PublicationBridge>,
    driver: Option<LineDriver>,
    metrics: ServiceMetrics,
}

impl Daemon {
    /// Validate `settings` and acquire all startup resources.
    pub fn build(settings: Settings) -> AppResult<Self> {
        settings.validate()?;

        let log = RecordLog::from_config(&settings.history);
        log.ensure_directory(settings.history.create_directory)?;

        let history = Arc::new(HistoryStore::new(settings.history.capacity)?);
        let state = SensorState::new();
        let metrics = ServiceMetrics::new()?;

        let (bridge, driver): (Arc<dyn PublicationBridge>, Option<LineDriver>) =
            match settings.bridge.mode {
                BridgeMode::Internal => {
                    let driver = open_driver(&settings.sensor)?;
                    info!(
                        line = settings.sensor.line,
                        cm_divisor = settings.sensor.cm_divisor,
                        update_divisor = settings.sensor.update_divisor,
                        period = ?settings.sensor.measurement_period(),
                        simulate = settings.sensor.simulate,
                        "SRF05 driver ready"
                    );
                    let bridge = StateBridge::new(state.clone(), settings.sensor.cm_divisor);
                    (Arc::new(bridge), Some(driver))
                }
                BridgeMode::Sysfs => {
                    info!(
                        dir = %settings.bridge.sysfs_dir.display(),
                        "Reading measurements from external attribute files"
                    );
                    let bridge = SysfsBridge::new(&settings.bridge.sysfs_dir);
                    cm_divisor_agrees(&bridge, settings.sensor.cm_divisor);
                    (Arc::new(bridge), None)
                }
            };

        Ok(Self {
            settings,
            state,
            history,
            log,
            bridge,
            driver,
            metrics,
        })
    }

    /// Settings the daemon was built from
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Read side over this daemon's bridge and history
    pub fn query_service(&self) -> QueryService {
        QueryService::new(
            self.bridge.clone(),
            self.history.clone(),
            self.settings.sensor.cm_divisor,
        )
    }

    /// Spawn the scheduler (if measuring), the recorder and the HTTP server.
    pub async fn start(self) -> AppResult<RunningDaemon> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let query = self.query_service();
        let cm_divisor = self.settings.sensor.cm_divisor;

        let server = start_server(
            self.settings.server.socket_addr(),
            ServerContext::new(query)
                .with_metrics(self.metrics.clone())
                .with_doc_root(&self.settings.server.doc_root),
        )
        .await?;

        let scheduler = self.driver.map(|driver| {
            let scheduler = MeasurementScheduler::new(
                self.state.clone(),
                self.settings.sensor.measurement_period(),
            )
            .with_metrics(self.metrics.clone());
            let rx = shutdown_rx.clone();
            tokio::spawn(async move { scheduler.run(driver, rx).await })
        });

        let recorder = HistoryRecorder::new(
            self.bridge.clone(),
            self.history.clone(),
            self.log.clone(),
            self.settings.history.interval,
            cm_divisor,
        )
        .with_metrics(self.metrics.clone());
        let recorder = tokio::spawn(async move { recorder.run(shutdown_rx).await });

        info!(name = %self.settings.application.name, "Daemon started");

        Ok(RunningDaemon {
            shutdown_tx,
            scheduler,
            recorder,
            server,
            history: self.history,
            metrics: self.metrics,
        })
    }
}

/// Handle on the spawned tasks
pub struct RunningDaemon {
    shutdown_tx: watch::Sender<bool>,
    scheduler: Option<JoinHandle<AppResult<LineDriver>>>,
    recorder: JoinHandle<()>,
    server: ServerHandle,
    history: Arc<HistoryStore>,
    metrics: ServiceMetrics,
}

impl RunningDaemon {
    /// Address the HTTP server is bound to
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.server.local_addr()
    }

    /// Shared history, for inspection
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Shared metrics, for inspection
    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Whether a scheduler task was started
    pub fn is_measuring(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Signal shutdown and wait for every task.
    ///
    /// The scheduler finishes the cycle in progress, the server drains
    /// in-flight requests, and the line is released once the driver is
    /// dropped.
    pub async fn shutdown(self) -> AppResult<()> {
        info!("Shutting down");
        let _ = self.shutdown_tx.send(true);

        let server_result = self.server.shutdown().await;

        if let Err(e) = self.recorder.await {
            error!("History recorder task failed: {}", e);
        }

        if let Some(scheduler) = self.scheduler {
            let driver = scheduler
                .await
                .map_err(|e| DaqError::Task(format!("scheduler task failed: {}", e)))??;
            let line = driver.line().id();
            drop(driver);
            info!(line, "Signal line released");
        }

        server_result
    }

    /// Run until Ctrl-C, then shut down.
    pub async fn run_until_ctrl_c(self) -> AppResult<()> {
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received");
        self.shutdown().await
    }
}
