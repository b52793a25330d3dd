//! CLI Entry Point for srf05_daq
//!
//! Provides command-line interface for:
//! - Running the acquisition daemon (driver, history, query server)
//! - Taking a single measurement when bench testing a sensor
//! - Checking a configuration file
//! - Printing a day partition of the record log
//!
//! # Usage
//!
//! ```bash
//! srf05_daq serve --config config/srf05.toml
//! srf05_daq measure --simulate
//! srf05_daq check-config
//! srf05_daq history-file 2024-03-01
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use srf05_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use srf05_daq::daemon::Daemon;
use srf05_daq::data::RecordLog;
use srf05_daq::hardware::{open_driver, EchoOutcome};
use srf05_daq::measurement_types::ticks_to_cm;
use srf05_daq::tracing_init;

#[derive(Parser)]
#[command(name = "srf05_daq")]
#[command(about = "SRF05 rangefinder acquisition daemon", long_about = None)]
struct Cli {
    /// Configuration file (TOML); environment variables prefixed SRF05_ override it
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon until interrupted
    Serve {
        /// Override the HTTP port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Trigger one measurement and print it
    Measure {
        /// Use the simulated sensor instead of the GPIO line
        #[arg(long)]
        simulate: bool,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,

    /// Print the records persisted for one day
    HistoryFile {
        /// Day to print, YYYY-MM-DD
        date: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            serve(settings).await
        }
        Commands::Measure { simulate } => {
            settings.sensor.simulate |= simulate;
            measure(settings).await
        }
        Commands::CheckConfig => check_config(&settings),
        Commands::HistoryFile { date } => history_file(&settings, date),
    }
}

async fn serve(settings: Settings) -> Result<()> {
    tracing_init::init_from_settings(&settings).context("failed to initialise logging")?;

    let daemon = Daemon::build(settings).context("daemon startup failed")?;
    let running = daemon.start().await.context("failed to start daemon")?;

    running
        .run_until_ctrl_c()
        .await
        .context("daemon did not shut down cleanly")?;
    Ok(())
}

async fn measure(settings: Settings) -> Result<()> {
    tracing_init::init_from_settings(&settings).context("failed to initialise logging")?;
    settings.validate()?;

    let cm_divisor = settings.sensor.cm_divisor;
    let mut driver = open_driver(&settings.sensor).context("cannot open sensor line")?;

    let (fragment, outcome) = tokio::task::spawn_blocking(move || {
        let fragment = driver.measure();
        (fragment, driver.last_outcome())
    })
    .await
    .context("measurement task failed")?;

    println!("status:       {}", fragment.status);
    println!("distance_raw: {}", fragment.raw_ticks);
    println!("distance_cm:  {}", ticks_to_cm(fragment.raw_ticks, cm_divisor));
    match outcome {
        Some(EchoOutcome::NoResponse) => println!("note:         no echo within the start budget"),
        Some(EchoOutcome::EchoLost) => println!("note:         echo did not end within the width budget"),
        Some(EchoOutcome::LineFault) => println!("note:         signal line failed"),
        _ => {}
    }
    Ok(())
}

fn check_config(settings: &Settings) -> Result<()> {
    settings.validate().context("configuration is invalid")?;
    println!("{}", serde_json::to_string_pretty(settings)?);
    println!();
    println!("Configuration OK");
    println!(
        "  measurement every {:?}, history every {:?}",
        settings.sensor.measurement_period(),
        settings.history.interval
    );
    Ok(())
}

fn history_file(settings: &Settings, date: NaiveDate) -> Result<()> {
    let log = RecordLog::from_config(&settings.history);
    let records = log
        .read_partition(date)
        .with_context(|| format!("failed to read {}", log.partition_path(date).display()))?;

    if records.is_empty() {
        println!("No records for {}", date);
        return Ok(());
    }
    for r in &records {
        println!(
            "{} {}  {:<11}  {:>5} cm  {:>8} raw",
            r.date, r.time, r.status, r.distance_cm, r.distance_raw
        );
    }
    println!("{} record(s)", records.len());
    Ok(())
}
