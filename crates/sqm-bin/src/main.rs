//! `sqm-mon`: headless SQM-LE sky-brightness monitor.
//!
//! Locates the meter on the local network (or uses a configured address),
//! establishes the session, and drives the configured reading schedule,
//! appending one record per slot to the series file.
//!
//! # Usage
//!
//! ```bash
//! sqm-mon --config config/sqm
//! RUST_LOG=debug sqm-mon --config config/sqm
//! ```

mod settings;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use settings::Settings;
use sqm_core::{FixedAlmanac, ScheduleWindow, SystemClock};
use sqm_driver_le::{discover, DiscoveredDevice, SqmLeDriver, SESSION_PORT};
use sqm_engine::Monitor;
use sqm_storage::{DirectoryUploader, RecordFile};

#[derive(Parser)]
#[command(name = "sqm-mon")]
#[command(about = "Scheduled sky-brightness readings from an SQM-LE meter", long_about = None)]
struct Cli {
    /// Configuration file, without extension (TOML)
    #[arg(long, default_value = "config/sqm")]
    config: String,

    /// Override the configured slot interval, in seconds
    #[arg(long)]
    interval: Option<u32>,

    /// Override the configured per-slot attempt timeout, in seconds
    #[arg(long)]
    timeout: Option<u32>,

    /// Override the configured window start (RFC 3339)
    #[arg(long)]
    start: Option<chrono::DateTime<Utc>>,

    /// Override the configured window stop (RFC 3339)
    #[arg(long)]
    stop: Option<chrono::DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("loading configuration '{}'", cli.config))?;
    if let Some(interval) = cli.interval {
        settings.schedule.interval_secs = interval;
    }
    if let Some(timeout) = cli.timeout {
        settings.schedule.attempt_timeout_secs = timeout;
    }
    if let Some(start) = cli.start {
        settings.schedule.start = start;
    }
    if let Some(stop) = cli.stop {
        settings.schedule.stop = stop;
    }
    run(settings).await
}

async fn run(settings: Settings) -> Result<()> {
    let discovered = locate(&settings).await?;
    info!(addr = %discovered.addr, mac = %discovered.mac, "device located");

    let connect_timeout = Duration::from_secs(settings.device.connect_timeout_secs);
    let driver = SqmLeDriver::connect(discovered.addr, SESSION_PORT, connect_timeout)
        .await
        .context("establishing device session")?;
    let identity = driver
        .query_identity(&discovered)
        .await
        .context("querying device identity")?;

    let window = ScheduleWindow::new(
        settings.schedule.start,
        settings.schedule.stop,
        settings.schedule.interval_secs,
        settings.schedule.attempt_timeout_secs,
        Utc::now(),
    )
    .context("validating reading schedule")?;

    let sink = Arc::new(RecordFile::new(&settings.output.dir));
    let mut monitor = Monitor::new(
        Arc::new(driver),
        Arc::new(FixedAlmanac::new(settings.almanac.sky_state())),
        Arc::new(SystemClock),
        sink,
    );
    if !settings.output.destinations.is_empty() {
        monitor = monitor.with_uploader(
            Arc::new(DirectoryUploader::new(&settings.output.dir)),
            settings.output.destinations.clone(),
        );
    }

    monitor
        .run(window, &identity)
        .await
        .context("running reading schedule")?;
    Ok(())
}

/// Locate the device, either from the configured fixed address or via the
/// discovery broadcast.
async fn locate(settings: &Settings) -> Result<DiscoveredDevice> {
    if let Some(addr) = settings.device.addr {
        return Ok(DiscoveredDevice {
            addr,
            mac: settings
                .device
                .mac
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        });
    }
    discover(&settings.discovery)
        .await
        .context("discovering device")
}
