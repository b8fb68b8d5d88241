//! The polling loop.
//!
//! A single task drives the whole schedule; suspension happens only at the
//! timed waits and inside the sensor's socket I/O, so readings come out
//! strictly in time order and the session is never touched concurrently.
//!
//! # Slot timing
//!
//! The first slot is aligned to the window's start (or to the next interval
//! boundary relative to it when the loop starts mid-window). Every
//! subsequent wait is re-derived from the current wall-clock second,
//! `interval - (second mod interval)`, and the time already spent acquiring
//! and persisting a slot is subtracted from the wait, so processing latency
//! never compounds into drift.

use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sqm_core::{
    retry_for, Almanac, AppResult, Clock, DeviceIdentity, NoopPlotter, NoopUploader, Plotter,
    Reading, RecordSink, ScheduleWindow, SkySensor, SqmError, Uploader,
};

/// Drives a [`ScheduleWindow`] against a sensor, handing each completed
/// reading to the collaborators.
pub struct Monitor {
    sensor: Arc<dyn SkySensor>,
    almanac: Arc<dyn Almanac>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RecordSink>,
    plotter: Arc<dyn Plotter>,
    uploader: Arc<dyn Uploader>,
    destinations: Vec<String>,
}

impl Monitor {
    pub fn new(
        sensor: Arc<dyn SkySensor>,
        almanac: Arc<dyn Almanac>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            sensor,
            almanac,
            clock,
            sink,
            plotter: Arc::new(NoopPlotter),
            uploader: Arc::new(NoopUploader),
            destinations: Vec::new(),
        }
    }

    /// Attach a plot renderer fired after each slot, best-effort.
    pub fn with_plotter(mut self, plotter: Arc<dyn Plotter>) -> Self {
        self.plotter = plotter;
        self
    }

    /// Attach an uploader and the destination profiles it pushes to, per
    /// slot and once more at end-of-window, best-effort.
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>, destinations: Vec<String>) -> Self {
        self.uploader = uploader;
        self.destinations = destinations;
        self
    }

    /// Run the schedule to completion.
    ///
    /// Fatal errors: [`SqmError::WindowInvalid`] when the window has already
    /// expired, and [`SqmError::Storage`] from the record sink. A failed
    /// reading never aborts the run; the slot degrades to the sentinel.
    pub async fn run(&self, window: ScheduleWindow, identity: &DeviceIdentity) -> AppResult<()> {
        let series = window.series_key(&identity.serial);
        info!(
            start = %window.start,
            stop = %window.stop,
            interval_secs = window.interval_secs,
            attempt_timeout_secs = window.attempt_timeout_secs,
            series = %series,
            "beginning reading schedule"
        );

        self.align(&window).await?;

        let mut slots = 0u32;
        loop {
            let slot_started = Instant::now();
            let now = self.clock.now();
            if now > window.stop {
                break;
            }

            let next_wait = self.slot_wait(&window, now);
            let reading = self.acquire(now, window.attempt_timeout()).await;
            debug!(slot = %now, complete = reading.is_complete(), "slot acquired");

            self.sink.append(&series, &reading.record_line(identity)).await?;
            slots += 1;

            if let Err(err) = self.plotter.render(&series).await {
                warn!(error = %err, "plot render failed; continuing");
            }
            for destination in &self.destinations {
                if let Err(err) = self.uploader.upload(&series, destination).await {
                    warn!(destination = %destination, error = %err, "per-slot upload failed; continuing");
                }
            }

            sleep_remaining(next_wait, slot_started).await;
        }

        for destination in &self.destinations {
            if let Err(err) = self.uploader.upload(&series, destination).await {
                error!(destination = %destination, error = %err, "final upload failed");
            }
        }

        info!(series = %series, slots, "reading schedule complete");
        Ok(())
    }

    /// Wait out the gap between now and the first slot boundary.
    async fn align(&self, window: &ScheduleWindow) -> AppResult<()> {
        let align_started = Instant::now();
        let now = self.clock.now();

        let wait = if now < window.start {
            (window.start - now).to_std().unwrap_or(Duration::ZERO)
        } else if now < window.stop {
            let interval_ms = i64::from(window.interval_secs) * 1000;
            let into_window_ms = (now - window.start).num_milliseconds();
            let remainder = interval_ms - into_window_ms % interval_ms;
            Duration::from_millis(remainder.unsigned_abs())
        } else {
            return Err(SqmError::WindowInvalid(format!(
                "stop time {} has already passed (now {now})",
                window.stop
            )));
        };

        debug!(wait_secs = wait.as_secs_f64(), "aligning to first slot boundary");
        sleep_remaining(wait, align_started).await;
        Ok(())
    }

    /// Wait until the next slot, re-derived from the current wall-clock
    /// second rather than accumulated offset since the window start.
    fn slot_wait(&self, window: &ScheduleWindow, now: DateTime<Utc>) -> Duration {
        let interval = i64::from(window.interval_secs);
        let second = i64::from(now.second());
        Duration::from_secs((interval - second % interval).unsigned_abs())
    }

    /// Attempt loop for one slot, bounded by the per-attempt timeout.
    ///
    /// Each failed attempt has already reset the session (the driver does so
    /// inside every query), so retries go out immediately. Exhausting the
    /// budget degrades the slot to the sentinel instead of aborting; the sky
    /// state for a successful reading is taken at the current instant, not
    /// the slot instant.
    async fn acquire(&self, slot_time: DateTime<Utc>, budget: Duration) -> Reading {
        match retry_for(budget, Duration::ZERO, || self.sensor.sample()).await {
            Ok(sample) => {
                let sky = self.almanac.solar_lunar_state(self.clock.now());
                Reading::complete(slot_time, sample, sky)
            }
            Err(err) => {
                warn!(slot = %slot_time, error = %err, "attempt budget exhausted; recording sentinel slot");
                Reading::failed(slot_time)
            }
        }
    }
}

/// Sleep for `total` minus whatever has already elapsed since `since`.
async fn sleep_remaining(total: Duration, since: Instant) {
    if let Some(remaining) = total.checked_sub(since.elapsed()) {
        tokio::time::sleep(remaining).await;
    }
}
