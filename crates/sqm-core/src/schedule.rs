//! Schedule window for the polling loop.

use chrono::{DateTime, Datelike, Utc};
use std::time::Duration;

use crate::error::{AppResult, SqmError};

/// Time window the polling loop runs over.
///
/// Constructed once before the loop begins and read-only thereafter.
/// Construction enforces the two precondition invariants: the attempt
/// timeout must be shorter than the interval, and `stop` must be in the
/// future relative to the supplied `now`. No other input is rejected; a
/// window whose `start` is at or past `stop` simply yields no slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// First slot boundary.
    pub start: DateTime<Utc>,
    /// Last instant a slot may be recorded at.
    pub stop: DateTime<Utc>,
    /// Seconds between slots.
    pub interval_secs: u32,
    /// Budget for the per-slot attempt loop, in seconds.
    pub attempt_timeout_secs: u32,
}

impl ScheduleWindow {
    /// Validate and build a window.
    pub fn new(
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        interval_secs: u32,
        attempt_timeout_secs: u32,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        if attempt_timeout_secs >= interval_secs {
            return Err(SqmError::WindowInvalid(format!(
                "attempt timeout ({attempt_timeout_secs}s) must be shorter than the interval ({interval_secs}s)"
            )));
        }
        if stop <= now {
            return Err(SqmError::WindowInvalid(format!(
                "stop time {stop} is not in the future (now {now})"
            )));
        }
        Ok(Self {
            start,
            stop,
            interval_secs,
            attempt_timeout_secs,
        })
    }

    /// Slot interval as a std duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_secs))
    }

    /// Per-slot attempt budget as a std duration.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.attempt_timeout_secs))
    }

    /// Output series key for this window: `YYYYMMDD-<serial>`, dated by the
    /// window's start.
    pub fn series_key(&self, serial: &str) -> String {
        format!(
            "{}{:02}{:02}-{}",
            self.start.year(),
            self.start.month(),
            self.start.day(),
            serial
        )
    }
}
