//! Clock and astronomy trait seams.
//!
//! The monitor consumes astronomical quantities as opaque inputs: a
//! timestamp source and a solar/lunar state provider. Ephemeris computation
//! itself lives behind the [`Almanac`] trait; [`FixedAlmanac`] is the
//! provided implementation for wiring and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock source for the polling loop.
///
/// Injected rather than read ambiently so scheduler tests can run on
/// simulated time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Solar and lunar state at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyState {
    /// Apparent solar altitude in degrees.
    pub solar_alt_deg: f64,
    /// Apparent lunar altitude in degrees.
    pub lunar_alt_deg: f64,
    /// Illuminated lunar fraction, 0.0 to 1.0.
    pub lunar_phase: f64,
}

/// Astronomy provider consumed by the polling loop.
pub trait Almanac: Send + Sync {
    /// Solar/lunar state at `at`.
    fn solar_lunar_state(&self, at: DateTime<Utc>) -> SkyState;
}

/// Almanac returning a constant state regardless of the instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedAlmanac {
    pub state: SkyState,
}

impl FixedAlmanac {
    pub fn new(state: SkyState) -> Self {
        Self { state }
    }
}

impl Default for FixedAlmanac {
    fn default() -> Self {
        Self {
            state: SkyState {
                solar_alt_deg: 0.0,
                lunar_alt_deg: 0.0,
                lunar_phase: 0.0,
            },
        }
    }
}

impl Almanac for FixedAlmanac {
    fn solar_lunar_state(&self, _at: DateTime<Utc>) -> SkyState {
        self.state
    }
}
