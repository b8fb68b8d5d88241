//! The per-slot reading and its record-line rendering.
//!
//! A [`Reading`] is produced once per scheduled slot and handed straight to
//! the collaborators; it is never retained. Its seven derived fields are
//! either all present (a successful attempt) or all absent (the attempt loop
//! exhausted its timeout), in which case every field renders as the single
//! failure sentinel.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::almanac::SkyState;
use crate::device::{DeviceIdentity, SkySample};

/// Failure marker applied uniformly to every derived field of a failed slot.
pub const SENTINEL: &str = "n/a";

/// Encoder offset column value for a successful reading.
///
/// The SQM Reader Pro file format carries this column; the LE hardware has
/// no encoder, so the value is constant.
pub const ENCODER_OFFSET: f64 = 0.1;

/// Naked-eye limiting magnitude derived from a raw mpsas reading.
///
/// Fixed closed-form transform, monotonically increasing in `mpsas`
/// (darker sky, fainter visible stars).
pub fn nelm(mpsas: f64) -> f64 {
    7.93 - 5.0 * (10f64.powf(4.316 - mpsas / 5.0) + 1.0).log10()
}

/// One scheduled reading attempt, complete or degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Wall-clock time the slot was recorded at.
    pub timestamp: DateTime<Utc>,
    /// Raw magnitude (mpsas), `None` on a failed slot.
    pub magnitude: Option<f64>,
    /// Derived naked-eye limiting magnitude.
    pub nelm: Option<f64>,
    /// Sensor temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Constant encoder offset column.
    pub encoder_offset: Option<f64>,
    /// Solar altitude in degrees at acquisition time.
    pub solar_alt_deg: Option<f64>,
    /// Lunar altitude in degrees at acquisition time.
    pub lunar_alt_deg: Option<f64>,
    /// Illuminated lunar fraction at acquisition time.
    pub lunar_phase: Option<f64>,
}

impl Reading {
    /// A fully populated reading from a raw sample plus the sky state.
    pub fn complete(timestamp: DateTime<Utc>, sample: SkySample, sky: SkyState) -> Self {
        Self {
            timestamp,
            magnitude: Some(sample.magnitude),
            nelm: Some(nelm(sample.magnitude)),
            temperature: Some(sample.temperature),
            encoder_offset: Some(ENCODER_OFFSET),
            solar_alt_deg: Some(sky.solar_alt_deg),
            lunar_alt_deg: Some(sky.lunar_alt_deg),
            lunar_phase: Some(sky.lunar_phase),
        }
    }

    /// A degraded reading: every derived field carries the sentinel.
    pub fn failed(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            magnitude: None,
            nelm: None,
            temperature: None,
            encoder_offset: None,
            solar_alt_deg: None,
            lunar_alt_deg: None,
            lunar_phase: None,
        }
    }

    /// Whether every derived field is populated.
    pub fn is_complete(&self) -> bool {
        self.magnitude.is_some()
            && self.nelm.is_some()
            && self.temperature.is_some()
            && self.encoder_offset.is_some()
            && self.solar_alt_deg.is_some()
            && self.lunar_alt_deg.is_some()
            && self.lunar_phase.is_some()
    }

    /// Render the comma-separated record line for this reading.
    ///
    /// Column order matches the SQM Reader Pro file format:
    /// date, time, MPSAS, NELM, serial, protocol, model, feature,
    /// temperature, encoder offset, solar altitude, lunar altitude,
    /// lunar phase.
    pub fn record_line(&self, identity: &DeviceIdentity) -> String {
        let date = format!(
            "{}/{:02}/{:02}",
            self.timestamp.year(),
            self.timestamp.month(),
            self.timestamp.day()
        );
        let time = format!(
            "{:02}:{:02}:{:02}",
            self.timestamp.hour(),
            self.timestamp.minute(),
            self.timestamp.second()
        );
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            date,
            time,
            fmt2(self.magnitude),
            fmt2(self.nelm),
            identity.serial,
            identity.protocol,
            identity.model,
            identity.feature,
            fmt1(self.temperature),
            fmt1(self.encoder_offset),
            fmt2(self.solar_alt_deg),
            fmt2(self.lunar_alt_deg),
            fmt2(self.lunar_phase),
        )
    }
}

fn fmt2(value: Option<f64>) -> String {
    value.map_or_else(|| SENTINEL.to_string(), |v| format!("{v:.2}"))
}

fn fmt1(value: Option<f64>) -> String {
    value.map_or_else(|| SENTINEL.to_string(), |v| format!("{v:.1}"))
}
