//! Device-facing types and the sensor capability seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::error::AppResult;

/// Identity of a discovered sky-brightness sensor.
///
/// Assembled once at session start from the discovery reply (MAC, address)
/// and the device's identity query (protocol, model, feature, serial), and
/// immutable thereafter. The serial number is the stable key used for output
/// series naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Hardware address, colon-hex (e.g. `00:20:4a:b0:12:34`).
    pub mac: String,
    /// Network address the session is established against.
    pub addr: IpAddr,
    /// Session port (fixed, not learned from the discovery reply).
    pub port: u16,
    /// Protocol revision reported by the identity query.
    pub protocol: String,
    /// Model number reported by the identity query.
    pub model: String,
    /// Feature revision reported by the identity query.
    pub feature: String,
    /// Serial number reported by the identity query.
    pub serial: String,
}

/// One successful raw measurement from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkySample {
    /// Sky brightness in magnitudes per square arcsecond (mpsas).
    pub magnitude: f64,
    /// Sensor temperature in degrees Celsius.
    pub temperature: f64,
}

/// Capability seam between the polling loop and a concrete driver.
///
/// The one-request-per-connection quirk of the hardware is the driver's
/// business: a `sample` call leaves the session ready for the next call,
/// whether it succeeded or not.
#[async_trait]
pub trait SkySensor: Send + Sync {
    /// Take one measurement. Recoverable errors may be retried immediately.
    async fn sample(&self) -> AppResult<SkySample>;
}
