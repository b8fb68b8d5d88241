//! Runner configuration.

use chrono::{DateTime, Utc};
use config::Config;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;

use sqm_core::SkyState;
use sqm_driver_le::DiscoveryConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub device: DeviceSettings,
    pub schedule: ScheduleSettings,
    pub output: OutputSettings,
    #[serde(default)]
    pub almanac: AlmanacSettings,
}

/// Session settings, plus an optional fixed address that skips discovery.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceSettings {
    /// Device address. When set, the discovery broadcast is skipped.
    pub addr: Option<IpAddr>,
    /// Hardware address to record when discovery is skipped.
    pub mac: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            addr: None,
            mac: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleSettings {
    /// Window start, RFC 3339.
    pub start: DateTime<Utc>,
    /// Window stop, RFC 3339.
    pub stop: DateTime<Utc>,
    pub interval_secs: u32,
    pub attempt_timeout_secs: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    /// Directory the record files are written to.
    pub dir: PathBuf,
    /// Destination directories the series file is copied to.
    #[serde(default)]
    pub destinations: Vec<String>,
}

/// Fixed solar/lunar state recorded with every reading.
///
/// Stands in for a live ephemeris backend; defaults to zeros.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct AlmanacSettings {
    pub solar_alt_deg: f64,
    pub lunar_alt_deg: f64,
    pub lunar_phase: f64,
}

impl AlmanacSettings {
    pub fn sky_state(self) -> SkyState {
        SkyState {
            solar_alt_deg: self.solar_alt_deg,
            lunar_alt_deg: self.lunar_alt_deg,
            lunar_phase: self.lunar_phase,
        }
    }
}

impl Settings {
    pub fn load(config_path: &str) -> Result<Self, config::ConfigError> {
        let s = Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [schedule]
                start = "2026-03-03T00:00:00Z"
                stop = "2026-03-03T06:00:00Z"
                interval_secs = 60
                attempt_timeout_secs = 10

                [output]
                dir = "records"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.discovery.port, 30718);
        assert_eq!(settings.discovery.timeout_secs, 60);
        assert!(settings.device.addr.is_none());
        assert_eq!(settings.device.connect_timeout_secs, 60);
        assert!(settings.output.destinations.is_empty());
        assert_eq!(settings.almanac.solar_alt_deg, 0.0);
    }

    #[test]
    fn fixed_device_address_is_parsed() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [device]
                addr = "192.168.1.77"
                mac = "00:20:4a:b0:12:34"

                [schedule]
                start = "2026-03-03T00:00:00Z"
                stop = "2026-03-03T06:00:00Z"
                interval_secs = 60
                attempt_timeout_secs = 10

                [output]
                dir = "records"
                destinations = ["/mnt/observatory"]
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.device.addr, Some("192.168.1.77".parse().unwrap()));
        assert_eq!(settings.output.destinations, vec!["/mnt/observatory"]);
    }
}
