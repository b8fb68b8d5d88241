//! SQM-LE request/reply protocol.
//!
//! Commands are fixed byte strings; replies are fixed-length ASCII records,
//! comma-separated, fields padded with leading zeros and (for measurements)
//! a trailing one-character unit suffix.
//!
//! The one-request-per-connection rule is enforced here, inside
//! [`SqmLeDriver::query`]: every transaction is followed by a full session
//! reset before the call returns, on success and on failure alike. Callers
//! can never forget it.

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use sqm_core::{AppResult, DeviceIdentity, SkySample, SkySensor, SqmError};

use crate::discovery::DiscoveredDevice;
use crate::session::SessionManager;

/// Identity query command.
pub const IDENTITY_CMD: &[u8] = b"ix";
/// Fixed identity reply length in bytes.
pub const IDENTITY_REPLY_LEN: usize = 38;

/// Measurement query command.
pub const MEASUREMENT_CMD: &[u8] = b"rx";
/// Fixed measurement reply length in bytes.
pub const MEASUREMENT_REPLY_LEN: usize = 56;

/// Driver for the SQM-LE ethernet sky-brightness sensor.
pub struct SqmLeDriver {
    session: SessionManager,
}

impl SqmLeDriver {
    /// Connect to a device at `addr:port` within `connect_timeout`.
    pub async fn connect(addr: IpAddr, port: u16, connect_timeout: Duration) -> AppResult<Self> {
        let session = SessionManager::new(addr, port, connect_timeout);
        session.connect().await?;
        Ok(Self { session })
    }

    /// Execute one raw transaction: send `cmd`, read exactly `expected_len`
    /// reply bytes, then reset the session.
    ///
    /// The reset runs unconditionally; a reset failure (the peer is gone for
    /// good) outranks whatever the transaction itself returned.
    pub async fn query(&self, cmd: &[u8], expected_len: usize) -> AppResult<String> {
        let outcome = {
            let mut guard = self.session.stream_guard().await;
            match guard.as_mut() {
                Some(stream) => transact(stream, cmd, expected_len).await,
                None => Err(SqmError::Protocol("no live session".to_string())),
            }
        };

        if let Err(err) = &outcome {
            tracing::warn!(error = %err, "transaction failed; resetting session");
        }
        self.session.reset().await?;

        let raw = outcome?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Query the device's identity record.
    ///
    /// The full [`DeviceIdentity`] combines the reply with what discovery
    /// already learned (hardware and network address).
    pub async fn query_identity(&self, discovered: &DiscoveredDevice) -> AppResult<DeviceIdentity> {
        let reply = self.query(IDENTITY_CMD, IDENTITY_REPLY_LEN).await?;
        let (protocol, model, feature, serial) = parse_identity(&reply)?;
        let identity = DeviceIdentity {
            mac: discovered.mac.clone(),
            addr: self.session.peer().ip(),
            port: self.session.peer().port(),
            protocol,
            model,
            feature,
            serial,
        };
        tracing::info!(
            serial = %identity.serial,
            model = %identity.model,
            protocol = %identity.protocol,
            "device identified"
        );
        Ok(identity)
    }

    /// Query one sky-brightness measurement.
    pub async fn query_measurement(&self) -> AppResult<SkySample> {
        let reply = self.query(MEASUREMENT_CMD, MEASUREMENT_REPLY_LEN).await?;
        parse_measurement(&reply)
    }
}

#[async_trait]
impl SkySensor for SqmLeDriver {
    async fn sample(&self) -> AppResult<SkySample> {
        self.query_measurement().await
    }
}

/// Send the command and read exactly the expected reply length.
///
/// No internal timeout: the caller bounds total attempt time externally
/// (the polling loop's per-attempt budget).
async fn transact(stream: &mut TcpStream, cmd: &[u8], expected_len: usize) -> AppResult<Vec<u8>> {
    stream.write_all(cmd).await?;
    let mut reply = vec![0u8; expected_len];
    stream.read_exact(&mut reply).await?;
    Ok(reply)
}

/// Parse the identity reply: five comma-separated, zero-padded fields
/// `(type, protocol, model, feature, serial)`.
fn parse_identity(reply: &str) -> AppResult<(String, String, String, String)> {
    let cleaned: String = reply.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    let fields: Vec<&str> = cleaned.split(',').collect();
    if fields.len() != 5 {
        return Err(SqmError::Protocol(format!(
            "identity reply has {} fields, expected 5: {cleaned:?}",
            fields.len()
        )));
    }
    let strip = |s: &str| s.trim_start_matches('0').to_string();
    Ok((
        strip(fields[1]),
        strip(fields[2]),
        strip(fields[3]),
        strip(fields[4]),
    ))
}

/// Parse the measurement reply: six comma-separated fields, each padded
/// with leading zeros and carrying a one-character unit suffix. Field 1 is
/// the magnitude (mpsas), field 5 the sensor temperature (°C).
fn parse_measurement(reply: &str) -> AppResult<SkySample> {
    let cleaned: String = reply
        .chars()
        .filter(|c| !matches!(c, ' ' | '\r' | '\n'))
        .collect();
    let fields: Vec<&str> = cleaned.split(',').collect();
    if fields.len() != 6 {
        return Err(SqmError::Protocol(format!(
            "measurement reply has {} fields, expected 6: {cleaned:?}",
            fields.len()
        )));
    }
    Ok(SkySample {
        magnitude: numeric_field(fields[1])?,
        temperature: numeric_field(fields[5])?,
    })
}

/// Strip leading zero padding and the trailing unit character, then parse.
fn numeric_field(field: &str) -> AppResult<f64> {
    let stripped = field.trim_start_matches('0');
    if stripped.len() < 2 {
        return Err(SqmError::Protocol(format!(
            "field {field:?} too short for a value plus unit suffix"
        )));
    }
    // Drop the last char, not the last byte: a garbled reply decoded
    // lossily can end the field with a multi-byte replacement char.
    let mut chars = stripped.chars();
    let unit = chars.next_back();
    if !unit.is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(SqmError::Protocol(format!(
            "field {field:?} does not end in a unit suffix"
        )));
    }
    let value = chars.as_str();
    value
        .parse::<f64>()
        .map_err(|_| SqmError::Protocol(format!("field {field:?} is not numeric: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identity_reply() {
        let reply = "i,00000002,00000003,00000001,0000413\r\n";
        let (protocol, model, feature, serial) = parse_identity(reply).unwrap();
        assert_eq!(protocol, "2");
        assert_eq!(model, "3");
        assert_eq!(feature, "1");
        assert_eq!(serial, "413");
    }

    #[test]
    fn rejects_identity_with_wrong_field_count() {
        let err = parse_identity("i,1,2,3\r\n").unwrap_err();
        assert!(matches!(err, SqmError::Protocol(_)));
    }

    #[test]
    fn parses_measurement_reply() {
        let reply = "r, 19.50m,0000000005,0000000.000,0000000.000,000023.2C\r\n";
        let sample = parse_measurement(reply).unwrap();
        assert!((sample.magnitude - 19.50).abs() < 1e-9);
        assert!((sample.temperature - 23.2).abs() < 1e-9);
    }

    #[test]
    fn garbled_reply_is_a_protocol_error_not_a_panic() {
        // A corrupted unit suffix survives the lossy decode as the
        // multi-byte replacement char; dropping it must stay on char
        // boundaries and classify as recoverable.
        let raw = b"r, 19.5\xff,0000000005,0000000.000,0000000.000,000023.2C\r\n";
        let reply = String::from_utf8_lossy(raw).into_owned();
        let err = parse_measurement(&reply).unwrap_err();
        assert!(matches!(err, SqmError::Protocol(_)));
    }

    #[test]
    fn rejects_non_numeric_measurement_field() {
        let reply = "r, xx.xxm,0000000005,0000000.000,0000000.000,000023.2C\r\n";
        let err = parse_measurement(reply).unwrap_err();
        assert!(matches!(err, SqmError::Protocol(_)));
    }

    #[test]
    fn command_lengths_are_fixed() {
        assert_eq!(IDENTITY_CMD, b"ix");
        assert_eq!(IDENTITY_REPLY_LEN, 38);
        assert_eq!(MEASUREMENT_CMD, b"rx");
        assert_eq!(MEASUREMENT_REPLY_LEN, 56);
    }
}
