//! `sqm-driver-le`
//!
//! Driver for the SQM-LE ethernet sky-brightness sensor:
//!
//! - [`discovery`]: UDP broadcast probe that locates the device and
//!   extracts its hardware address
//! - [`session`]: ownership of the single live TCP session, with the
//!   mandatory drain-and-reconnect reset the firmware requires between
//!   commands
//! - [`driver`]: the fixed command/reply protocol, with typed identity
//!   and measurement queries; implements [`sqm_core::SkySensor`]
//! - [`sim`]: a loopback device simulator for tests

pub mod discovery;
pub mod driver;
pub mod session;
pub mod sim;

pub use discovery::{discover, DiscoveredDevice, DiscoveryConfig, DISCOVERY_PORT, SESSION_PORT};
pub use driver::SqmLeDriver;
pub use session::SessionManager;
