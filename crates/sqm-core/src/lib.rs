//! `sqm-core`
//!
//! Core types and trait seams for the sqm-mon sky-brightness monitor.
//!
//! This crate holds everything shared between the device driver, the polling
//! engine, storage, and the runner binary:
//!
//! - [`SqmError`] / [`AppResult`]: the workspace error taxonomy
//! - [`DeviceIdentity`], [`SkySample`], [`SkySensor`]: the sensor seam
//! - [`Reading`] and the fixed [`nelm`] transform: the per-slot record
//! - [`ScheduleWindow`]: the validated polling window
//! - [`Clock`], [`Almanac`], [`RecordSink`], [`Plotter`], [`Uploader`]:
//!   collaborator seams, with fixed/no-op implementations for wiring
//! - [`retry_for`]: the shared bounded-retry combinator

pub mod almanac;
pub mod device;
pub mod error;
pub mod reading;
pub mod retry;
pub mod schedule;
pub mod sink;

pub use almanac::{Almanac, Clock, FixedAlmanac, SkyState, SystemClock};
pub use device::{DeviceIdentity, SkySample, SkySensor};
pub use error::{AppResult, SqmError};
pub use reading::{nelm, Reading, ENCODER_OFFSET, SENTINEL};
pub use retry::retry_for;
pub use schedule::ScheduleWindow;
pub use sink::{NoopPlotter, NoopUploader, Plotter, RecordSink, Uploader};
