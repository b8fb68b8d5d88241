//! `sqm-engine`
//!
//! The time-synchronized polling scheduler: [`Monitor`] fires reading
//! attempts at interval boundaries of a [`sqm_core::ScheduleWindow`],
//! compensates waits for processing latency, degrades failed slots to the
//! sentinel, and threads each reading through the persistence, plot, and
//! transfer collaborators.

pub mod monitor;

pub use monitor::Monitor;
