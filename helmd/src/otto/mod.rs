//! # otto
//!
//! Register-based link to the low-level controller that owns the rudder
//! and sail servos, the compass, and the apparent-wind sensor.
//!
//! - [`registers`]: register map and unit scaling (the wire contract)
//! - [`frame`]: inbound frame parsing and outbound formatting
//! - [`link`]: handshake, reader task, writer task, command handle

pub mod frame;
pub mod link;
pub mod registers;

pub use link::{run_reader, run_writer, synchronize, OttoHandle, RegisterWrite};
pub use registers::{OttoMode, Register};
