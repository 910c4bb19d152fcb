//! error.rs — domain error kinds
//!
//! The variants mirror how faults propagate: Config and State are the
//! only ones allowed to take the process down; Parse drops the offending
//! unit and carries on; Device and Sync are retried with backoff; Nav is
//! surfaced as an alarm while the boat holds her heading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelmError {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed location, NMEA sentence, or mission file input.
    #[error("parse error: {0}")]
    Parse(String),

    /// Serial open/read/write failure.
    #[error("device error: {0}")]
    Device(String),

    /// Could not synchronize with the low-level controller.
    #[error("controller sync error: {0}")]
    Sync(String),

    /// Shared-state backend unreachable.
    #[error("state store error: {0}")]
    State(String),

    /// Planner found no sailable candidate.
    #[error("navigation error: {0}")]
    Nav(String),
}

impl From<std::io::Error> for HelmError {
    fn from(e: std::io::Error) -> Self {
        HelmError::Device(e.to_string())
    }
}

impl From<nav_types::ParseError> for HelmError {
    fn from(e: nav_types::ParseError) -> Self {
        HelmError::Parse(e.to_string())
    }
}
