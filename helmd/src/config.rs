//! config.rs — daemon configuration
//!
//! One TOML file names the two serial ports, the mission document, and
//! the read timeout. Anything wrong here is fatal at startup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::HelmError;

fn default_baud() -> u32 {
    9600
}

fn default_read_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialPortConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelmConfig {
    /// Low-level controller port.
    pub otto: SerialPortConfig,
    /// GPS receiver port.
    pub gps: SerialPortConfig,
    /// Mission document path.
    pub mission_file: String,
    /// Serial read timeout, seconds. Timeouts are routine, not faults.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Commission the mission at boot instead of waiting for a start.
    #[serde(default)]
    pub auto_start: bool,
}

impl HelmConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HelmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HelmError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&text)
            .map_err(|e| HelmError::Config(format!("config {}: {e}", path.display())))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
