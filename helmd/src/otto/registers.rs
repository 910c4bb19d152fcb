//! registers.rs — controller register map and unit scaling
//!
//! The numbering and the scaling constants are the wire contract with
//! the low-level controller; both ends must agree bit-for-bit.

use nav_types::geo::{absolute, normalize_pi};

/// Writable controller registers, by wire number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    AlarmClear = 0,
    MissionControl = 1,
    Mode = 2,
    Buzzer = 3,
    RudderAngle = 4,
    SailAngle = 5,
    CompassHeading = 6,
    MinCompass = 7,
    MaxCompass = 8,
    AwaHeading = 9,
    MinAwa = 10,
    MaxAwa = 11,
    WakeDuration = 12,
    NextWakeup = 13,
    RudderPidP = 14,
    RudderPidI = 15,
    RudderPidD = 16,
    RudderPidENum = 17,
    RudderPidEDen = 18,
    RudderPidUDiv = 19,
    SailMxcM = 20,
    SailMxcC = 21,
    SailMxcUDiv = 22,
}

/// Controller operating modes, as carried in the MODE register and `!`
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OttoMode {
    #[default]
    Inert = 0,
    Diagnostic = 1,
    /// Rudder and sail driven directly by register writes.
    Manual = 2,
    /// Controller PID holds the commanded compass heading.
    TrackCompass = 3,
    /// Controller holds the commanded apparent wind angle.
    TrackAwa = 4,
}

impl OttoMode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Diagnostic,
            2 => Self::Manual,
            3 => Self::TrackCompass,
            4 => Self::TrackAwa,
            _ => Self::Inert,
        }
    }
}

// ── Scaling ───────────────────────────────────────────────────────────────────
//
// Rudder: degrees in [−40, +40] ↔ u8, 128 = centered.
// Sail: percent in [0, 100] ↔ u8.
// Compass: radians ↔ u8, x·π/128, 0 = north, wraps mod 256.
// AWA: as compass but sign-extended, values > 128 are negative.

const RUDDER_SCALE: f64 = 3.175;
const SAIL_SCALE: f64 = 2.55;
const ANGLE_SCALE: f64 = 128.0 / std::f64::consts::PI;

pub fn rudder_to_register(degrees: f64) -> u8 {
    (RUDDER_SCALE * degrees + 128.0).round().clamp(0.0, 255.0) as u8
}

pub fn register_to_rudder(register: u8) -> f64 {
    (register as f64 - 128.0) / RUDDER_SCALE
}

pub fn sail_to_register(percent: f64) -> u8 {
    (SAIL_SCALE * percent).round().clamp(0.0, 255.0) as u8
}

pub fn register_to_sail(register: u8) -> f64 {
    register as f64 / SAIL_SCALE
}

pub fn compass_to_register(radians: f64) -> u8 {
    ((absolute(radians) * ANGLE_SCALE).round() as i64).rem_euclid(256) as u8
}

pub fn register_to_compass(register: u8) -> f64 {
    register as f64 / ANGLE_SCALE
}

pub fn awa_to_register(radians: f64) -> u8 {
    let scaled = (normalize_pi(radians) * ANGLE_SCALE).round() as i64;
    (scaled & 0xff) as u8
}

pub fn register_to_awa(register: u8) -> f64 {
    (register as i8) as f64 / ANGLE_SCALE
}
