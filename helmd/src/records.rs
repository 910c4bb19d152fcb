//! records.rs — shared-store record schemas
//!
//! Hand-written codecs for the records that cross task boundaries. Each
//! record lists its fields explicitly; composite fields (Location) are
//! flattened into sub-fields and the telemetry array into numbered keys.

use nav_types::Location;

use crate::otto::registers;
use crate::store::{Record, Snapshot, Value};

// ── GPS fix ───────────────────────────────────────────────────────────────────

/// Latest position fix from the GPS receiver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsFix {
    /// Fix wall-clock time, epoch seconds.
    pub time: f64,
    pub location: Location,
    /// Speed over the ground, knots.
    pub sog: f64,
    /// Course made good, radians.
    pub cmg: f64,
    /// Magnetic variation, radians, west negative.
    pub magvar: f64,
    pub valid: bool,
}

impl Record for GpsFix {
    const PREFIX: &'static str = "gpsfix";

    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("time".into(), Value::Timestamp(self.time)),
            (
                "location.latitude".into(),
                Value::Float(self.location.latitude),
            ),
            (
                "location.longitude".into(),
                Value::Float(self.location.longitude),
            ),
            ("sog".into(), Value::Float(self.sog)),
            ("cmg".into(), Value::Float(self.cmg)),
            ("magvar".into(), Value::Float(self.magvar)),
            ("valid".into(), Value::Bool(self.valid)),
        ]
    }

    fn from_fields(snap: &Snapshot<'_>) -> Self {
        Self {
            time: snap.timestamp("time", 0.0),
            location: Location::new(
                snap.f64("location.latitude", 0.0),
                snap.f64("location.longitude", 0.0),
            ),
            sog: snap.f64("sog", 0.0),
            cmg: snap.f64("cmg", 0.0),
            magvar: snap.f64("magvar", 0.0),
            valid: snap.bool("valid", false),
        }
    }
}

// ── Controller state ──────────────────────────────────────────────────────────

pub const TELEMETRY_CHANNELS: usize = 16;

/// Mirror of the low-level controller as reported over the serial link.
/// Raw register units; the accessor methods convert to application
/// units.
#[derive(Debug, Clone, PartialEq)]
pub struct OttoState {
    pub mode: u8,
    pub alarm_status: u16,
    /// u8 ↔ −40…+40°.
    pub actual_rudder: u8,
    /// u8 ↔ 0…100 %.
    pub actual_sail: u8,
    /// u8 ↔ 0…2π.
    pub actual_compass: u8,
    /// i8 ↔ −π…+π.
    pub actual_awa: i8,
    /// Seconds since controller boot (24-bit).
    pub otto_timestamp: u32,
    /// 12-bit samples, one slot per telemetry channel.
    pub telemetry: [u16; TELEMETRY_CHANNELS],
}

impl Default for OttoState {
    fn default() -> Self {
        Self {
            mode: 0,
            alarm_status: 0,
            actual_rudder: 128, // centered
            actual_sail: 0,
            actual_compass: 0,
            actual_awa: 0,
            otto_timestamp: 0,
            telemetry: [0; TELEMETRY_CHANNELS],
        }
    }
}

impl OttoState {
    pub fn mode(&self) -> registers::OttoMode {
        registers::OttoMode::from_u8(self.mode)
    }

    pub fn compass_rad(&self) -> f64 {
        registers::register_to_compass(self.actual_compass)
    }

    pub fn awa_rad(&self) -> f64 {
        registers::register_to_awa(self.actual_awa as u8)
    }

    pub fn rudder_deg(&self) -> f64 {
        registers::register_to_rudder(self.actual_rudder)
    }

    pub fn sail_pct(&self) -> f64 {
        registers::register_to_sail(self.actual_sail)
    }
}

impl Record for OttoState {
    const PREFIX: &'static str = "ottostate";

    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![
            ("mode".into(), Value::Int(self.mode as i64)),
            (
                "alarm_status".into(),
                Value::Int(self.alarm_status as i64),
            ),
            (
                "actual_rudder".into(),
                Value::Int(self.actual_rudder as i64),
            ),
            ("actual_sail".into(), Value::Int(self.actual_sail as i64)),
            (
                "actual_compass".into(),
                Value::Int(self.actual_compass as i64),
            ),
            ("actual_awa".into(), Value::Int(self.actual_awa as i64)),
            (
                "otto_timestamp".into(),
                Value::Int(self.otto_timestamp as i64),
            ),
        ];
        for (i, sample) in self.telemetry.iter().enumerate() {
            fields.push((format!("telemetry{}", i + 1), Value::Int(*sample as i64)));
        }
        fields
    }

    fn from_fields(snap: &Snapshot<'_>) -> Self {
        let mut telemetry = [0u16; TELEMETRY_CHANNELS];
        for (i, slot) in telemetry.iter_mut().enumerate() {
            *slot = snap.i64(&format!("telemetry{}", i + 1), 0) as u16;
        }
        Self {
            mode: snap.i64("mode", 0) as u8,
            alarm_status: snap.i64("alarm_status", 0) as u16,
            actual_rudder: snap.i64("actual_rudder", 128) as u8,
            actual_sail: snap.i64("actual_sail", 0) as u8,
            actual_compass: snap.i64("actual_compass", 0) as u8,
            actual_awa: snap.i64("actual_awa", 0) as i8,
            otto_timestamp: snap.i64("otto_timestamp", 0) as u32,
            telemetry,
        }
    }
}

// ── Mission status ────────────────────────────────────────────────────────────

/// Mission lifecycle states, in transition order. Terminal states never
/// regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(i64)]
pub enum MissionState {
    #[default]
    Awaiting = 0,
    ReadyToStart = 1,
    StartTest = 2,
    RadioControl = 3,
    CompassFollow = 4,
    WindFollow = 5,
    Complete = 6,
    Terminated = 7,
    Failure = 8,
}

impl MissionState {
    pub fn from_i64(v: i64) -> Self {
        use MissionState::*;
        match v {
            1 => ReadyToStart,
            2 => StartTest,
            3 => RadioControl,
            4 => CompassFollow,
            5 => WindFollow,
            6 => Complete,
            7 => Terminated,
            8 => Failure,
            _ => Awaiting,
        }
    }
}

/// The one record the mission persists; evolves monotonically through
/// its terminal states.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionStatus {
    pub state: MissionState,
    /// Index into the attractor list; −1 = unstarted.
    pub current_waypoint: i32,
    /// Epoch seconds; 0 = not yet.
    pub start_time: f64,
    pub end_time: f64,
}

impl Default for MissionStatus {
    fn default() -> Self {
        Self {
            state: MissionState::Awaiting,
            current_waypoint: -1,
            start_time: 0.0,
            end_time: 0.0,
        }
    }
}

impl MissionStatus {
    /// Underway: the boat is sailing and the navigator may steer.
    pub fn active(&self) -> bool {
        self.state >= MissionState::StartTest && self.state < MissionState::Complete
    }
}

impl Record for MissionStatus {
    const PREFIX: &'static str = "missionstatus";

    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("state".into(), Value::Int(self.state as i64)),
            (
                "current_waypoint".into(),
                Value::Int(self.current_waypoint as i64),
            ),
            ("start_time".into(), Value::Timestamp(self.start_time)),
            ("end_time".into(), Value::Timestamp(self.end_time)),
        ]
    }

    fn from_fields(snap: &Snapshot<'_>) -> Self {
        Self {
            state: MissionState::from_i64(snap.i64("state", 0)),
            current_waypoint: snap.i64("current_waypoint", -1) as i32,
            start_time: snap.timestamp("start_time", 0.0),
            end_time: snap.timestamp("end_time", 0.0),
        }
    }
}
