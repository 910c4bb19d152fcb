//! alarm.rs — alarm bits and the published alarm report
//!
//! One bit assignment serves both bitmaps: the controller's alarm status
//! arriving in `$` frames and the application-raised alarms kept in the
//! [`AlarmReport`] record. Raising an alarm persists the bit and
//! publishes the report so every observer wakes.

use std::fmt;

use tracing::warn;

use crate::store::{Record, Snapshot, StateStore, Value};

/// Alarm identities, by bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Alarm {
    /// Controller-raised: the mothership stopped talking to it.
    MotherUnresp = 0,
    /// Controller boot-seconds went backwards — it rebooted under us.
    OttoRestart = 1,
    GpsInvalid = 2,
    WaypointReached = 3,
    MissionCommence = 4,
    MissionComplete = 5,
    MissionAbort = 6,
    CrossTrackError = 7,
    InsideFence = 8,
    /// Planner found no candidate with positive utility; heading held.
    NoSteeringSolution = 9,
}

impl Alarm {
    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Decode every set bit of a bitmap.
    pub fn from_bitmap(bitmap: u16) -> Vec<Alarm> {
        use Alarm::*;
        [
            MotherUnresp,
            OttoRestart,
            GpsInvalid,
            WaypointReached,
            MissionCommence,
            MissionComplete,
            MissionAbort,
            CrossTrackError,
            InsideFence,
            NoSteeringSolution,
        ]
        .into_iter()
        .filter(|a| bitmap & a.bit() != 0)
        .collect()
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Alarm::MotherUnresp => "MOTHER_UNRESP",
            Alarm::OttoRestart => "OTTO_RESTART",
            Alarm::GpsInvalid => "GPS_INVALID",
            Alarm::WaypointReached => "WAYPOINT_REACHED",
            Alarm::MissionCommence => "MISSION_COMMENCE",
            Alarm::MissionComplete => "MISSION_COMPLETE",
            Alarm::MissionAbort => "MISSION_ABORT",
            Alarm::CrossTrackError => "CROSS_TRACK_ERROR",
            Alarm::InsideFence => "INSIDE_FENCE",
            Alarm::NoSteeringSolution => "NO_STEERING_SOLUTION",
        };
        f.write_str(name)
    }
}

// ── Published report ──────────────────────────────────────────────────────────

/// The application-side alarm bitmap, one record in the shared store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmReport {
    pub bitmap: u16,
    /// When the bitmap last changed, epoch seconds.
    pub changed_at: f64,
}

impl AlarmReport {
    pub fn is_set(&self, alarm: Alarm) -> bool {
        self.bitmap & alarm.bit() != 0
    }
}

impl Record for AlarmReport {
    const PREFIX: &'static str = "alarmreport";

    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("bitmap".into(), Value::Int(self.bitmap as i64)),
            ("changed_at".into(), Value::Timestamp(self.changed_at)),
        ]
    }

    fn from_fields(snap: &Snapshot<'_>) -> Self {
        Self {
            bitmap: snap.i64("bitmap", 0) as u16,
            changed_at: snap.timestamp("changed_at", 0.0),
        }
    }
}

/// Set the alarm's bit, persist, and publish. Always publishes, even
/// when the bit was already up, so subscribers see every raise.
pub async fn raise(store: &StateStore, alarm: Alarm) {
    warn!(alarm = %alarm, "alarm raised");
    store
        .update::<AlarmReport>(|report| {
            if !report.is_set(alarm) {
                report.bitmap |= alarm.bit();
                report.changed_at = crate::store::epoch_seconds();
            }
        })
        .await;
}

/// Drop the alarm's bit, persist, and publish.
pub async fn clear(store: &StateStore, alarm: Alarm) {
    store
        .update::<AlarmReport>(|report| {
            if report.is_set(alarm) {
                report.bitmap &= !alarm.bit();
                report.changed_at = crate::store::epoch_seconds();
            }
        })
        .await;
}
