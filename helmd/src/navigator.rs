//! # navigator
//!
//! Vector-field planner. Each cycle the boat's sensed heading and
//! apparent wind rebuild the working course, every waypoint's bearing
//! is refreshed from the latest fix, and a swing window around the
//! bearing to the current attractor is searched for the heading with
//! the best relative-VMG utility. Attractors pull, repellors push, and
//! changing tack costs dearly.
//!
//! The planner is deterministic: identical inputs always pick the same
//! heading (earliest-seen candidate wins exact ties).

use tracing::{debug, info, warn};

use nav_types::{Bearing, Course, Waypoint};

use crate::alarm::{self, Alarm};
use crate::error::HelmError;
use crate::mission::Mission;
use crate::otto::OttoHandle;
use crate::records::{GpsFix, MissionStatus, OttoState};
use crate::store::StateStore;

/// Half-width of the heading search window around the bearing to the
/// current attractor, degrees.
pub const SWING_DEG: i64 = 45;

/// How many attractors beyond the current one contribute to the field.
const LOOKAHEAD: usize = 3;

/// Candidates slower than this are head-to-wind and skipped, knots.
const MIN_SPEED_KN: f64 = 0.001;

/// Utility multiplier for candidates on the other tack.
const TACK_PENALTY: f64 = 0.1;

/// What one planner cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Committed a heading; `tacked` when it crossed the wind.
    Steered { heading: f64, tacked: bool },
    /// No sailable candidate; current heading held.
    Held,
    /// GPS fix invalid; nothing done.
    Skipped,
    /// Attractor list exhausted.
    Complete,
}

pub struct Navigator {
    attractors: Vec<Waypoint>,
    repellors: Vec<Waypoint>,
    course: Course,
    store: StateStore,
    otto: OttoHandle,
}

impl Navigator {
    pub fn new(mission: &Mission, store: StateStore, otto: OttoHandle) -> Self {
        Self {
            attractors: mission.attractors.clone(),
            repellors: mission.repellors.clone(),
            course: Course::new(Bearing::default()),
            store,
            otto,
        }
    }

    /// Run one planning cycle against the latest GpsFix and OttoState.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, HelmError> {
        let fix: GpsFix = self.store.load().await;
        if !fix.valid {
            debug!("holding: gps fix invalid");
            return Ok(CycleOutcome::Skipped);
        }
        let otto_state: OttoState = self.store.load().await;
        let mut status: MissionStatus = self.store.load().await;

        if self.attractors.is_empty() {
            return Err(HelmError::Nav("active mission with no attractors".into()));
        }
        if status.current_waypoint < 0 {
            status.current_waypoint = 0;
            self.store.save(&status).await;
        }
        let mut current = status.current_waypoint as usize;
        if current >= self.attractors.len() {
            return Ok(CycleOutcome::Complete);
        }

        // Rebuild the working course from the sensors and recover the
        // true wind direction from heading + awa.
        self.course.set_heading(otto_state.compass_rad());
        self.course.set_awa(otto_state.awa_rad());
        self.course.compute_wind();

        for w in self.attractors[current..].iter_mut() {
            w.compute_bearing(&fix.location);
        }
        for r in self.repellors.iter_mut() {
            r.compute_bearing(&fix.location);
        }

        // Advance through every waypoint already inside its reached band.
        while status.active() && self.attractors[current].reached() {
            info!(waypoint = %self.attractors[current].name, "waypoint reached");
            alarm::raise(&self.store, Alarm::WaypointReached).await;
            current += 1;
            status.current_waypoint = current as i32;
            self.store.save(&status).await;
            if current >= self.attractors.len() {
                return Ok(CycleOutcome::Complete);
            }
        }

        let target = self.attractors[current].bearing.angle;
        let lookahead_end = (current + LOOKAHEAD).min(self.attractors.len() - 1);

        let mut best: Option<(f64, Course)> = None;
        for swing in -SWING_DEG..=SWING_DEG {
            let mut candidate = self.course.clone();
            candidate.set_heading(target + (swing as f64).to_radians());
            if candidate.speed() < MIN_SPEED_KN {
                continue; // head to wind
            }

            let mut utility = candidate.relative_vmg(&self.attractors[current]);
            for attractor in &self.attractors[current..=lookahead_end] {
                utility += candidate.relative_vmg(attractor);
            }
            for repellor in &self.repellors {
                utility -= candidate.relative_vmg(repellor);
            }
            if candidate.tack() != self.course.tack() {
                utility *= TACK_PENALTY;
            }
            if !utility.is_finite() {
                continue; // treated as −∞
            }

            if best.as_ref().map_or(true, |(u, _)| utility > *u) {
                best = Some((utility, candidate));
            }
        }

        let Some((utility, chosen)) = best else {
            warn!("no sailable candidate in the swing window, holding heading");
            alarm::raise(&self.store, Alarm::NoSteeringSolution).await;
            return Ok(CycleOutcome::Held);
        };

        let tacked = chosen.tack() != self.course.tack();
        if tacked {
            info!(
                from = ?self.course.tack(),
                to = ?chosen.tack(),
                "tacking"
            );
        }
        let heading = chosen.heading();
        debug!(heading, utility, waypoint = %self.attractors[current].name, "steering");
        self.course = chosen;
        self.otto.track_compass(heading).await;

        Ok(CycleOutcome::Steered { heading, tacked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otto::link::RegisterWrite;
    use crate::otto::{OttoMode, Register};
    use crate::records::MissionState;
    use nav_types::Location;
    use std::f64::consts::PI;
    use tokio::sync::mpsc;

    fn mission_with(attractors: Vec<Waypoint>, repellors: Vec<Waypoint>) -> Mission {
        Mission {
            title: "trial".into(),
            url: String::new(),
            description: String::new(),
            launch: None,
            attractors,
            repellors,
        }
    }

    fn boat() -> Location {
        Location::from_degrees(53.0, -9.0)
    }

    /// Waypoint `nm` miles due north of the boat.
    fn mark_north(nm: f64, range: f64) -> Waypoint {
        Waypoint::new(boat() + Bearing::new(0.0, nm), 0.0, range, "mark", true)
    }

    async fn seed(store: &StateStore, compass: u8, awa: i8, state: MissionState) {
        store
            .save(&GpsFix {
                time: 1_700_000_000.0,
                location: boat(),
                sog: 3.0,
                cmg: 0.0,
                magvar: 0.0,
                valid: true,
            })
            .await;
        store
            .save(&OttoState {
                actual_compass: compass,
                actual_awa: awa,
                ..Default::default()
            })
            .await;
        store
            .save(&MissionStatus {
                state,
                current_waypoint: 0,
                start_time: 1.0,
                end_time: 0.0,
            })
            .await;
    }

    fn navigator(
        mission: &Mission,
        store: &StateStore,
    ) -> (Navigator, mpsc::Receiver<RegisterWrite>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Navigator::new(mission, store.clone(), OttoHandle::new(tx)),
            rx,
        )
    }

    #[tokio::test]
    async fn prefers_the_current_tack() {
        // Wind from true north, target due north 1 NM away. The swing
        // window offers mirror candidates at ±45°; the boat is on
        // starboard (heading 315°, awa +45°), so the opposite-tack
        // mirror is scaled by the tacking penalty and 315° wins.
        let store = StateStore::new();
        seed(&store, 224, 32, MissionState::CompassFollow).await;
        let mission = mission_with(vec![mark_north(1.0, 0.0)], vec![]);
        let (mut nav, mut writes) = navigator(&mission, &store);

        let outcome = nav.run_cycle().await.unwrap();
        let CycleOutcome::Steered { heading, tacked } = outcome else {
            panic!("expected a steered outcome, got {outcome:?}");
        };
        assert!(!tacked);
        assert!(
            (heading - 7.0 * PI / 4.0).abs() < 0.02,
            "heading = {heading}"
        );

        // The commitment goes out as COMPASS_HEADING + TRACK_COMPASS.
        let first = writes.recv().await.unwrap();
        assert_eq!(first.register, Register::CompassHeading);
        assert_eq!(first.value, 224);
        let second = writes.recv().await.unwrap();
        assert_eq!(second.register, Register::Mode);
        assert_eq!(second.value, OttoMode::TrackCompass as u16);
    }

    #[tokio::test]
    async fn repellor_pushes_the_choice_away() {
        // Same rig, plus a hazard 0.1 NM out on bearing 315°. Utility
        // on the starboard candidates collapses and the port mirror
        // (45°) wins despite its tack penalty.
        let store = StateStore::new();
        seed(&store, 224, 32, MissionState::CompassFollow).await;
        let hazard = Waypoint::new(
            boat() + Bearing::new(7.0 * PI / 4.0, 0.1),
            0.0,
            0.0,
            "ledge",
            false,
        );
        let mission = mission_with(vec![mark_north(1.0, 0.0)], vec![hazard]);
        let (mut nav, _writes) = navigator(&mission, &store);

        let outcome = nav.run_cycle().await.unwrap();
        let CycleOutcome::Steered { heading, tacked } = outcome else {
            panic!("expected a steered outcome, got {outcome:?}");
        };
        assert!(tacked);
        assert!((heading - PI / 4.0).abs() < 0.02, "heading = {heading}");
    }

    #[tokio::test]
    async fn invalid_fix_skips_the_cycle() {
        let store = StateStore::new();
        seed(&store, 224, 32, MissionState::CompassFollow).await;
        store
            .update::<GpsFix>(|fix| fix.valid = false)
            .await;
        let mission = mission_with(vec![mark_north(1.0, 0.0)], vec![]);
        let (mut nav, mut writes) = navigator(&mission, &store);

        assert_eq!(nav.run_cycle().await.unwrap(), CycleOutcome::Skipped);
        assert!(writes.try_recv().is_err());
    }

    #[tokio::test]
    async fn reached_waypoints_advance_to_completion() {
        // Single attractor whose range disk already covers the boat
        // from the corridor side: the cycle advances straight off the
        // end of the list.
        let store = StateStore::new();
        seed(&store, 224, 32, MissionState::CompassFollow).await;
        // Boat 0.3 NM south of a mark whose corridor opens south.
        let mark = Waypoint::new(boat() + Bearing::new(0.0, 0.3), PI, 0.5, "gate", true);
        let mission = mission_with(vec![mark], vec![]);
        let (mut nav, _writes) = navigator(&mission, &store);

        assert_eq!(nav.run_cycle().await.unwrap(), CycleOutcome::Complete);

        let status = store.load::<MissionStatus>().await;
        assert_eq!(status.current_waypoint, 1);
        let report = store.load::<crate::alarm::AlarmReport>().await;
        assert!(report.is_set(Alarm::WaypointReached));
    }

    #[tokio::test]
    async fn empty_attractor_list_escalates() {
        let store = StateStore::new();
        seed(&store, 224, 32, MissionState::CompassFollow).await;
        let mission = mission_with(vec![], vec![]);
        let (mut nav, _writes) = navigator(&mission, &store);

        assert!(matches!(nav.run_cycle().await, Err(HelmError::Nav(_))));
    }

    #[tokio::test]
    async fn deterministic_across_runs() {
        let store = StateStore::new();
        seed(&store, 224, 32, MissionState::CompassFollow).await;
        let mission = mission_with(vec![mark_north(1.0, 0.0)], vec![]);

        let (mut nav_a, _wa) = navigator(&mission, &store);
        let (mut nav_b, _wb) = navigator(&mission, &store);
        let a = nav_a.run_cycle().await.unwrap();
        let b = nav_b.run_cycle().await.unwrap();
        assert_eq!(a, b);
    }
}
