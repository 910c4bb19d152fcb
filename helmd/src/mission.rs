//! # mission
//!
//! Mission document loading and the supervising state machine.
//!
//! A mission is loaded once from its TOML document and is immutable for
//! the voyage; the only record it persists is [`MissionStatus`]. The
//! supervisor owns the state transitions and drives the navigator from
//! GPS counter updates while the mission is active; when it is not, it
//! just polls the status once a minute.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use nav_types::{Location, Waypoint};

use crate::alarm::{self, Alarm};
use crate::error::HelmError;
use crate::navigator::{CycleOutcome, Navigator};
use crate::otto::OttoHandle;
use crate::records::{GpsFix, MissionState, MissionStatus};
use crate::store::{epoch_seconds, StateStore};

/// How often the supervisor looks at a dormant mission.
const IDLE_POLL: Duration = Duration::from_secs(60);

/// Pause before re-arming after an invalid GPS fix.
const INVALID_FIX_DELAY: Duration = Duration::from_secs(2);

// ── Mission document ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Launch {
    #[serde(default)]
    pub site: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Waypoint entry as written in the mission file: degrees throughout.
#[derive(Debug, Deserialize)]
struct WaypointDoc {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: String,
    /// Approach corridor axis, degrees.
    #[serde(default)]
    normal: f64,
    /// Reached half-disk radius, nautical miles.
    #[serde(default)]
    range: f64,
}

#[derive(Debug, Deserialize)]
struct MissionDoc {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    launch: Option<Launch>,
    #[serde(default)]
    attractors: Vec<WaypointDoc>,
    #[serde(default)]
    repellors: Vec<WaypointDoc>,
}

/// A loaded mission: ordered goals and standing hazards, all angles in
/// radians.
#[derive(Debug, Clone)]
pub struct Mission {
    pub title: String,
    pub url: String,
    pub description: String,
    pub launch: Option<Launch>,
    pub attractors: Vec<Waypoint>,
    pub repellors: Vec<Waypoint>,
}

impl Mission {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HelmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HelmError::Config(format!("cannot read mission file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, HelmError> {
        let doc: MissionDoc = toml::from_str(text)
            .map_err(|e| HelmError::Parse(format!("mission file: {e}")))?;

        let convert = |docs: Vec<WaypointDoc>, attractor: bool| {
            docs.into_iter()
                .map(|d| {
                    Waypoint::new(
                        Location::from_degrees(d.latitude, d.longitude),
                        d.normal.to_radians(),
                        d.range,
                        &d.name,
                        attractor,
                    )
                })
                .collect()
        };

        Ok(Self {
            title: doc.title,
            url: doc.url,
            description: doc.description,
            launch: doc.launch,
            attractors: convert(doc.attractors, true),
            repellors: convert(doc.repellors, false),
        })
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

pub struct MissionSupervisor {
    store: StateStore,
    mission: Arc<Mission>,
    otto: OttoHandle,
    shutdown: watch::Receiver<bool>,
    auto_start: bool,
}

impl MissionSupervisor {
    pub fn new(
        store: StateStore,
        mission: Arc<Mission>,
        otto: OttoHandle,
        shutdown: watch::Receiver<bool>,
        auto_start: bool,
    ) -> Self {
        Self {
            store,
            mission,
            otto,
            shutdown,
            auto_start,
        }
    }

    pub async fn run(mut self) -> Result<(), HelmError> {
        if self.auto_start {
            self.commission().await;
        }
        loop {
            if *self.shutdown.borrow() {
                return Ok(());
            }
            let status: MissionStatus = self.store.load().await;
            if status.active() {
                self.run_active().await?;
            } else {
                let mut shutdown = self.shutdown.clone();
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
            }
        }
    }

    /// Walk a fresh mission up the start ladder:
    /// AWAITING → READY_TO_START → START_TEST → COMPASS_FOLLOW.
    async fn commission(&self) {
        let status: MissionStatus = self.store.load().await;
        if status.state != MissionState::Awaiting {
            warn!(state = ?status.state, "not commissioning: mission already underway");
            return;
        }
        self.store
            .update::<MissionStatus>(|s| s.state = MissionState::ReadyToStart)
            .await;
        self.store
            .update::<MissionStatus>(|s| {
                s.state = MissionState::StartTest;
                s.start_time = epoch_seconds();
            })
            .await;
        alarm::raise(&self.store, Alarm::MissionCommence).await;
        self.store
            .update::<MissionStatus>(|s| s.state = MissionState::CompassFollow)
            .await;
        info!(title = %self.mission.title, "mission commenced");
    }

    /// Steer until the mission leaves the active window.
    async fn run_active(&mut self) -> Result<(), HelmError> {
        let mut navigator =
            Navigator::new(&self.mission, self.store.clone(), self.otto.clone());
        let mut gps_rx = self.store.subscribe::<GpsFix>().await;

        loop {
            if *self.shutdown.borrow() {
                self.finish(MissionState::Terminated, Alarm::MissionAbort).await;
                return Ok(());
            }
            let status: MissionStatus = self.store.load().await;
            if !status.active() {
                return Ok(());
            }

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        self.finish(MissionState::Terminated, Alarm::MissionAbort).await;
                        return Ok(());
                    }
                }
                update = gps_rx.recv() => match update {
                    Ok(_counter) => {
                        match navigator.run_cycle().await {
                            Ok(CycleOutcome::Complete) => {
                                self.finish(MissionState::Complete, Alarm::MissionComplete)
                                    .await;
                                return Ok(());
                            }
                            Ok(CycleOutcome::Skipped) => {
                                tokio::time::sleep(INVALID_FIX_DELAY).await;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!(error = %e, "navigator failed, mission failed");
                                self.finish(MissionState::Failure, Alarm::MissionAbort).await;
                                return Ok(());
                            }
                        }
                        // Persist the status after every step.
                        let status = self.store.load::<MissionStatus>().await;
                        self.store.save(&status).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "gps updates lagged, resuming from latest");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                }
            }
        }
    }

    async fn finish(&self, state: MissionState, alarm: Alarm) {
        self.store
            .update::<MissionStatus>(|s| {
                s.state = state;
                s.end_time = epoch_seconds();
            })
            .await;
        alarm::raise(&self.store, alarm).await;
        info!(state = ?state, "mission finished");
    }
}
