//! link.rs — serial link to the low-level controller
//!
//! The link runs as two independent tasks over the split halves of one
//! full-duplex port: the reader turns inbound frames into OttoState
//! updates (save + publish per frame), the writer drains a bounded
//! register-write queue onto the wire. Before either runs, the boot
//! handshake must succeed.
//!
//! Serial faults never panic here: timeouts resume the loop, malformed
//! frames are logged and dropped, and a closed transport surfaces as an
//! error for the supervisor to deal with.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::alarm::{self, Alarm};
use crate::error::HelmError;
use crate::records::{OttoState, TELEMETRY_CHANNELS};
use crate::store::StateStore;

use super::frame::{self, Frame, HANDSHAKE};
use super::registers::{
    awa_to_register, compass_to_register, rudder_to_register, sail_to_register, OttoMode,
    Register,
};

/// Retry delays for the boot handshake, seconds. The last entry repeats.
const SYNC_BACKOFF_SECS: [u64; 13] = [1, 1, 1, 1, 2, 2, 3, 5, 10, 10, 20, 30, 60];

/// Register-write queue depth; senders only ever block when this many
/// writes are already in flight.
pub const WRITE_QUEUE_DEPTH: usize = 32;

/// One register write travelling from a navigator (or supervisor) to
/// the writer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub register: Register,
    pub value: u16,
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// Send `@@CQ!` until the controller acknowledges.
///
/// Non-ack lines are discarded; a silent controller earns another
/// attempt after the backoff delay. Only a closed transport makes this
/// return an error — a rebooting controller is waited out indefinitely.
pub async fn synchronize<R, W>(
    reader: &mut R,
    writer: &mut W,
    read_timeout: Duration,
) -> Result<(), HelmError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut attempt = 0usize;
    loop {
        writer
            .write_all(format!("{HANDSHAKE}\r\n").as_bytes())
            .await?;
        writer.flush().await?;

        let deadline = tokio::time::Instant::now() + read_timeout;
        loop {
            match tokio::time::timeout_at(deadline, lines.next_line()).await {
                Err(_) => break, // silent — back off and resend
                Ok(Ok(None)) => {
                    return Err(HelmError::Sync("transport closed during handshake".into()))
                }
                Ok(Ok(Some(line))) => {
                    let line = line.trim();
                    if frame::is_sync_ack(line) {
                        info!(attempt = attempt + 1, "otto link synchronized");
                        return Ok(());
                    }
                    debug!(line, "discarding pre-sync line");
                }
                Ok(Err(e)) => return Err(HelmError::Device(e.to_string())),
            }
        }

        let delay = SYNC_BACKOFF_SECS[attempt.min(SYNC_BACKOFF_SECS.len() - 1)];
        warn!(attempt = attempt + 1, delay_secs = delay, "otto sync not acknowledged");
        tokio::time::sleep(Duration::from_secs(delay)).await;
        attempt += 1;
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Consume frames until shutdown. Read timeouts are routine (the
/// controller sleeps between reports); EOF means the port died.
pub async fn run_reader<R>(
    reader: R,
    store: StateStore,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), HelmError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            read = tokio::time::timeout(read_timeout, lines.next_line()) => {
                match read {
                    Err(_) => continue,
                    Ok(Ok(None)) => return Err(HelmError::Device("otto port closed".into())),
                    Ok(Ok(Some(line))) => handle_line(line.trim(), &store).await,
                    Ok(Err(e)) => {
                        warn!(error = %e, "otto read error");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        }
    }
}

async fn handle_line(line: &str, store: &StateStore) {
    if line.is_empty() {
        return;
    }
    match frame::parse(line) {
        Err(e) => warn!(error = %e, line, "discarding malformed otto frame"),
        Ok(Frame::Status {
            alarms,
            awa,
            compass,
            rudder,
            sail,
        }) => {
            store
                .update::<OttoState>(|s| {
                    s.alarm_status = alarms;
                    s.actual_awa = awa as i8;
                    s.actual_compass = compass;
                    s.actual_rudder = rudder;
                    s.actual_sail = sail;
                })
                .await;
        }
        Ok(Frame::Uptime(seconds)) => {
            let previous = store.load::<OttoState>().await.otto_timestamp;
            if seconds < previous {
                warn!(previous, seconds, "controller boot clock went backwards");
                alarm::raise(store, Alarm::OttoRestart).await;
            }
            store.update::<OttoState>(|s| s.otto_timestamp = seconds).await;
        }
        Ok(Frame::Mode(mode)) => {
            store.update::<OttoState>(|s| s.mode = mode).await;
        }
        Ok(Frame::Telemetry { channel, value }) => {
            let slot = channel as usize;
            if slot < TELEMETRY_CHANNELS {
                store
                    .update::<OttoState>(|s| s.telemetry[slot] = value)
                    .await;
            }
        }
        Ok(Frame::Debug(text)) => info!(target: "otto", "{text}"),
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Drain the register-write queue onto the wire. A write that matches
/// the last value sent to that register is suppressed, which also makes
/// the mode-forcing writes idempotent.
pub async fn run_writer<W>(
    mut writer: W,
    mut requests: mpsc::Receiver<RegisterWrite>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), HelmError>
where
    W: AsyncWrite + Unpin,
{
    let mut last_sent: HashMap<Register, u16> = HashMap::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            request = requests.recv() => {
                let Some(request) = request else {
                    return Ok(()); // every sender gone
                };
                if last_sent.get(&request.register) == Some(&request.value) {
                    debug!(register = ?request.register, value = request.value,
                        "suppressing redundant register write");
                    continue;
                }
                let wire = frame::register_write(request.register, request.value);
                writer.write_all(wire.as_bytes()).await?;
                writer.flush().await?;
                last_sent.insert(request.register, request.value);
            }
        }
    }
}

// ── Command handle ────────────────────────────────────────────────────────────

/// Typed, fire-and-forget face of the writer queue.
///
/// The mode rules live here: commanding rudder or sail also forces
/// MANUAL, commanding a tracked heading forces the matching track mode.
/// The writer's suppression keeps repeated mode writes off the wire.
#[derive(Clone)]
pub struct OttoHandle {
    tx: mpsc::Sender<RegisterWrite>,
}

impl OttoHandle {
    pub fn new(tx: mpsc::Sender<RegisterWrite>) -> Self {
        Self { tx }
    }

    async fn write(&self, register: Register, value: u16) {
        let request = RegisterWrite { register, value };
        if self.tx.send(request).await.is_err() {
            warn!(register = ?register, "otto writer gone, dropping register write");
        }
    }

    /// Rudder angle in degrees, [−40, +40]. Forces MANUAL.
    pub async fn set_rudder(&self, degrees: f64) {
        self.write(Register::RudderAngle, rudder_to_register(degrees) as u16)
            .await;
        self.write(Register::Mode, OttoMode::Manual as u16).await;
    }

    /// Sail trim in percent, [0, 100]. Forces MANUAL.
    pub async fn set_sail(&self, percent: f64) {
        self.write(Register::SailAngle, sail_to_register(percent) as u16)
            .await;
        self.write(Register::Mode, OttoMode::Manual as u16).await;
    }

    /// Hold a compass heading, radians. Forces TRACK_COMPASS.
    pub async fn track_compass(&self, radians: f64) {
        self.write(
            Register::CompassHeading,
            compass_to_register(radians) as u16,
        )
        .await;
        self.write(Register::Mode, OttoMode::TrackCompass as u16)
            .await;
    }

    /// Hold an apparent wind angle, radians. Forces TRACK_AWA.
    pub async fn track_awa(&self, radians: f64) {
        self.write(Register::AwaHeading, awa_to_register(radians) as u16)
            .await;
        self.write(Register::Mode, OttoMode::TrackAwa as u16).await;
    }

    /// Ask the controller to drop its latched alarms.
    pub async fn clear_alarms(&self, bits: u16) {
        self.write(Register::AlarmClear, bits).await;
    }
}
