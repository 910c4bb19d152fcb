//! # gps
//!
//! NMEA ingest from the GPS serial port.
//!
//! Lines begin with `$` and end with `*` plus a two-hex-digit XOR
//! checksum over everything in between. The only sentence the core
//! interprets is GPRMC; everything else is logged at debug and
//! discarded. Valid fixes are saved and published as [`GpsFix`]; a
//! receiver reporting `V` (void) still publishes, flagged invalid, so
//! the navigator wakes and declines to steer.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::alarm::{self, Alarm};
use crate::error::HelmError;
use crate::records::GpsFix;
use crate::store::StateStore;

use nav_types::geo::absolute;
use nav_types::Location;

// ── Sentence validation ───────────────────────────────────────────────────────

/// XOR checksum over the characters between `$` and `*`, compared to
/// the two hex digits after the `*`.
pub fn validate_checksum(sentence: &str) -> bool {
    let Some(body) = sentence.strip_prefix('$') else {
        return false;
    };
    let mut parts = body.split('*');
    let data = parts.next().unwrap_or("");
    let Some(checksum) = parts.next() else {
        return false;
    };
    let Ok(expected) = u8::from_str_radix(checksum.trim(), 16) else {
        return false;
    };
    let computed = data.bytes().fold(0u8, |acc, b| acc ^ b);
    computed == expected
}

// ── GPRMC ─────────────────────────────────────────────────────────────────────

/// Convert NMEA ddmm.mmmm / dddmm.mmmm plus hemisphere into signed
/// decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str) -> Result<f64, HelmError> {
    let raw: f64 = value
        .parse()
        .map_err(|_| HelmError::Parse(format!("bad NMEA coordinate {value:?}")))?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let unsigned = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Ok(unsigned),
        "S" | "W" => Ok(-unsigned),
        other => Err(HelmError::Parse(format!(
            "bad NMEA hemisphere {other:?}"
        ))),
    }
}

/// Combine RMC time (hhmmss.sss) and date (ddmmyy) into epoch seconds.
/// Receivers emit time-only sentences while acquiring; those borrow
/// today's UTC date.
fn fix_time(time_field: &str, date_field: &str) -> Result<f64, HelmError> {
    if time_field.len() < 6 || !time_field.is_ascii() || !date_field.is_ascii() {
        return Err(HelmError::Parse(format!("bad RMC time {time_field:?}")));
    }
    let bad = || HelmError::Parse(format!("bad RMC clock {time_field:?}/{date_field:?}"));
    let hour: u32 = time_field[0..2].parse().map_err(|_| bad())?;
    let minute: u32 = time_field[2..4].parse().map_err(|_| bad())?;
    let seconds: f64 = time_field[4..].parse().map_err(|_| bad())?;

    let date = if date_field.len() == 6 {
        let day: u32 = date_field[0..2].parse().map_err(|_| bad())?;
        let month: u32 = date_field[2..4].parse().map_err(|_| bad())?;
        let year: i32 = date_field[4..6].parse().map_err(|_| bad())?;
        NaiveDate::from_ymd_opt(2000 + year, month, day).ok_or_else(bad)?
    } else {
        Utc::now().date_naive()
    };

    let midnight = date.and_hms_opt(hour, minute, 0).ok_or_else(bad)?;
    Ok(midnight.and_utc().timestamp() as f64 + seconds)
}

/// Parse the comma-split fields of a GPRMC sentence (checksum already
/// stripped; `fields[0]` is the sentence type).
///
/// Field layout: time, status (A|V), lat, N|S, lon, E|W, sog (kn),
/// cmg (° true), date (ddmmyy), magvar, E|W, mode.
pub fn parse_rmc(fields: &[&str]) -> Result<GpsFix, HelmError> {
    if fields.len() < 12 {
        return Err(HelmError::Parse(format!(
            "GPRMC carries {} fields, expected 12-13",
            fields.len()
        )));
    }

    let valid = fields[2] == "A";
    if !valid {
        // Void fix: position fields are unreliable or empty.
        return Ok(GpsFix {
            time: crate::store::epoch_seconds(),
            valid: false,
            ..Default::default()
        });
    }

    let lat = parse_coordinate(fields[3], fields[4])?;
    let lon = parse_coordinate(fields[5], fields[6])?;
    let sog: f64 = fields[7].parse().unwrap_or(0.0);
    let cmg_deg: f64 = fields[8].parse().unwrap_or(0.0);
    let magvar_deg: f64 = fields[10].parse().unwrap_or(0.0);
    let magvar = match fields[11] {
        "W" => -magvar_deg.to_radians(),
        _ => magvar_deg.to_radians(),
    };

    Ok(GpsFix {
        time: fix_time(fields[1], fields[9])?,
        location: Location::from_degrees(lat, lon),
        sog,
        cmg: absolute(cmg_deg.to_radians()),
        magvar,
        valid: true,
    })
}

// ── Ingest task ───────────────────────────────────────────────────────────────

pub async fn run_ingest<R>(
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
                    Ok(Ok(None)) => return Err(HelmError::Device("gps port closed".into())),
                    Ok(Ok(Some(line))) => handle_sentence(line.trim(), &store).await,
                    Ok(Err(e)) => {
                        warn!(error = %e, "gps read error");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        }
    }
}

async fn handle_sentence(sentence: &str, store: &StateStore) {
    if sentence.is_empty() {
        return;
    }
    if !validate_checksum(sentence) {
        warn!(sentence, "NMEA checksum mismatch");
        return;
    }
    let body = sentence[1..].split('*').next().unwrap_or("");
    let fields: Vec<&str> = body.split(',').collect();
    if fields[0] != "GPRMC" {
        debug!(sentence = fields[0], "ignoring NMEA sentence");
        return;
    }

    match parse_rmc(&fields) {
        Ok(fix) => {
            if !fix.valid {
                alarm::raise(store, Alarm::GpsInvalid).await;
            }
            store.save(&fix).await;
        }
        Err(e) => warn!(error = %e, "discarding malformed GPRMC"),
    }
}
