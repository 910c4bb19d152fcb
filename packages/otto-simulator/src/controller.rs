//! controller.rs — simulated low-level controller
//!
//! Models the microcontroller at the far end of the helm wire: it stays
//! silent until it has seen the `@@CQ!` handshake, applies `R<reg>=<hex>`
//! writes to its register file, and steers its compass toward the
//! commanded heading with a first-order lag plus sensor noise. The
//! frame formats here are the mirror image of what helmd parses.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use nav_types::geo::{absolute, normalize_pi};

const PI: f64 = std::f64::consts::PI;

pub const REGISTER_COUNT: usize = 23;

// Register numbers this model reacts to.
const REG_ALARM_CLEAR: u8 = 0;
const REG_MODE: u8 = 2;
const REG_RUDDER: u8 = 4;
const REG_SAIL: u8 = 5;
const REG_COMPASS_HEADING: u8 = 6;
const REG_AWA_HEADING: u8 = 9;

pub const MODE_INERT: u8 = 0;
pub const MODE_MANUAL: u8 = 2;
pub const MODE_TRACK_COMPASS: u8 = 3;
pub const MODE_TRACK_AWA: u8 = 4;

/// How quickly the hull answers the helm, 1/s.
const STEER_GAIN: f64 = 0.4;

pub struct Controller {
    registers: [u16; REGISTER_COUNT],
    synced: bool,
    mode: u8,
    mode_dirty: bool,
    alarms: u16,
    /// Heading, radians.
    compass: f64,
    /// Apparent wind angle, radians, signed.
    awa: f64,
    rudder: u8,
    sail: u8,
    /// True wind direction the simulation holds, radians.
    wind_dir: f64,
    /// Compass sensor noise, radians (σ).
    noise: Normal<f64>,
    uptime_secs: f64,
}

impl Controller {
    pub fn new(compass_deg: f64, wind_deg: f64, noise_rad: f64) -> Self {
        Self {
            registers: [0; REGISTER_COUNT],
            synced: false,
            mode: MODE_INERT,
            mode_dirty: false,
            alarms: 0,
            compass: absolute(compass_deg.to_radians()),
            awa: 0.0,
            rudder: 128,
            sail: 0,
            wind_dir: absolute(wind_deg.to_radians()),
            noise: Normal::new(0.0, noise_rad.max(0.0)).expect("noise sigma must be finite"),
            uptime_secs: 0.0,
        }
    }

    pub fn synced(&self) -> bool {
        self.synced
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Take the mode-changed flag; the caller emits a `!` frame when set.
    pub fn take_mode_dirty(&mut self) -> bool {
        std::mem::take(&mut self.mode_dirty)
    }

    /// Handle one inbound line. Everything before the handshake is line
    /// noise; afterwards only register writes mean anything. Returns an
    /// immediate reply when one is due.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line == "@@CQ!" {
            self.synced = true;
            return Some("+CQOK\r\n".to_string());
        }
        if !self.synced {
            return None;
        }

        let Some(rest) = line.strip_prefix('R') else {
            return None;
        };
        let mut parts = rest.splitn(2, '=');
        let reg = parts.next().and_then(|r| r.parse::<u8>().ok());
        let value = parts
            .next()
            .and_then(|v| u16::from_str_radix(v, 16).ok());
        if let (Some(reg), Some(value)) = (reg, value) {
            self.apply(reg, value);
        }
        None
    }

    fn apply(&mut self, reg: u8, value: u16) {
        let slot = reg as usize;
        if slot >= REGISTER_COUNT {
            return;
        }
        self.registers[slot] = value;
        match reg {
            REG_ALARM_CLEAR => self.alarms &= !value,
            REG_MODE => {
                let mode = value as u8;
                if mode != self.mode {
                    self.mode = mode;
                    self.mode_dirty = true;
                }
            }
            REG_RUDDER => self.rudder = value as u8,
            REG_SAIL => self.sail = value as u8,
            _ => {}
        }
    }

    /// Advance the hull by `dt` seconds.
    pub fn tick(&mut self, dt: f64, rng: &mut impl Rng) {
        self.uptime_secs += dt;

        match self.mode {
            MODE_TRACK_COMPASS => {
                let target = self.registers[REG_COMPASS_HEADING as usize] as u8;
                let target_rad = target as f64 * PI / 128.0;
                self.compass += normalize_pi(target_rad - self.compass) * (STEER_GAIN * dt).min(1.0);
            }
            MODE_TRACK_AWA => {
                let target = self.registers[REG_AWA_HEADING as usize] as u8;
                let target_awa = (target as i8) as f64 * PI / 128.0;
                // Hold the wind angle: the heading follows the wind.
                let target_heading = self.wind_dir - target_awa;
                self.compass +=
                    normalize_pi(target_heading - self.compass) * (STEER_GAIN * dt).min(1.0);
            }
            MODE_MANUAL => {
                // Rudder deflection turns the hull, roughly 1°/s per 10°.
                let deflection_deg = (self.rudder as f64 - 128.0) / 3.175;
                self.compass += (deflection_deg * 0.1 * dt).to_radians();
            }
            _ => {}
        }

        self.compass = absolute(self.compass + self.noise.sample(rng) * dt);
        self.awa = normalize_pi(self.wind_dir - self.compass + self.noise.sample(rng) * dt);
    }

    // ── Outbound frames ──────────────────────────────────────────────────────

    fn compass_register(&self) -> u8 {
        ((self.compass * 128.0 / PI).round() as i64).rem_euclid(256) as u8
    }

    fn awa_register(&self) -> u8 {
        (((self.awa * 128.0 / PI).round() as i64) & 0xff) as u8
    }

    /// `$AAAA:WWCC:RRSS`
    pub fn status_frame(&self) -> String {
        format!(
            "${:04X}:{:02X}{:02X}:{:02X}{:02X}\r\n",
            self.alarms,
            self.awa_register(),
            self.compass_register(),
            self.rudder,
            self.sail,
        )
    }

    /// `@HHHHHH`
    pub fn uptime_frame(&self) -> String {
        format!("@{:06X}\r\n", (self.uptime_secs as u64) & 0x00FF_FFFF)
    }

    /// `!MM`
    pub fn mode_frame(&self) -> String {
        format!("!{:02X}\r\n", self.mode)
    }

    /// `>CVVV` — a made-up supply-voltage style sample per channel.
    pub fn telemetry_frame(&self, channel: u8, rng: &mut impl Rng) -> String {
        let sample: u16 = rng.gen_range(0x300..0x400);
        format!(">{:01X}{:03X}\r\n", channel & 0x0F, sample & 0x0FFF)
    }
}
