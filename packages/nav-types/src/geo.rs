//! geo.rs — spherical-Earth locations and great-circle bearings
//!
//! All position math runs on the unit sphere scaled by [`EARTH_RADIUS_NM`].
//! Locations carry radians internally; the free-form parser and the
//! `Display` impl speak degrees, which is what mission files, GPS
//! receivers, and humans use.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.069528437724;

const TAU: f64 = std::f64::consts::TAU;
const PI: f64 = std::f64::consts::PI;

// ── Angle helpers ─────────────────────────────────────────────────────────────

/// Normalize an angle to the compass range [0, 2π).
pub fn absolute(theta: f64) -> f64 {
    theta.rem_euclid(TAU)
}

/// Normalize an angle to the signed range (−π, π].
pub fn normalize_pi(theta: f64) -> f64 {
    let a = absolute(theta);
    if a > PI {
        a - TAU
    } else {
        a
    }
}

pub fn degrees_to_radians(deg: f64) -> f64 {
    deg.to_radians()
}

pub fn radians_to_degrees(rad: f64) -> f64 {
    rad.to_degrees()
}

// ── Parse errors ──────────────────────────────────────────────────────────────

/// Failure to understand a free-form latitude/longitude string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected two comma-separated coordinate components in {0:?}")]
    MissingComponent(String),
    #[error("no numeric fields in coordinate component {0:?}")]
    Empty(String),
    #[error("more than three numeric fields in coordinate component {0:?}")]
    TooManyFields(String),
    #[error("unrecognized hemisphere suffix {0:?}")]
    BadSuffix(String),
    #[error("malformed numeric field {0:?}")]
    BadNumber(String),
}

// ── Location ──────────────────────────────────────────────────────────────────

/// A point on the Earth's surface.
///
/// Latitude is held in [−π/2, π/2] and longitude in (−π, π]; the
/// constructors clamp and wrap so the invariant cannot be violated from
/// outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in radians, positive north.
    pub latitude: f64,
    /// Longitude in radians, positive east.
    pub longitude: f64,
}

impl Location {
    /// Build from radians, clamping latitude and wrapping longitude.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let latitude = latitude.clamp(-PI / 2.0, PI / 2.0);
        let longitude = normalize_pi(longitude);
        Self {
            latitude,
            longitude,
        }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        Self::new(lat_deg.to_radians(), lon_deg.to_radians())
    }

    /// A location is usable only when both components carry real values.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude.to_degrees()
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude.to_degrees()
    }

    /// Parse a lenient free-form position string.
    ///
    /// Accepts decimal degrees, degrees-minutes, or degrees-minutes-seconds
    /// per component, with an optional NSEW hemisphere suffix:
    ///
    /// ```
    /// # use nav_types::geo::Location;
    /// let l = Location::parse("53 9.395 N, 9 2.119 W").unwrap();
    /// assert!((l.latitude_deg() - 53.1565833).abs() < 1e-6);
    /// assert!((l.longitude_deg() - -9.0353166).abs() < 1e-6);
    /// ```
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let mut parts = s.splitn(2, ',');
        let lat_part = parts.next().unwrap_or("");
        let lon_part = parts
            .next()
            .ok_or_else(|| ParseError::MissingComponent(s.to_string()))?;
        let lat = parse_angle(lat_part)?;
        let lon = parse_angle(lon_part)?;
        Ok(Self::from_degrees(lat, lon))
    }
}

/// Parse one coordinate component into signed decimal degrees.
///
/// Fields are whitespace-separated D [M [S]]; a hemisphere letter negates
/// the value when it names the negative hemisphere (S or W).
fn parse_angle(component: &str) -> Result<f64, ParseError> {
    let mut sign = 1.0;
    let mut fields: Vec<f64> = Vec::with_capacity(3);

    for token in component.split_whitespace() {
        match token.parse::<f64>() {
            Ok(v) => fields.push(v),
            Err(_) => {
                // Not a bare number: either a trailing hemisphere letter or
                // a number with the letter attached ("9.395N").
                let last_len = token.chars().last().map_or(0, char::len_utf8);
                let (head, suffix) = token.split_at(token.len() - last_len);
                let hemisphere = match suffix.to_ascii_uppercase().as_str() {
                    "N" | "E" => 1.0,
                    "S" | "W" => -1.0,
                    _ => return Err(ParseError::BadSuffix(token.to_string())),
                };
                sign = hemisphere;
                if !head.is_empty() {
                    let v = head
                        .parse::<f64>()
                        .map_err(|_| ParseError::BadNumber(token.to_string()))?;
                    fields.push(v);
                }
            }
        }
    }

    match fields.len() {
        0 => Err(ParseError::Empty(component.to_string())),
        1..=3 => {
            let degrees = fields[0]
                + fields.get(1).copied().unwrap_or(0.0) / 60.0
                + fields.get(2).copied().unwrap_or(0.0) / 3600.0;
            Ok(sign * degrees)
        }
        _ => Err(ParseError::TooManyFields(component.to_string())),
    }
}

impl fmt::Display for Location {
    /// Decimal degrees, parseable back by [`Location::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}, {:.6}",
            self.latitude_deg(),
            self.longitude_deg()
        )
    }
}

// ── Bearing ───────────────────────────────────────────────────────────────────

/// A direction and great-circle range from one location toward another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bearing {
    /// Compass angle in [0, 2π), 0 = true north.
    pub angle: f64,
    /// Great-circle distance in nautical miles, never negative.
    pub distance: f64,
}

impl Bearing {
    pub fn new(angle: f64, distance: f64) -> Self {
        Self {
            angle: absolute(angle),
            distance: distance.max(0.0),
        }
    }

    /// Great-circle bearing and range from `from` to `to`.
    pub fn compute(from: &Location, to: &Location) -> Self {
        let d_lon = to.longitude - from.longitude;
        let (sin_a, cos_a) = from.latitude.sin_cos();
        let (sin_b, cos_b) = to.latitude.sin_cos();

        let arc = (sin_a * sin_b + cos_a * cos_b * d_lon.cos()).clamp(-1.0, 1.0);
        let distance = arc.acos() * EARTH_RADIUS_NM;

        let theta = (d_lon.sin() * cos_b).atan2(cos_a * sin_b - sin_a * cos_b * d_lon.cos());
        Self::new(theta, distance)
    }

    /// The reciprocal direction: (angle + π) mod 2π.
    pub fn back_angle(&self) -> f64 {
        absolute(self.angle + PI)
    }
}

impl Add<Bearing> for Location {
    type Output = Location;

    /// Project along the great circle by the bearing's angle and range.
    fn add(self, b: Bearing) -> Location {
        let delta = b.distance / EARTH_RADIUS_NM;
        let (sin_d, cos_d) = delta.sin_cos();
        let (sin_lat, cos_lat) = self.latitude.sin_cos();

        let lat2 = (sin_lat * cos_d + cos_lat * sin_d * b.angle.cos()).asin();
        let lon2 = self.longitude
            + (b.angle.sin() * sin_d * cos_lat).atan2(cos_d - sin_lat * lat2.sin());
        Location::new(lat2, lon2)
    }
}

impl Sub for Location {
    type Output = Bearing;

    /// `a - b` is the bearing standing at `b` looking toward `a`.
    fn sub(self, rhs: Location) -> Bearing {
        Bearing::compute(&rhs, &self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
