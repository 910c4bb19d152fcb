//! # nav-types
//!
//! Shared navigation math for the helm guidance suite.
//!
//! These types are used by:
//! - `helmd`: the guidance daemon (navigator, GPS ingest, Otto link)
//! - `otto-simulator`: the synthetic low-level controller rig
//!
//! ## Conventions
//!
//! - **Angles**: radians. Compass-style angles (headings, bearings, wind
//!   direction) are absolute in [0, 2π), 0 = true north, increasing
//!   clockwise. The apparent wind angle is signed in (−π, π]: negative
//!   means the wind is over the port side.
//! - **Distances**: nautical miles on a spherical Earth.
//! - **Speeds**: knots.

pub mod course;
pub mod geo;
pub mod polar;
pub mod waypoint;

pub use course::{Course, Tack};
pub use geo::{Bearing, Location, ParseError, EARTH_RADIUS_NM};
pub use polar::PolarCurve;
pub use waypoint::Waypoint;
