//! waypoint.rs — attractors and repellors with approach corridors
//!
//! A waypoint covers a half-disk: a disk of `range` NM around `location`,
//! clipped to the half-plane on the far side of the chord perpendicular
//! to `normal`. A boat closing from the corridor side gets the disk
//! radius credited against its distance; a boat on the wrong side must
//! sail the full great-circle range.

use serde::{Deserialize, Serialize};

use crate::geo::{absolute, Bearing, Location};

/// Adjusted distance at or below which a waypoint counts as achieved.
/// GPS scatter floor, ≈ 10 m.
pub const REACHED_NM: f64 = 0.0054;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub location: Location,
    /// Direction of the valid-approach corridor axis, radians.
    pub normal: f64,
    /// Radius of the reached half-disk, nautical miles.
    pub range: f64,
    pub name: String,
    /// Attractors pull the planner in; repellors push it away.
    pub attractor: bool,
    /// Bearing from the last `compute_bearing` origin to this waypoint.
    pub bearing: Bearing,
    /// Chord-adjusted distance from the last origin, nautical miles.
    pub distance: f64,
}

impl Waypoint {
    pub fn new(location: Location, normal: f64, range: f64, name: &str, attractor: bool) -> Self {
        Self {
            location,
            normal: absolute(normal),
            range: range.max(0.0),
            name: name.to_string(),
            attractor,
            bearing: Bearing::default(),
            distance: f64::INFINITY,
        }
    }

    /// Refresh `bearing` and the chord-adjusted `distance` as seen from
    /// `from`.
    ///
    /// The disk radius is credited only when the back-bearing from the
    /// waypoint to the boat falls in the corridor half-plane, i.e. when
    /// (back_angle − normal) mod 2π lands in the half-open [0, π).
    pub fn compute_bearing(&mut self, from: &Location) -> Bearing {
        let b = Bearing::compute(from, &self.location);
        let alpha = absolute(b.back_angle() - self.normal);
        self.distance = if alpha < std::f64::consts::PI {
            (b.distance - self.range).max(0.0)
        } else {
            b.distance
        };
        self.bearing = b;
        b
    }

    /// Whether the boat at the last `compute_bearing` origin is inside
    /// the achieved band.
    pub fn reached(&self) -> bool {
        self.distance <= REACHED_NM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint_with_range(range: f64, normal: f64) -> Waypoint {
        Waypoint::new(
            Location::from_degrees(51.0, -9.0),
            normal,
            range,
            "mark",
            true,
        )
    }

    /// Offset the waypoint's own position by a small due-north/south step.
    fn offset_south(w: &Waypoint, nm: f64) -> Location {
        w.location + Bearing::new(std::f64::consts::PI, nm)
    }

    fn offset_north(w: &Waypoint, nm: f64) -> Location {
        w.location + Bearing::new(0.0, nm)
    }

    #[test]
    fn approach_from_wrong_side_pays_full_distance() {
        // Boat due south of a north-normal waypoint: back_angle = π,
        // α = π is outside [0, π), so no range credit.
        let mut w = waypoint_with_range(0.1, 0.0);
        let boat = offset_south(&w, 0.05);
        w.compute_bearing(&boat);
        assert!((w.distance - 0.05).abs() < 1e-6, "distance = {}", w.distance);
        assert!(!w.reached());
    }

    #[test]
    fn approach_from_corridor_side_is_credited() {
        // Boat due north: back_angle = 0, α = 0 ∈ [0, π); 0.05 − 0.1
        // clamps to zero — reached.
        let mut w = waypoint_with_range(0.1, 0.0);
        let boat = offset_north(&w, 0.05);
        w.compute_bearing(&boat);
        assert_eq!(w.distance, 0.0);
        assert!(w.reached());
    }

    #[test]
    fn adjusted_distance_never_negative() {
        let mut w = waypoint_with_range(5.0, 0.0);
        let boat = offset_north(&w, 0.2);
        w.compute_bearing(&boat);
        assert!(w.distance >= 0.0);
    }

    #[test]
    fn reached_band_has_gps_floor() {
        // Inside ~10 m of the mark the answer is "reached" even with no
        // range credit in play.
        let mut w = waypoint_with_range(0.0, 0.0);
        let boat = offset_south(&w, 0.004);
        w.compute_bearing(&boat);
        assert!(w.reached());
    }

    #[test]
    fn bearing_points_at_the_waypoint() {
        let mut w = waypoint_with_range(0.1, 0.0);
        let boat = offset_south(&w, 1.0);
        let b = w.compute_bearing(&boat);
        // From due south the waypoint bears roughly north.
        assert!(b.angle < 0.01 || b.angle > std::f64::consts::TAU - 0.01);
    }
}
