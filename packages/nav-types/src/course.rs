//! course.rs — heading, wind, apparent wind angle, and hull speed
//!
//! The three angles are coupled: awa ≡ wind − heading (renormalized), and
//! the achievable speed is a pure function of the awa through the polar.
//! All mutation goes through setters so the coupling cannot drift.

use serde::{Deserialize, Serialize};

use crate::geo::{absolute, normalize_pi, Bearing};
use crate::polar::PolarCurve;
use crate::waypoint::Waypoint;

/// Which side of the boat the wind comes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tack {
    Port,
    Starboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Boat heading, [0, 2π).
    heading: f64,
    /// True wind: direction it blows *from*, plus strength as distance.
    wind: Bearing,
    /// Apparent wind angle, (−π, π]; negative = port tack.
    awa: f64,
    /// Hull speed through the water at the current awa, knots.
    speed: f64,
    polar: PolarCurve,
}

impl Course {
    pub fn new(wind: Bearing) -> Self {
        let mut course = Self {
            heading: 0.0,
            wind,
            awa: 0.0,
            speed: 0.0,
            polar: PolarCurve::default(),
        };
        course.set_heading(0.0);
        course
    }

    pub fn with_polar(wind: Bearing, polar: PolarCurve) -> Self {
        let mut course = Self::new(wind);
        course.polar = polar;
        course.compute_speed();
        course
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn wind(&self) -> Bearing {
        self.wind
    }

    pub fn awa(&self) -> f64 {
        self.awa
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn tack(&self) -> Tack {
        if self.awa < 0.0 {
            Tack::Port
        } else {
            Tack::Starboard
        }
    }

    pub fn set_heading(&mut self, heading: f64) {
        self.heading = absolute(heading);
        self.awa = normalize_pi(self.wind.angle - self.heading);
        self.compute_speed();
    }

    pub fn set_wind(&mut self, wind: Bearing) {
        self.wind = wind;
        self.awa = normalize_pi(self.wind.angle - self.heading);
        self.compute_speed();
    }

    pub fn set_awa(&mut self, awa: f64) {
        self.awa = normalize_pi(awa);
        self.compute_speed();
    }

    /// Recover the wind direction from heading + awa. Used when the awa
    /// comes off the masthead sensor and the heading off the compass.
    pub fn compute_wind(&mut self) {
        self.wind.angle = absolute(self.heading + self.awa);
    }

    /// Velocity made good toward the waypoint, normalized by its
    /// adjusted distance so nearer goals dominate the field.
    pub fn relative_vmg(&self, w: &Waypoint) -> f64 {
        self.speed * (w.bearing.angle - self.heading).cos() / w.distance
    }

    fn compute_speed(&mut self) {
        self.speed = self.polar.speed(self.awa);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;
    use std::f64::consts::PI;

    #[test]
    fn heading_setter_renormalizes_everything() {
        // Wind π/4, heading 0 → awa π/4; set_heading(3π) wraps the
        // heading to π and the awa to −3π/4.
        let mut c = Course::new(Bearing::new(PI / 4.0, 10.0));
        assert!((c.awa() - PI / 4.0).abs() < 1e-12);

        c.set_heading(3.0 * PI);
        assert!((c.heading() - PI).abs() < 1e-12);
        assert!((c.awa() - (-3.0 * PI / 4.0)).abs() < 1e-12);
    }

    #[test]
    fn awa_invariant_holds_after_every_setter() {
        let mut c = Course::new(Bearing::new(1.0, 8.0));
        for heading in [0.0, 1.0, 2.5, 4.0, 6.0, 9.0] {
            c.set_heading(heading);
            let expected = normalize_pi(c.wind().angle - c.heading());
            assert!((c.awa() - expected).abs() < 1e-12);
            assert!(c.awa() > -PI && c.awa() <= PI);
        }
        c.set_wind(Bearing::new(5.5, 12.0));
        let expected = normalize_pi(c.wind().angle - c.heading());
        assert!((c.awa() - expected).abs() < 1e-12);
    }

    #[test]
    fn tack_sign_convention() {
        let mut c = Course::new(Bearing::new(0.0, 10.0));
        c.set_awa(-1.0);
        assert_eq!(c.tack(), Tack::Port);
        c.set_awa(1.0);
        assert_eq!(c.tack(), Tack::Starboard);
        c.set_awa(0.0);
        assert_eq!(c.tack(), Tack::Starboard);
    }

    #[test]
    fn speed_follows_polar() {
        let mut c = Course::new(Bearing::new(0.0, 10.0));
        c.set_awa(0.3);
        assert_eq!(c.speed(), 0.0);
        c.set_awa(1.9);
        assert!(c.speed() > 5.0);
    }

    #[test]
    fn compute_wind_recovers_direction() {
        let mut c = Course::new(Bearing::new(0.0, 10.0));
        c.set_heading(1.0);
        c.set_awa(0.8);
        c.compute_wind();
        assert!((c.wind().angle - 1.8).abs() < 1e-12);
    }

    #[test]
    fn relative_vmg_projects_speed_onto_bearing() {
        let mut c = Course::new(Bearing::new(0.0, 10.0));
        c.set_heading(PI);
        assert!(c.speed() > 0.0);

        let mut w = Waypoint::new(Location::from_degrees(50.0, -9.0), 0.0, 0.0, "m", true);
        w.bearing = Bearing::new(PI, 2.0);
        w.distance = 2.0;
        // Dead ahead: vmg = speed / distance.
        assert!((c.relative_vmg(&w) - c.speed() / 2.0).abs() < 1e-12);

        // Abeam: projection is zero.
        w.bearing = Bearing::new(PI / 2.0, 2.0);
        assert!(c.relative_vmg(&w).abs() < 1e-9);
    }
}
