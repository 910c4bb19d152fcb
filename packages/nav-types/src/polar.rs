//! polar.rs — hull-speed model
//!
//! Boat speed through the water as a polynomial of the apparent wind
//! angle. The reference curve is a degree-6 fit over the calibration
//! hull's speed table, evaluated on |awa| and divided by a calibration
//! factor. Below the close-hauled stall threshold the hull cannot make
//! way at all and the model returns exactly zero.

use serde::{Deserialize, Serialize};

/// Reference curve coefficients, ascending powers of |awa| (radians).
const REFERENCE_CURVE: [f64; 7] = [
    -16.8791, 5.98732, 62.8442, -70.8921, 33.5626, -7.68368, 0.695846,
];

/// Divisor mapping the raw polynomial to knots for the calibration hull.
const CALIBRATION_FACTOR: f64 = 2.5;

/// Minimum |awa| (radians) at which the hull makes way (≈ 43°).
pub const STALL_AWA: f64 = 0.75;

/// Polynomial speed curve for one hull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarCurve {
    /// Coefficients in ascending powers of |awa|.
    coefficients: [f64; 7],
}

impl Default for PolarCurve {
    fn default() -> Self {
        Self {
            coefficients: REFERENCE_CURVE,
        }
    }
}

impl PolarCurve {
    pub fn new(coefficients: [f64; 7]) -> Self {
        Self { coefficients }
    }

    /// Achievable speed in knots at the given apparent wind angle.
    ///
    /// Zero below the stall threshold, clamped non-negative everywhere.
    pub fn speed(&self, awa: f64) -> f64 {
        let x = awa.abs();
        if x < STALL_AWA {
            return 0.0;
        }
        // Horner evaluation, highest power first.
        let raw = self
            .coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c);
        (raw / CALIBRATION_FACTOR).max(0.0)
    }
}
