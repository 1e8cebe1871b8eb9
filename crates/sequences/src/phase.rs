use uom::si::angle::degree;
use uom::si::f64::Angle;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

/// RF phase progression across a pulse train.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub enum PhaseSchedule {
    /// Every pulse at phase zero.
    Constant,
    /// `φ_n = n·Δφ`, e.g. 180° for balanced SSFP.
    Linear(Angle),
    /// RF spoiling, `φ_n = φ_{n-1} + n·Δφ`.
    Quadratic(Angle),
}

impl PhaseSchedule {
    /// Returns the phase of each of `count` pulses in degrees, wrapped to `[0, 360)`.
    #[must_use]
    pub fn degrees(&self, count: usize) -> Vec<f64> {
        match *self {
            Self::Constant => vec![0.0; count],
            Self::Linear(increment) => {
                let step = increment.get::<degree>();
                (0..count)
                    .map(|n| (n as f64 * step).rem_euclid(360.0))
                    .collect()
            }
            Self::Quadratic(increment) => {
                let step = increment.get::<degree>();
                let mut phase = 0.0_f64;
                (0..count)
                    .map(|n| {
                        phase = (phase + n as f64 * step).rem_euclid(360.0);
                        phase
                    })
                    .collect()
            }
        }
    }

    /// Returns the phase of each pulse in radians.
    #[must_use]
    pub fn radians(&self, count: usize) -> Vec<f64> {
        self.degrees(count).into_iter().map(f64::to_radians).collect()
    }
}
