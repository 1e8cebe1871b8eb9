use ndarray::{Array1, Zip};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError, cis};

use crate::{Operator, States};

/// Free precession at a per-lane off-resonance frequency.
///
/// Transverse magnetization at frequency `f` (Hz) rotates by `e^{-i2πfΔt}`,
/// so `F+` picks up that phase and `F-` its conjugate.
#[derive(Debug, Clone, PartialEq)]
pub struct Precession<T: Real> {
    phasors: Array1<Complex<T>>,
}

impl<T: Real> Precession<T> {
    /// Builds the rotation over `dt` seconds.
    pub fn new(frequency: &Array1<T>, dt: T) -> Self {
        let two_pi = T::from_f64(std::f64::consts::TAU);
        Self {
            phasors: frequency.mapv(|f| cis(-(two_pi * f * dt))),
        }
    }
}

impl<T: Real> Operator<T> for Precession<T> {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        states
            .layout()
            .check_lanes("precession frequency", self.phasors.len())?;
        let (fp, fm, _) = states.arrays_mut();
        Zip::indexed(fp).and(fm).for_each(|(lane, _, _, _), fp, fm| {
            let phasor = self.phasors[lane];
            *fp = *fp * phasor;
            *fm = *fm * phasor.conj();
        });
        Ok(())
    }
}
