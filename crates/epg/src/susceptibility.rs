use ndarray::{Array1, Array2, Axis, Zip};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError, cis, non_negative, safe_rate};

/// Returns the reversible decay rate `R2' = 1/T2* - 1/T2` in 1/s.
///
/// A missing `T2*`, or one at or above `T2`, gives zero.
pub fn reversible_rate<T: Real>(t2star_ms: T, t2_ms: T) -> T {
    if safe_rate(t2star_ms).value() == 0.0 {
        return T::zero();
    }
    non_negative(safe_rate(t2star_ms) - safe_rate(t2_ms))
}

/// Signal weighting from intravoxel dephasing and off-resonance at the echo.
///
/// Applied to the recorded signal, not to the states:
/// `s ← s · exp(-TE · (R2' + i2πf))`.
#[derive(Debug, Clone, PartialEq)]
pub struct Susceptibility<T: Real> {
    factors: Array1<Complex<T>>,
}

impl<T: Real> Susceptibility<T> {
    /// Builds the weighting from `R2'` (1/s), frequency (Hz) and echo time (s).
    pub fn new(r2prime: &Array1<T>, frequency: &Array1<T>, te: T) -> Self {
        let two_pi = T::from_f64(std::f64::consts::TAU);
        let factors = Zip::from(r2prime)
            .and(frequency)
            .map_collect(|&r, &f| cis(-(two_pi * f * te)) * (-(r * te)).exp());
        Self { factors }
    }

    /// Weights a `(pulses, lanes)` signal in place.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] if the lane counts differ.
    pub fn apply_to(&self, signal: &mut Array2<Complex<T>>) -> Result<(), ShapeError> {
        if signal.ncols() != self.factors.len() {
            return Err(ShapeError::Mismatch {
                what: "susceptibility lanes",
                expected: vec![self.factors.len()],
                found: vec![signal.ncols()],
            });
        }
        for mut row in signal.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row).and(&self.factors).for_each(|s, &w| *s = *s * w);
        }
        Ok(())
    }
}
