use ndarray::{Array1, Zip};
use phasegraph_core::{Real, ShapeError};

use crate::{Operator, States};

/// Diffusion damping during one unbalanced gradient interval.
///
/// `dk` is the dephasing per interval (rad/m), `tau` the interval (s) and
/// `coefficient` the per-lane diffusion coefficient (m²/s). Orders are
/// damped by `exp(-D·b)` with
///
/// - `F+[n]`: `b = dk²·τ·(n² + n + 1/3)`
/// - `F-[n]`: `b = dk²·τ·(n² - n + 1/3)`
/// - `Z[n]`: `b = (n·dk)²·τ`
///
/// Apply before the shift of the same interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Diffusion<T: Real> {
    dk: T,
    tau: T,
    coefficient: Array1<T>,
}

impl<T: Real> Diffusion<T> {
    #[must_use]
    pub fn new(dk: T, tau: T, coefficient: Array1<T>) -> Self {
        Self {
            dk,
            tau,
            coefficient,
        }
    }

    fn damping(&self, lane: usize, b: T) -> T {
        (-(self.coefficient[lane] * b * self.dk * self.dk * self.tau)).exp()
    }
}

impl<T: Real> Operator<T> for Diffusion<T> {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        states
            .layout()
            .check_lanes("diffusion coefficient", self.coefficient.len())?;
        let third = T::from_f64(1.0 / 3.0);
        let (fp, fm, z) = states.arrays_mut();

        Zip::indexed(fp).and(fm).for_each(|(lane, order, _, _), fp, fm| {
            let n = T::from_f64(order as f64);
            *fp = *fp * self.damping(lane, n * n + n + third);
            *fm = *fm * self.damping(lane, n * n - n + third);
        });
        Zip::indexed(z).for_each(|(lane, order, _, _), z| {
            let n = T::from_f64(order as f64);
            *z = *z * self.damping(lane, n * n);
        });
        Ok(())
    }
}
