use ndarray::{Array1, Zip};
use phasegraph_core::{Real, ShapeError, cis};

use crate::{Operator, States};

/// Phase accrued by constant flow along an unbalanced gradient.
///
/// A state at signed order `k` moving at velocity `v` (m/s) through one
/// interval `τ` with dephasing `dk` (rad/m) picks up `e^{-i(k + 1/2)·dk·v·τ}`
/// on the transverse lines and `e^{-ik·dk·v·τ}` on `Z`. Apply before the
/// shift of the same interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow<T: Real> {
    dk: T,
    tau: T,
    velocity: Array1<T>,
}

impl<T: Real> Flow<T> {
    #[must_use]
    pub fn new(dk: T, tau: T, velocity: Array1<T>) -> Self {
        Self { dk, tau, velocity }
    }
}

impl<T: Real> Operator<T> for Flow<T> {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        states
            .layout()
            .check_lanes("flow velocity", self.velocity.len())?;
        let half = T::from_f64(0.5);
        let (fp, fm, z) = states.arrays_mut();

        Zip::indexed(fp).and(fm).for_each(|(lane, order, _, _), fp, fm| {
            let n = T::from_f64(order as f64);
            let x = self.dk * self.velocity[lane] * self.tau;
            *fp = *fp * cis(-((n + half) * x));
            // F-[n] stores the conjugate of order -n.
            *fm = *fm * cis(-((n - half) * x));
        });
        Zip::indexed(z).for_each(|(lane, order, _, _), z| {
            let n = T::from_f64(order as f64);
            *z = *z * cis(-(n * self.dk * self.velocity[lane] * self.tau));
        });
        Ok(())
    }
}
