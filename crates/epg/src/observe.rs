use ndarray::{Array1, Array2};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError, cis};

use crate::States;

/// Readout of the zero-order transverse state.
///
/// The signal of lane `l` is `M0[l] · mean_s Σ_p w[l, p] · F+[l, 0, s, p]`,
/// demodulated by `e^{-iφ}` when a receiver phase `φ` is supplied. Reading
/// never changes the states.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T: Real> {
    weights: Array2<T>,
    scale: Array1<T>,
}

impl<T: Real> Observation<T> {
    /// Creates a readout from transverse pool weights `(lanes, pools)` and
    /// per-lane proton density.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] if the lane counts differ.
    pub fn new(weights: Array2<T>, scale: Array1<T>) -> Result<Self, ShapeError> {
        if weights.nrows() != scale.len() {
            return Err(ShapeError::Mismatch {
                what: "observation weights",
                expected: vec![scale.len()],
                found: vec![weights.nrows()],
            });
        }
        Ok(Self { weights, scale })
    }

    /// Returns the signal of every lane.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] if the readout does not match the
    /// layout of `states`.
    pub fn observe(
        &self,
        states: &States<T>,
        receiver_phase: Option<T>,
    ) -> Result<Array1<Complex<T>>, ShapeError> {
        let layout = states.layout();
        let expected = (layout.lanes(), layout.transverse_pools());
        if self.weights.dim() != expected {
            return Err(ShapeError::Mismatch {
                what: "observation weights",
                expected: vec![expected.0, expected.1],
                found: self.weights.shape().to_vec(),
            });
        }

        let fplus = states.fplus();
        let demodulation = receiver_phase.map(|phi| cis(-phi));
        let mean = T::from_f64(1.0 / layout.nlocs() as f64);

        Ok(Array1::from_shape_fn(layout.lanes(), |lane| {
            let mut sum = Complex::new(T::zero(), T::zero());
            for loc in 0..layout.nlocs() {
                for pool in 0..layout.transverse_pools() {
                    sum += fplus[[lane, 0, loc, pool]] * self.weights[[lane, pool]];
                }
            }
            let signal = sum * (mean * self.scale[lane]);
            match demodulation {
                Some(phasor) => signal * phasor,
                None => signal,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    use crate::{Operator, RfPulse, Spoil, StateLayout, Transmit};

    fn excited(lanes: usize, pools: usize) -> States<f64> {
        let layout = StateLayout::new(lanes, 2, 1, pools, pools).expect("valid layout");
        let mut states = States::equilibrium(layout);
        let transmit = Transmit::new(Array1::ones(lanes), Array1::ones(1));
        RfPulse::new(&transmit, FRAC_PI_2, None)
            .apply(&mut states)
            .expect("should rotate");
        states
    }

    #[test]
    fn observation_is_read_only() {
        let states = excited(2, 1);
        let before = states.clone();
        let readout = Observation::new(Array2::ones((2, 1)), Array1::ones(2)).expect("valid");
        readout.observe(&states, Some(0.3)).expect("should observe");
        assert_eq!(states, before);
    }

    #[test]
    fn weights_and_proton_density_scale_the_signal() {
        let states = excited(1, 2);
        let weights = Array2::from_shape_vec((1, 2), vec![0.75, 0.25]).expect("valid");
        let readout = Observation::new(weights, Array1::from(vec![2.0])).expect("valid");
        let signal = readout.observe(&states, None).expect("should observe");
        assert_relative_eq!(signal[0].im, -2.0);
    }

    #[test]
    fn receiver_phase_demodulates() {
        let states = excited(1, 1);
        let readout = Observation::new(Array2::ones((1, 1)), Array1::ones(1)).expect("valid");
        // -i·e^{iπ/2} = 1
        let signal = readout
            .observe(&states, Some(-FRAC_PI_2))
            .expect("should observe");
        assert_relative_eq!(signal[0].re, 1.0);
        assert_relative_eq!(signal[0].im, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn spoiled_states_give_no_signal() {
        let mut states = excited(3, 1);
        Spoil.apply(&mut states).expect("should spoil");
        let readout = Observation::new(Array2::ones((3, 1)), Array1::ones(3)).expect("valid");
        let signal = readout.observe(&states, None).expect("should observe");
        assert!(signal.iter().all(|s| s.norm() == 0.0));
    }
}
