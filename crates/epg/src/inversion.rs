use ndarray::{Array1, Axis, Zip};
use phasegraph_core::{Real, ShapeError};

use crate::{Operator, Saturation, States, Transmit};

/// Adiabatic inversion: `Z ← -η·Z` with efficiency `η ∈ [0, 1]` per lane.
///
/// Transverse states are left alone; sequences spoil after preparation.
/// With a pulse energy the bound pool is saturated instead of inverted.
#[derive(Debug, Clone, PartialEq)]
pub struct Inversion<T: Real> {
    efficiency: Array1<T>,
    saturation: Option<Array1<T>>,
}

impl<T: Real> Inversion<T> {
    #[must_use]
    pub fn new(efficiency: Array1<T>) -> Self {
        Self {
            efficiency,
            saturation: None,
        }
    }

    /// Saturates the bound pool, if the states carry one.
    ///
    /// The inversion is not slice selective, so only the transmit scale of
    /// each lane enters the energy.
    #[must_use]
    pub fn with_saturation(mut self, transmit: &Transmit<T>, saturation: Saturation<T>) -> Self {
        self.saturation = Some(transmit.scale().mapv(|scale| saturation.factor(scale)));
        self
    }
}

impl<T: Real> Operator<T> for Inversion<T> {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        let layout = states.layout();
        layout.check_lanes("inversion efficiency", self.efficiency.len())?;
        if let Some(factors) = &self.saturation {
            layout.check_lanes("inversion saturation", factors.len())?;
        }

        let saturated = self.saturation.as_ref().filter(|_| layout.has_bound_pool());
        let inverted = layout.longitudinal_pools() - usize::from(saturated.is_some());

        let (_, _, z) = states.arrays_mut();
        for (pool, mut z) in z.axis_iter_mut(Axis(3)).enumerate() {
            match saturated {
                Some(factors) if pool >= inverted => {
                    Zip::indexed(&mut z).for_each(|(lane, _, _), z| *z = *z * factors[lane]);
                }
                _ => {
                    Zip::indexed(&mut z)
                        .for_each(|(lane, _, _), z| *z = *z * -self.efficiency[lane]);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::{DEFAULT_LINESHAPE, StateLayout};

    #[test]
    fn ideal_and_partial_inversion() {
        let layout = StateLayout::new(3, 2, 1, 1, 1).expect("valid layout");
        let mut states = States::<f64>::equilibrium(layout);
        Inversion::new(Array1::from(vec![1.0, 0.5, 0.0]))
            .apply(&mut states)
            .expect("should invert");

        assert_relative_eq!(states.z()[[0, 0, 0, 0]].re, -1.0);
        assert_relative_eq!(states.z()[[1, 0, 0, 0]].re, -0.5);
        assert_relative_eq!(states.z()[[2, 0, 0, 0]].re, 0.0);
    }

    #[test]
    fn bound_pool_is_saturated_not_inverted() {
        let layout = StateLayout::new(2, 2, 1, 1, 2).expect("valid layout");
        let transmit = Transmit::new(Array1::from(vec![1.0, 0.0]), Array1::ones(1));
        let saturation = Saturation {
            energy: 0.5,
            lineshape: DEFAULT_LINESHAPE,
        };

        let mut states = States::<f64>::equilibrium(layout);
        Inversion::new(Array1::ones(2))
            .with_saturation(&transmit, saturation)
            .apply(&mut states)
            .expect("should invert");

        assert_relative_eq!(states.z()[[0, 0, 0, 0]].re, -1.0);
        assert_relative_eq!(states.z()[[0, 0, 0, 1]].re, saturation.factor(1.0));
        assert!(saturation.factor(1.0) < 1.0);
        // No transmit field, no saturation.
        assert_relative_eq!(states.z()[[1, 0, 0, 1]].re, 1.0);
    }

    #[test]
    fn saturation_needs_a_bound_pool() {
        let layout = StateLayout::new(1, 2, 1, 2, 2).expect("valid layout");
        let transmit = Transmit::new(Array1::ones(1), Array1::ones(1));
        let mut states = States::<f64>::equilibrium(layout);
        Inversion::new(Array1::ones(1))
            .with_saturation(
                &transmit,
                Saturation {
                    energy: 0.5,
                    lineshape: DEFAULT_LINESHAPE,
                },
            )
            .apply(&mut states)
            .expect("should invert");

        assert_relative_eq!(states.z()[[0, 0, 0, 0]].re, -1.0);
        assert_relative_eq!(states.z()[[0, 0, 0, 1]].re, -1.0);
    }
}
