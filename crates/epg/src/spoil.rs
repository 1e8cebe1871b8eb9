use num_complex::Complex;
use num_traits::Zero;
use phasegraph_core::{Real, ShapeError};

use crate::{Operator, States};

/// Ideal spoiling: all transverse coherences are destroyed, `Z` is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spoil;

impl<T: Real> Operator<T> for Spoil {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        let (fp, fm, _) = states.arrays_mut();
        fp.fill(Complex::zero());
        fm.fill(Complex::zero());
        Ok(())
    }
}
