use phasegraph_core::{Real, ShapeError};

use crate::States;

/// A transformation of phase graph states.
///
/// Operators hold per-lane parameters precomputed for a fixed layout and
/// mutate the states they are given in place.
pub trait Operator<T: Real> {
    /// Applies the operator.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] if the operator was built for a
    /// different number of lanes than `states` holds.
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError>;

    /// Composes `self` followed by `next`.
    fn then<O>(self, next: O) -> Chain<Self, O>
    where
        Self: Sized,
        O: Operator<T>,
    {
        Chain { first: self, second: next }
    }
}

/// Two operators applied in sequence.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<T, A, B> Operator<T> for Chain<A, B>
where
    T: Real,
    A: Operator<T>,
    B: Operator<T>,
{
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        self.first.apply(states)?;
        self.second.apply(states)
    }
}

impl<T: Real, O: Operator<T> + ?Sized> Operator<T> for &O {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        (**self).apply(states)
    }
}
