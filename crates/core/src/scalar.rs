use std::fmt::Debug;
use std::ops::Neg;

use num_traits::NumAssign;

/// The scalar contract shared by every phase graph operator.
///
/// Operators are written once against `Real` and run either on plain `f64`
/// for signal simulation or on [`Dual`](crate::Dual) for forward-mode
/// derivatives. Comparisons and branch decisions use [`Real::value`], so both
/// instantiations take the same code path for the same inputs.
pub trait Real:
    Copy + Debug + Default + PartialOrd + NumAssign + Neg<Output = Self> + Send + Sync + 'static
{
    /// Lifts a constant into the scalar type with a zero tangent.
    fn from_f64(value: f64) -> Self;

    /// Builds a scalar carrying the given tangent.
    ///
    /// Types without a tangent component ignore `tangent`.
    fn with_tangent(value: f64, tangent: f64) -> Self;

    /// Returns the primal value.
    fn value(self) -> f64;

    /// Returns the derivative carried alongside the value.
    fn tangent(self) -> f64;

    fn exp(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;

    /// Returns `true` if the primal value is neither infinite nor NaN.
    fn is_finite(self) -> bool {
        self.value().is_finite()
    }
}

impl Real for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn with_tangent(value: f64, _tangent: f64) -> Self {
        value
    }

    fn value(self) -> f64 {
        self
    }

    fn tangent(self) -> f64 {
        0.0
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

/// Converts a relaxation time in milliseconds to a rate in 1/s.
///
/// Zero, negative, and non-finite times produce a zero rate, so an infinite
/// or missing relaxation time means "no relaxation" instead of a NaN.
pub fn safe_rate<T: Real>(time_ms: T) -> T {
    let t = time_ms.value();
    if t > 0.0 && t.is_finite() {
        T::from_f64(1000.0) / time_ms
    } else {
        T::zero()
    }
}

/// Clamps negative and non-finite values to zero.
pub fn non_negative<T: Real>(value: T) -> T {
    let v = value.value();
    if v > 0.0 && v.is_finite() {
        value
    } else {
        T::zero()
    }
}
