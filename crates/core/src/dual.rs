use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign};

use num_traits::{Num, One, Zero};

use crate::Real;

/// A forward-mode dual number `re + eps·ε` with `ε² = 0`.
///
/// Evaluating a computation on duals whose input carries `eps = 1` yields the
/// exact derivative of the output in `eps`. A `Complex<Dual>` differentiates
/// the real and imaginary parts of a complex result independently.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Dual {
    pub re: f64,
    pub eps: f64,
}

impl Dual {
    /// Creates a dual number from a value and a tangent.
    #[must_use]
    pub const fn new(re: f64, eps: f64) -> Self {
        Self { re, eps }
    }

    /// Creates a constant (zero tangent).
    #[must_use]
    pub const fn constant(re: f64) -> Self {
        Self { re, eps: 0.0 }
    }

    /// Creates the independent variable (unit tangent).
    #[must_use]
    pub const fn variable(re: f64) -> Self {
        Self { re, eps: 1.0 }
    }
}

impl fmt::Display for Dual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl PartialOrd for Dual {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

impl Add for Dual {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.re * rhs.re, self.eps * rhs.re + self.re * rhs.eps)
    }
}

impl Div for Dual {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let re = self.re / rhs.re;
        Self::new(re, (self.eps - re * rhs.eps) / rhs.re)
    }
}

impl Rem for Dual {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self {
        // a % b = a - b·trunc(a/b), with the quotient piecewise constant.
        let q = (self.re / rhs.re).trunc();
        Self::new(self.re % rhs.re, self.eps - q * rhs.eps)
    }
}

impl Neg for Dual {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.re, -self.eps)
    }
}

impl AddAssign for Dual {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Dual {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Dual {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Dual {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl RemAssign for Dual {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Num for Dual {
    type FromStrRadixErr = <f64 as Num>::FromStrRadixErr;

    fn from_str_radix(s: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        <f64 as Num>::from_str_radix(s, radix).map(Self::constant)
    }
}

impl Real for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn with_tangent(value: f64, tangent: f64) -> Self {
        Self::new(value, tangent)
    }

    fn value(self) -> f64 {
        self.re
    }

    fn tangent(self) -> f64 {
        self.eps
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        Self::new(e, self.eps * e)
    }

    fn sin(self) -> Self {
        let (s, c) = self.re.sin_cos();
        Self::new(s, self.eps * c)
    }

    fn cos(self) -> Self {
        let (s, c) = self.re.sin_cos();
        Self::new(c, -self.eps * s)
    }

    fn sqrt(self) -> Self {
        let r = self.re.sqrt();
        // The derivative is unbounded at zero; callers branch away from it.
        let eps = if r > 0.0 { self.eps / (2.0 * r) } else { 0.0 };
        Self::new(r, eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use num_complex::Complex;

    #[test]
    fn product_rule() {
        let x = Dual::variable(3.0);
        let y = x * x * Dual::constant(2.0);
        assert_relative_eq!(y.re, 18.0);
        assert_relative_eq!(y.eps, 12.0);
    }

    #[test]
    fn quotient_rule() {
        let x = Dual::variable(2.0);
        let y = Dual::constant(1.0) / x;
        assert_relative_eq!(y.re, 0.5);
        assert_relative_eq!(y.eps, -0.25);
    }

    #[test]
    fn transcendental_derivatives() {
        let x = Dual::variable(0.7);
        assert_relative_eq!(x.exp().eps, 0.7_f64.exp());
        assert_relative_eq!(x.sin().eps, 0.7_f64.cos());
        assert_relative_eq!(x.cos().eps, -0.7_f64.sin());
        assert_relative_eq!(x.sqrt().eps, 0.5 / 0.7_f64.sqrt());
    }

    #[test]
    fn sqrt_at_zero_has_zero_tangent() {
        let root = Dual::variable(0.0).sqrt();
        assert_eq!(root, Dual::new(0.0, 0.0));
    }

    #[test]
    fn complex_multiplication_differentiates_both_parts() {
        // (x + i)·(x - i) = x² + 1, d/dx = 2x
        let x = Dual::variable(1.5);
        let a = Complex::new(x, Dual::one());
        let b = Complex::new(x, -Dual::one());
        let p = a * b;
        assert_relative_eq!(p.re.re, 3.25);
        assert_relative_eq!(p.re.eps, 3.0);
        assert_relative_eq!(p.im.re, 0.0);
        assert_relative_eq!(p.im.eps, 0.0);
    }

    #[test]
    fn ordering_uses_value() {
        assert!(Dual::new(1.0, 100.0) < Dual::new(2.0, -100.0));
    }
}
