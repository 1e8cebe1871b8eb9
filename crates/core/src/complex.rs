use num_complex::{Complex, Complex64};

use crate::Real;

/// Returns `e^{iθ}`.
pub fn cis<T: Real>(theta: T) -> Complex<T> {
    Complex::new(theta.cos(), theta.sin())
}

/// Returns `e^z` for a complex argument.
pub fn cexp<T: Real>(z: Complex<T>) -> Complex<T> {
    cis(z.im) * z.re.exp()
}

/// Lifts a complex constant into the scalar type `T`.
pub fn lift<T: Real>(z: Complex64) -> Complex<T> {
    Complex::new(T::from_f64(z.re), T::from_f64(z.im))
}

/// Extracts the primal value of a complex scalar.
pub fn value_of<T: Real>(z: Complex<T>) -> Complex64 {
    Complex64::new(z.re.value(), z.im.value())
}

/// Extracts the tangent of a complex scalar as `∂re + i·∂im`.
pub fn tangent_of<T: Real>(z: Complex<T>) -> Complex64 {
    Complex64::new(z.re.tangent(), z.im.tangent())
}
