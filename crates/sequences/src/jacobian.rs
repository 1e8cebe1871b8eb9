use ndarray::{Array2, Array3, ArrayD, IxDyn};
use num_complex::{Complex, Complex64};
use phasegraph_core::{Real, ShapeError};

/// Derivatives of the signal with respect to the requested parameters.
///
/// Shaped `(samples, *batch_shape, parameters)`. When every derivative is
/// real the Jacobian collapses to [`Jacobian::Real`].
#[derive(Debug, Clone, PartialEq)]
pub enum Jacobian {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl Jacobian {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Real(array) => array.shape(),
            Self::Complex(array) => array.shape(),
        }
    }

    #[must_use]
    pub fn is_real(&self) -> bool {
        matches!(self, Self::Real(_))
    }

    /// Returns the Jacobian as complex values, whatever its variant.
    #[must_use]
    pub fn to_complex(&self) -> ArrayD<Complex64> {
        match self {
            Self::Real(array) => array.mapv(|value| Complex64::new(value, 0.0)),
            Self::Complex(array) => array.clone(),
        }
    }
}

/// Stacks the real and imaginary parts of a complex signal along a new
/// leading axis of length 2.
pub(crate) fn split<T: Real>(signal: &Array2<Complex<T>>) -> Array3<T> {
    let (rows, cols) = signal.dim();
    Array3::from_shape_fn((2, rows, cols), |(part, row, col)| {
        let value = signal[[row, col]];
        if part == 0 { value.re } else { value.im }
    })
}

/// Inverse of [`split`] on the tangents.
pub(crate) fn combine(parts: &Array3<f64>) -> Array2<Complex64> {
    let (_, rows, cols) = parts.dim();
    Array2::from_shape_fn((rows, cols), |(row, col)| {
        Complex64::new(parts[[0, row, col]], parts[[1, row, col]])
    })
}

/// Tangent of a complex signal computed on dual numbers.
pub(crate) fn tangent<T: Real>(signal: &Array2<Complex<T>>) -> Array2<Complex64> {
    combine(&split(signal).mapv(T::tangent))
}

/// Assembles per-parameter columns `(samples, lanes)` into the Jacobian.
pub(crate) fn assemble(
    columns: &[Array2<Complex64>],
    signal_shape: &[usize],
) -> Result<Jacobian, ShapeError> {
    let mut dims = signal_shape.to_vec();
    dims.push(columns.len());
    let (rows, cols) = columns.first().map_or((0, 0), |column| column.dim());

    let stacked = Array3::from_shape_fn((rows, cols, columns.len()), |(row, col, p)| {
        columns[p][[row, col]]
    });
    let complex = stacked.into_shape_with_order(IxDyn(&dims))?;

    if complex.iter().all(|z| z.im == 0.0) {
        Ok(Jacobian::Real(complex.mapv(|z| z.re)))
    } else {
        Ok(Jacobian::Complex(complex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use phasegraph_core::Dual;

    #[test]
    fn split_stacks_parts() {
        let signal = Array2::from_shape_fn((2, 3), |(i, j)| Complex::new(i as f64, j as f64));
        let parts = split(&signal);
        assert_eq!(parts.dim(), (2, 2, 3));
        assert_eq!(parts[[0, 1, 2]], 1.0);
        assert_eq!(parts[[1, 1, 2]], 2.0);
        assert_eq!(combine(&parts), signal);
    }

    #[test]
    fn tangent_of_dual_signal() {
        let signal = Array2::from_elem(
            (1, 1),
            Complex::new(Dual::new(1.0, 0.5), Dual::new(-2.0, 3.0)),
        );
        assert_eq!(tangent(&signal)[[0, 0]], Complex64::new(0.5, 3.0));
    }

    #[test]
    fn real_derivatives_collapse() {
        let column = Array2::from_elem((4, 6), Complex64::new(2.0, 0.0));
        let jacobian = assemble(&[column.clone(), column], &[4, 2, 3]).expect("valid shape");
        assert!(jacobian.is_real());
        assert_eq!(jacobian.shape(), &[4, 2, 3, 2]);
    }

    #[test]
    fn complex_derivatives_are_kept() {
        let column = Array2::from_elem((4, 1), Complex64::new(0.0, 1.0));
        let jacobian = assemble(&[column], &[4]).expect("valid shape");
        assert!(!jacobian.is_real());
        assert_eq!(jacobian.shape(), &[4, 1]);
        assert_eq!(jacobian.to_complex()[[3, 0]], Complex64::new(0.0, 1.0));
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let column = Array2::from_elem((4, 6), Complex64::new(1.0, 0.0));
        assert!(assemble(&[column], &[4, 5]).is_err());
    }
}
