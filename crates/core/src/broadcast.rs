use ndarray::{Array1, ArrayD, IxDyn};

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::ShapeError;

/// A scalar or batched array input.
///
/// Arrays follow numpy broadcasting rules: shapes are aligned from the
/// trailing axis and a length-1 axis stretches to match. A scalar broadcasts
/// with any shape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub enum Param {
    Scalar(f64),
    Array(ArrayD<f64>),
}

impl Default for Param {
    fn default() -> Self {
        Self::Scalar(0.0)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<ArrayD<f64>> for Param {
    fn from(value: ArrayD<f64>) -> Self {
        Self::Array(value)
    }
}

impl From<Array1<f64>> for Param {
    fn from(value: Array1<f64>) -> Self {
        Self::Array(value.into_dyn())
    }
}

impl From<Vec<f64>> for Param {
    fn from(value: Vec<f64>) -> Self {
        Self::Array(Array1::from(value).into_dyn())
    }
}

impl Param {
    /// Returns the array shape, empty for a scalar.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Scalar(_) => &[],
            Self::Array(array) => array.shape(),
        }
    }

    /// Returns `true` if `predicate` holds for every element.
    pub fn all(&self, predicate: impl Fn(f64) -> bool) -> bool {
        match self {
            Self::Scalar(value) => predicate(*value),
            Self::Array(array) => array.iter().all(|&value| predicate(value)),
        }
    }

    /// Broadcasts to `shape` and flattens to one value per lane in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Incompatible`] if the parameter cannot be
    /// broadcast to `shape`.
    pub fn to_lanes(&self, shape: &[usize]) -> Result<Array1<f64>, ShapeError> {
        match self {
            Self::Scalar(value) => Ok(Array1::from_elem(lane_count(shape), *value)),
            Self::Array(array) => array
                .broadcast(IxDyn(shape))
                .map(|view| view.iter().copied().collect())
                .ok_or_else(|| ShapeError::Incompatible {
                    left: array.shape().to_vec(),
                    right: shape.to_vec(),
                }),
        }
    }
}

/// Returns the number of lanes in a batch shape (1 for a scalar batch).
#[must_use]
pub fn lane_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Computes the common broadcast shape of a set of shapes.
///
/// # Errors
///
/// Returns [`ShapeError::Incompatible`] if two shapes disagree on an axis
/// where neither has length 1.
pub fn broadcast_shapes<'a>(
    shapes: impl IntoIterator<Item = &'a [usize]>,
) -> Result<Vec<usize>, ShapeError> {
    let mut result: Vec<usize> = Vec::new();

    for shape in shapes {
        let ndim = result.len().max(shape.len());
        let mut merged = vec![1; ndim];

        for (axis, slot) in merged.iter_mut().enumerate() {
            let a = axis_len(&result, axis, ndim);
            let b = axis_len(shape, axis, ndim);
            *slot = match (a, b) {
                (a, b) if a == b => a,
                (1, b) => b,
                (a, 1) => a,
                _ => {
                    return Err(ShapeError::Incompatible {
                        left: result.clone(),
                        right: shape.to_vec(),
                    });
                }
            };
        }

        result = merged;
    }

    Ok(result)
}

/// Length of `axis` once `shape` is right-aligned into `ndim` dimensions.
fn axis_len(shape: &[usize], axis: usize, ndim: usize) -> usize {
    let offset = ndim - shape.len();
    if axis < offset { 1 } else { shape[axis - offset] }
}
