use thiserror::Error;

/// Disagreement between array shapes.
///
/// Raised when tissue parameters cannot be broadcast together, or when an
/// operator built for one state layout is applied to another.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("shapes {left:?} and {right:?} cannot be broadcast together")]
    Incompatible { left: Vec<usize>, right: Vec<usize> },

    #[error("{what}: expected shape {expected:?}, found {found:?}")]
    Mismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("invalid array layout: {0}")]
    Layout(String),
}

impl From<ndarray::ShapeError> for ShapeError {
    fn from(error: ndarray::ShapeError) -> Self {
        Self::Layout(error.to_string())
    }
}

/// Invalid or incomplete configuration detected before simulation starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("`{given}` was provided without `{missing}`")]
    MissingCoupled {
        given: &'static str,
        missing: &'static str,
    },

    #[error("`{name}` is out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },

    #[error("`{name}` must be finite")]
    NotFinite { name: &'static str },

    #[error("`{name}` must not be empty")]
    Empty { name: &'static str },

    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("cannot differentiate with respect to `{name}`: {reason}")]
    NotDifferentiable { name: String, reason: &'static str },
}
