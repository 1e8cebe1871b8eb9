use phasegraph_core::{ConfigurationError, ShapeError};
use thiserror::Error;

/// Fatal errors raised while setting up a simulation.
///
/// Every error is raised before any state exists, so a failed call never
/// produces a partial signal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}
