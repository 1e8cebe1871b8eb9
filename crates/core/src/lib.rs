//! Core numeric types shared by the phasegraph crates.
//!
//! This crate defines the abstractions the phase graph operators and the
//! sequence simulators build on:
//!
//! - [`Model`]: a deterministic callable that maps a typed input to a typed output
//! - [`Real`]: the scalar contract every operator is generic over
//! - [`Dual`]: a forward-mode dual number used to obtain exact derivatives
//! - [`Param`]: a scalar or batched array input with numpy-style broadcasting
//! - [`ShapeError`], [`ConfigurationError`]: the fatal error taxonomy

mod broadcast;
mod complex;
mod dual;
mod error;
mod model;
mod scalar;

pub use broadcast::{Param, broadcast_shapes, lane_count};
pub use complex::{cexp, cis, lift, tangent_of, value_of};
pub use dual::Dual;
pub use error::{ConfigurationError, ShapeError};
pub use model::Model;
pub use scalar::{Real, non_negative, safe_rate};
