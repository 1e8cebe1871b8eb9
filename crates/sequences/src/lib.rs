//! Pulse-sequence simulators built on extended phase graphs.
//!
//! A simulation combines three inputs:
//!
//! - a [`Sequence`]: one of [`FingerprintingConfig`], [`MprageConfig`],
//!   [`SsfpConfig`] or [`SpgrConfig`], each built around a flip-angle [`Train`]
//! - [`TissueParameters`]: scalar or batched tissue properties, from which a
//!   [`PoolModel`] is selected
//! - [`Options`]: state window, chunking and the [`Parameter`]s to differentiate
//!
//! [`simulate`] returns a [`Simulation`] holding the signal, shaped
//! `(samples, *batch_shape)`, and optionally the [`Jacobian`].
//!
//! # Example
//!
//! ```
//! use phasegraph_sequences::{Options, Parameter, SpgrConfig, TissueParameters, Train, simulate};
//! use uom::si::angle::degree;
//! use uom::si::f64::{Angle, Time};
//! use uom::si::time::millisecond;
//!
//! let train = Train::constant(Angle::new::<degree>(10.0), 100, Time::new::<millisecond>(8.0))?;
//! let tissue = TissueParameters::builder(vec![800.0, 1200.0], 80.0).build()?;
//! let options = Options::default().with_diff([Parameter::T1])?;
//!
//! let simulation = simulate(&SpgrConfig::new(train).into(), &tissue, &options)?;
//! assert_eq!(simulation.signal().shape(), &[100, 2]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod context;
mod engine;
mod error;
mod jacobian;
mod options;
mod parameter;
mod phase;
mod sequence;
mod simulate;
mod tissue;

pub use error::SimulationError;
pub use jacobian::Jacobian;
pub use options::Options;
pub use parameter::Parameter;
pub use phase::PhaseSchedule;
pub use sequence::{
    FingerprintingConfig, GradientMoment, MprageConfig, RfEnergy, Sequence, SpgrConfig,
    SsfpConfig, SsfpMode, Train,
};
pub use simulate::{Info, Simulation, Simulator, simulate};
pub use tissue::{BoundPool, PoolModel, SecondaryPool, TissueBuilder, TissueParameters};
