//! Extended phase graph states and the operators that act on them.
//!
//! A phase graph describes magnetization as a set of dephasing orders. The
//! [`States`] buffer holds `F+`, `F-` and `Z` for every batch lane, spatial
//! location and pool. Operators implement [`Operator`] and mutate the states
//! in place:
//!
//! - [`RfPulse`]: instantaneous rotation, with optional bound-pool saturation
//! - [`Relaxation`]: free relaxation and multi-pool exchange
//! - [`Shift`]: gradient dephasing by one order
//! - [`Spoil`]: destruction of transverse coherence
//! - [`Inversion`]: adiabatic inversion
//! - [`Diffusion`], [`Flow`]: motion sensitivity of unbalanced gradients
//! - [`Precession`]: off-resonance rotation
//!
//! [`Observation`] reads the signal and [`Susceptibility`] weights the
//! recorded signal at the echo time.
//!
//! Every operator is generic over [`Real`](phasegraph_core::Real), so the
//! same code runs on `f64` and on dual numbers for derivatives.

mod diffusion;
mod expm;
mod flow;
mod inversion;
mod observe;
mod operator;
mod precession;
mod relaxation;
mod rf;
mod shift;
mod spoil;
mod state;
mod susceptibility;

pub use diffusion::Diffusion;
pub use expm::{expm, expm2};
pub use flow::Flow;
pub use inversion::Inversion;
pub use observe::Observation;
pub use operator::{Chain, Operator};
pub use precession::Precession;
pub use relaxation::{PoolRates, Relaxation, longitudinal_decay};
pub use rf::{DEFAULT_LINESHAPE, GAMMA, RfPulse, RotationMatrix, Saturation, Transmit};
pub use shift::Shift;
pub use spoil::Spoil;
pub use state::{StateLayout, States};
pub use susceptibility::{Susceptibility, reversible_rate};
