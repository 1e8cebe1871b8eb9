//! Typed configuration of each supported pulse sequence.

mod fingerprinting;
mod mprage;
mod ssfp;
mod spgr;

pub use fingerprinting::FingerprintingConfig;
pub use mprage::MprageConfig;
pub use ssfp::{SsfpConfig, SsfpMode};
pub use spgr::SpgrConfig;

use phasegraph_core::ConfigurationError;
use uom::si::angle::radian;
use uom::si::f64::{Angle, Length, Time};
use uom::si::length::meter;
use uom::si::time::millisecond;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::{Parameter, PhaseSchedule};

/// A pulse sequence to simulate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub enum Sequence {
    /// Inversion-prepared unbalanced SSFP with a varying flip train.
    Fingerprinting(FingerprintingConfig),
    /// Inversion-prepared, RF-spoiled gradient echo.
    Mprage(MprageConfig),
    /// Phase-cycled steady-state free precession.
    Ssfp(SsfpConfig),
    /// RF-spoiled gradient echo.
    Spgr(SpgrConfig),
}

impl From<FingerprintingConfig> for Sequence {
    fn from(config: FingerprintingConfig) -> Self {
        Self::Fingerprinting(config)
    }
}

impl From<MprageConfig> for Sequence {
    fn from(config: MprageConfig) -> Self {
        Self::Mprage(config)
    }
}

impl From<SsfpConfig> for Sequence {
    fn from(config: SsfpConfig) -> Self {
        Self::Ssfp(config)
    }
}

impl From<SpgrConfig> for Sequence {
    fn from(config: SpgrConfig) -> Self {
        Self::Spgr(config)
    }
}

impl Sequence {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fingerprinting(_) => "fingerprinting",
            Self::Mprage(_) => "mprage",
            Self::Ssfp(_) => "ssfp",
            Self::Spgr(_) => "spgr",
        }
    }

    pub(crate) fn plan(&self) -> Plan {
        match self {
            Self::Fingerprinting(config) => config.plan(),
            Self::Mprage(config) => config.plan(),
            Self::Ssfp(config) => config.plan(),
            Self::Spgr(config) => config.plan(),
        }
    }
}

/// A flip-angle train with its repetition and echo times.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct Train {
    flips: Vec<Angle>,
    tr: Time,
    te: Option<Time>,
    profile: Vec<f64>,
    rf_energy: Option<RfEnergy>,
}

impl Train {
    /// Creates a train of the given flip angles, one every `tr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the train is empty, a flip angle is not finite, or
    /// `tr` is not positive.
    pub fn new(
        flips: impl IntoIterator<Item = Angle>,
        tr: Time,
    ) -> Result<Self, ConfigurationError> {
        let flips: Vec<Angle> = flips.into_iter().collect();
        if flips.is_empty() {
            return Err(ConfigurationError::Empty { name: "flip" });
        }
        if flips.iter().any(|flip| !flip.get::<radian>().is_finite()) {
            return Err(ConfigurationError::NotFinite { name: "flip" });
        }
        positive("TR", tr)?;

        Ok(Self {
            flips,
            tr,
            te: None,
            profile: vec![1.0],
            rf_energy: None,
        })
    }

    /// Creates a train of `count` identical pulses.
    ///
    /// # Errors
    ///
    /// See [`Train::new`].
    pub fn constant(flip: Angle, count: usize, tr: Time) -> Result<Self, ConfigurationError> {
        Self::new(std::iter::repeat_n(flip, count), tr)
    }

    /// Sets the echo time.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 ≤ te ≤ tr`.
    pub fn with_te(mut self, te: Time) -> Result<Self, ConfigurationError> {
        let ms = te.get::<millisecond>();
        if !ms.is_finite() || ms < 0.0 || ms > self.tr.get::<millisecond>() {
            return Err(ConfigurationError::OutOfRange {
                name: "TE",
                reason: "must lie between 0 and TR".into(),
            });
        }
        self.te = Some(te);
        Ok(self)
    }

    /// Sets the relative flip-angle profile across the slice.
    ///
    /// Each weight is one spatial location; signals are averaged over them.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is empty or not finite.
    pub fn with_profile(mut self, profile: Vec<f64>) -> Result<Self, ConfigurationError> {
        if profile.is_empty() {
            return Err(ConfigurationError::Empty {
                name: "slice_profile",
            });
        }
        if profile.iter().any(|w| !w.is_finite()) {
            return Err(ConfigurationError::NotFinite {
                name: "slice_profile",
            });
        }
        self.profile = profile;
        Ok(self)
    }

    /// Sets the pulse energy used to saturate a bound pool.
    #[must_use]
    pub fn with_rf_energy(mut self, rf_energy: RfEnergy) -> Self {
        self.rf_energy = Some(rf_energy);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flips.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flips.is_empty()
    }

    #[must_use]
    pub fn tr(&self) -> Time {
        self.tr
    }

    #[must_use]
    pub fn te(&self) -> Option<Time> {
        self.te
    }

    /// Fills the plan fields owned by the train.
    fn plan(&self, default_te: f64, readout: Readout, phases: PhaseSchedule) -> Plan {
        let tr = self.tr.get::<millisecond>();
        let flips: Vec<f64> = self.flips.iter().map(|f| f.get::<radian>()).collect();
        let phases = match phases {
            PhaseSchedule::Constant => None,
            schedule => Some(schedule.radians(flips.len())),
        };

        Plan {
            energies: self
                .rf_energy
                .map(|energy| flips.iter().map(|&flip| energy.energy(flip)).collect()),
            flips,
            phases,
            tr,
            te: self.te.map_or(default_te, |te| te.get::<millisecond>()),
            ti: None,
            inversion_energy: None,
            block: None,
            repetitions: 1,
            blocks: 1,
            readout,
            dk: None,
            profile: self.profile.clone(),
        }
    }
}

/// Pulse energy `∫B1²dt` of the train, for bound-pool saturation.
///
/// Pulses are assumed to share one shape, so the energy of each pulse scales
/// with its flip angle squared relative to `reference`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct RfEnergy {
    b1sqrdtau: f64,
    reference: Angle,
}

impl RfEnergy {
    /// Creates the energy `b1sqrdtau` (µT²·ms) of a pulse with flip `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the energy is negative or not finite, or the
    /// reference flip is zero.
    pub fn new(b1sqrdtau: f64, reference: Angle) -> Result<Self, ConfigurationError> {
        if !b1sqrdtau.is_finite() || b1sqrdtau < 0.0 {
            return Err(ConfigurationError::OutOfRange {
                name: "b1sqrdtau",
                reason: "must be finite and non-negative".into(),
            });
        }
        let flip = reference.get::<radian>();
        if !flip.is_finite() || flip == 0.0 {
            return Err(ConfigurationError::OutOfRange {
                name: "reference_flip",
                reason: "must be finite and non-zero".into(),
            });
        }
        Ok(Self {
            b1sqrdtau,
            reference,
        })
    }

    /// Energy of a pulse with flip `flip` (rad), in µT²·s.
    fn energy(&self, flip: f64) -> f64 {
        let ratio = flip / self.reference.get::<radian>();
        self.b1sqrdtau * 1e-3 * ratio * ratio
    }
}

/// Dephasing of the unbalanced gradient in each repetition.
///
/// Given as the phase twist across one voxel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct GradientMoment {
    dephasing: Angle,
    voxel: Length,
}

impl GradientMoment {
    /// # Errors
    ///
    /// Returns an error if the voxel size is not positive or the dephasing
    /// is not finite.
    pub fn new(dephasing: Angle, voxel: Length) -> Result<Self, ConfigurationError> {
        if !dephasing.get::<radian>().is_finite() {
            return Err(ConfigurationError::NotFinite { name: "dephasing" });
        }
        let size = voxel.get::<meter>();
        if !size.is_finite() || size <= 0.0 {
            return Err(ConfigurationError::OutOfRange {
                name: "voxel",
                reason: "must be positive".into(),
            });
        }
        Ok(Self { dephasing, voxel })
    }

    /// Spatial frequency step per repetition in rad/m.
    #[must_use]
    pub fn dk(&self) -> f64 {
        self.dephasing.get::<radian>() / self.voxel.get::<meter>()
    }
}

/// What happens to transverse coherence at the end of each repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readout {
    /// Unbalanced gradient: shift by one order.
    Shift,
    /// Ideal spoiling.
    Spoil,
    /// Balanced gradients: off-resonance precession acts on the states.
    Balanced,
}

/// Resolved instructions for one simulation.
///
/// Angles are in radians and times in ms.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plan {
    pub flips: Vec<f64>,
    pub phases: Option<Vec<f64>>,
    /// Bound-pool saturation energy per pulse, µT²·s.
    pub energies: Option<Vec<f64>>,
    pub tr: f64,
    pub te: f64,
    /// Inversion time; `None` skips preparation.
    pub ti: Option<f64>,
    /// Bound-pool saturation energy of the inversion pulse, µT²·s.
    pub inversion_energy: Option<f64>,
    /// Duration of one inversion block.
    pub block: Option<f64>,
    /// Passes through the train; only the last is recorded.
    pub repetitions: usize,
    /// Inversion blocks, all recorded.
    pub blocks: usize,
    pub readout: Readout,
    pub dk: Option<f64>,
    pub profile: Vec<f64>,
}

impl Plan {
    /// Number of recorded samples.
    pub fn samples(&self) -> usize {
        self.blocks * self.flips.len()
    }

    /// Returns why `parameter` cannot be differentiated, if it cannot.
    pub fn unsupported(&self, parameter: Parameter) -> Option<&'static str> {
        match parameter {
            Parameter::Ti if self.ti.is_none() => Some("the sequence has no inversion"),
            Parameter::Diffusion | Parameter::Velocity if self.dk.is_none() => {
                Some("the sequence has no unbalanced gradient moment")
            }
            _ => None,
        }
    }
}

fn positive(name: &'static str, time: Time) -> Result<(), ConfigurationError> {
    let ms = time.get::<millisecond>();
    if ms.is_finite() && ms > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::OutOfRange {
            name,
            reason: "must be positive".into(),
        })
    }
}

fn non_negative(name: &'static str, time: Time) -> Result<(), ConfigurationError> {
    let ms = time.get::<millisecond>();
    if ms.is_finite() && ms >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::OutOfRange {
            name,
            reason: "must be non-negative".into(),
        })
    }
}
