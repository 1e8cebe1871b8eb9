use phasegraph_core::ConfigurationError;
use uom::si::angle::degree;
use uom::si::f64::{Angle, Time};
use uom::si::time::millisecond;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::PhaseSchedule;
use crate::sequence::{Plan, Readout, RfEnergy, Train, non_negative, positive};

/// Inversion-prepared, RF-spoiled gradient echo.
///
/// Spoiling is not ideal: the gradient shifts the states by one order each
/// repetition and the quadratic RF phase cycle breaks up the echoes.
///
/// Each block is an inversion, a delay `TI`, the shot train and a recovery
/// delay that fills the block duration. Every block is recorded; the RF
/// phase schedule restarts with each block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct MprageConfig {
    train: Train,
    ti: Time,
    spoil_increment: Angle,
    inversions: usize,
    block: Option<Time>,
    inversion_energy: Option<RfEnergy>,
}

impl MprageConfig {
    /// Creates a single-inversion sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if `ti` is negative.
    pub fn new(train: Train, ti: Time) -> Result<Self, ConfigurationError> {
        non_negative("TI", ti)?;
        Ok(Self {
            train,
            ti,
            spoil_increment: Angle::new::<degree>(117.0),
            inversions: 1,
            block: None,
            inversion_energy: None,
        })
    }

    /// Sets the quadratic RF spoiling increment (default 117°).
    #[must_use]
    pub fn with_spoil_increment(mut self, increment: Angle) -> Self {
        self.spoil_increment = increment;
        self
    }

    /// Repeats the inversion block `count` times, one every `block`.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is zero or the block is too short to hold
    /// the inversion delay and the whole shot train.
    pub fn with_inversions(mut self, count: usize, block: Time) -> Result<Self, ConfigurationError> {
        if count == 0 {
            return Err(ConfigurationError::OutOfRange {
                name: "num_inversions",
                reason: "at least one inversion is required".into(),
            });
        }
        positive("tr_block", block)?;

        let busy = self.ti.get::<millisecond>()
            + self.train.len() as f64 * self.train.tr().get::<millisecond>();
        if block.get::<millisecond>() < busy {
            return Err(ConfigurationError::OutOfRange {
                name: "tr_block",
                reason: format!("must be at least TI + nshots·TR = {busy} ms"),
            });
        }

        self.inversions = count;
        self.block = Some(block);
        Ok(self)
    }

    /// Sets the energy `b1sqrdtau` (µT²·ms) of the inversion pulse, which
    /// saturates the bound pool of magnetization-transfer tissues.
    ///
    /// # Errors
    ///
    /// Returns an error if the energy is negative or not finite.
    pub fn with_inversion_energy(mut self, b1sqrdtau: f64) -> Result<Self, ConfigurationError> {
        self.inversion_energy = Some(RfEnergy::new(b1sqrdtau, Angle::new::<degree>(180.0))?);
        Ok(self)
    }

    #[must_use]
    pub fn train(&self) -> &Train {
        &self.train
    }

    #[must_use]
    pub fn inversions(&self) -> usize {
        self.inversions
    }

    pub(crate) fn plan(&self) -> Plan {
        Plan {
            ti: Some(self.ti.get::<millisecond>()),
            inversion_energy: self
                .inversion_energy
                .map(|energy| energy.energy(std::f64::consts::PI)),
            block: self.block.map(|block| block.get::<millisecond>()),
            blocks: self.inversions,
            ..self.train.plan(
                0.0,
                Readout::Shift,
                PhaseSchedule::Quadratic(self.spoil_increment),
            )
        }
    }
}
