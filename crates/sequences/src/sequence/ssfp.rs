use phasegraph_core::ConfigurationError;
use uom::si::angle::degree;
use uom::si::f64::{Angle, Time};
use uom::si::time::millisecond;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::PhaseSchedule;
use crate::sequence::{GradientMoment, Plan, Readout, Train, non_negative};

/// Gradient scheme of an SSFP sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub enum SsfpMode {
    /// Fully refocused gradients; off-resonance shapes the steady state.
    Balanced,
    /// One order of dephasing per repetition.
    Unbalanced,
}

/// Steady-state free precession with linear RF phase cycling.
///
/// The echo time defaults to `TR/2` and the phase increment to 180°.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct SsfpConfig {
    train: Train,
    mode: SsfpMode,
    phase_increment: Angle,
    inversion: Option<Time>,
    gradient: Option<GradientMoment>,
}

impl SsfpConfig {
    #[must_use]
    pub fn new(train: Train, mode: SsfpMode) -> Self {
        Self {
            train,
            mode,
            phase_increment: Angle::new::<degree>(180.0),
            inversion: None,
            gradient: None,
        }
    }

    /// Sets the linear phase cycling increment.
    #[must_use]
    pub fn with_phase_increment(mut self, increment: Angle) -> Self {
        self.phase_increment = increment;
        self
    }

    /// Prepares the train with an adiabatic inversion `ti` before the first pulse.
    ///
    /// # Errors
    ///
    /// Returns an error if `ti` is negative.
    pub fn with_inversion(mut self, ti: Time) -> Result<Self, ConfigurationError> {
        non_negative("TI", ti)?;
        self.inversion = Some(ti);
        Ok(self)
    }

    /// Sets the unbalanced gradient moment.
    ///
    /// # Errors
    ///
    /// Returns an error for a balanced sequence, which has no net moment.
    pub fn with_gradient(mut self, gradient: GradientMoment) -> Result<Self, ConfigurationError> {
        if self.mode == SsfpMode::Balanced {
            return Err(ConfigurationError::OutOfRange {
                name: "gradient",
                reason: "balanced SSFP has no net gradient moment".into(),
            });
        }
        self.gradient = Some(gradient);
        Ok(self)
    }

    #[must_use]
    pub fn mode(&self) -> SsfpMode {
        self.mode
    }

    #[must_use]
    pub fn train(&self) -> &Train {
        &self.train
    }

    pub(crate) fn plan(&self) -> Plan {
        let readout = match self.mode {
            SsfpMode::Balanced => Readout::Balanced,
            SsfpMode::Unbalanced => Readout::Shift,
        };
        let half_tr = 0.5 * self.train.tr().get::<millisecond>();

        Plan {
            ti: self.inversion.map(|ti| ti.get::<millisecond>()),
            dk: self.gradient.map(|gradient| gradient.dk()),
            ..self.train.plan(
                half_tr,
                readout,
                PhaseSchedule::Linear(self.phase_increment),
            )
        }
    }
}
