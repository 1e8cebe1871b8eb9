use phasegraph_core::ConfigurationError;
use uom::si::f64::Time;
use uom::si::time::millisecond;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::PhaseSchedule;
use crate::sequence::{GradientMoment, Plan, Readout, Train, non_negative};

/// Magnetic resonance fingerprinting with an unbalanced SSFP readout.
///
/// The train may be played several times to approach a steady state. Each
/// pass starts with the inversion, if any, and only the last pass is
/// recorded. The echo time defaults to 0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct FingerprintingConfig {
    train: Train,
    inversion: Option<Time>,
    repetitions: usize,
    gradient: Option<GradientMoment>,
}

impl FingerprintingConfig {
    #[must_use]
    pub fn new(train: Train) -> Self {
        Self {
            train,
            inversion: None,
            repetitions: 1,
            gradient: None,
        }
    }

    /// Prepares every pass with an adiabatic inversion `ti` before the first pulse.
    ///
    /// # Errors
    ///
    /// Returns an error if `ti` is negative.
    pub fn with_inversion(mut self, ti: Time) -> Result<Self, ConfigurationError> {
        non_negative("TI", ti)?;
        self.inversion = Some(ti);
        Ok(self)
    }

    /// Plays the train `repetitions` times in a row.
    ///
    /// # Errors
    ///
    /// Returns an error if `repetitions` is zero.
    pub fn with_repetitions(mut self, repetitions: usize) -> Result<Self, ConfigurationError> {
        if repetitions == 0 {
            return Err(ConfigurationError::OutOfRange {
                name: "nreps",
                reason: "at least one repetition is required".into(),
            });
        }
        self.repetitions = repetitions;
        Ok(self)
    }

    /// Sets the unbalanced gradient, enabling diffusion and flow effects.
    #[must_use]
    pub fn with_gradient(mut self, gradient: GradientMoment) -> Self {
        self.gradient = Some(gradient);
        self
    }

    #[must_use]
    pub fn train(&self) -> &Train {
        &self.train
    }

    pub(crate) fn plan(&self) -> Plan {
        Plan {
            ti: self.inversion.map(|ti| ti.get::<millisecond>()),
            repetitions: self.repetitions,
            dk: self.gradient.map(|gradient| gradient.dk()),
            ..self.train.plan(0.0, Readout::Shift, PhaseSchedule::Constant)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::angle::degree;
    use uom::si::f64::Angle;

    fn train() -> Train {
        Train::constant(
            Angle::new::<degree>(30.0),
            8,
            Time::new::<millisecond>(10.0),
        )
        .expect("valid train")
    }

    #[test]
    fn plan_without_preparation() {
        let plan = FingerprintingConfig::new(train()).plan();
        assert_eq!(plan.ti, None);
        assert_eq!(plan.te, 0.0);
        assert_eq!(plan.phases, None);
        assert_eq!(plan.readout, Readout::Shift);
        assert_eq!(plan.samples(), 8);
    }

    #[test]
    fn inversion_and_repetitions() {
        let config = FingerprintingConfig::new(train())
            .with_inversion(Time::new::<millisecond>(20.0))
            .expect("valid TI")
            .with_repetitions(3)
            .expect("valid repetitions");
        let plan = config.plan();
        assert_relative_eq!(plan.ti.expect("inversion is set"), 20.0, max_relative = 1e-12);
        assert_eq!(plan.repetitions, 3);
        assert_eq!(plan.samples(), 8);

        assert!(
            FingerprintingConfig::new(train())
                .with_repetitions(0)
                .is_err()
        );
        assert!(
            FingerprintingConfig::new(train())
                .with_inversion(Time::new::<millisecond>(-1.0))
                .is_err()
        );
    }
}
