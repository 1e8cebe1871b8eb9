use uom::si::angle::degree;
use uom::si::f64::Angle;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::PhaseSchedule;
use crate::sequence::{Plan, Readout, Train};

/// RF-spoiled gradient echo without preparation.
///
/// Spoiling is modelled by quadratic RF phase cycling on top of one order
/// of gradient dephasing per repetition. The echo time defaults to 0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct SpgrConfig {
    train: Train,
    spoil_increment: Angle,
}

impl SpgrConfig {
    #[must_use]
    pub fn new(train: Train) -> Self {
        Self {
            train,
            spoil_increment: Angle::new::<degree>(117.0),
        }
    }

    /// Sets the quadratic RF spoiling increment (default 117°).
    #[must_use]
    pub fn with_spoil_increment(mut self, increment: Angle) -> Self {
        self.spoil_increment = increment;
        self
    }

    #[must_use]
    pub fn train(&self) -> &Train {
        &self.train
    }

    pub(crate) fn plan(&self) -> Plan {
        self.train.plan(
            0.0,
            Readout::Shift,
            PhaseSchedule::Quadratic(self.spoil_increment),
        )
    }
}
