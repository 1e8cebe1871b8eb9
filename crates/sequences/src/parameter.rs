use std::fmt;
use std::str::FromStr;

use phasegraph_core::ConfigurationError;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

/// A named tissue or sequence input that can be differentiated against.
///
/// Parsing and display use the conventional short names, e.g. `"T1"`,
/// `"weight_bm"` or `"TR"`. Derivatives are taken in the input's own units
/// (ms, Hz, degrees, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub enum Parameter {
    T1,
    T2,
    M0,
    B1,
    B1Phase,
    B0,
    T2Star,
    Diffusion,
    Velocity,
    ChemShift,
    InvEfficiency,
    T1Bm,
    T2Bm,
    Kbm,
    WeightBm,
    ChemShiftBm,
    Kmt,
    WeightMt,
    Tr,
    Te,
    Ti,
}

impl Parameter {
    pub const ALL: [Parameter; 21] = [
        Self::T1,
        Self::T2,
        Self::M0,
        Self::B1,
        Self::B1Phase,
        Self::B0,
        Self::T2Star,
        Self::Diffusion,
        Self::Velocity,
        Self::ChemShift,
        Self::InvEfficiency,
        Self::T1Bm,
        Self::T2Bm,
        Self::Kbm,
        Self::WeightBm,
        Self::ChemShiftBm,
        Self::Kmt,
        Self::WeightMt,
        Self::Tr,
        Self::Te,
        Self::Ti,
    ];

    /// Returns the conventional name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::M0 => "M0",
            Self::B1 => "B1",
            Self::B1Phase => "B1phase",
            Self::B0 => "B0",
            Self::T2Star => "T2star",
            Self::Diffusion => "D",
            Self::Velocity => "v",
            Self::ChemShift => "chemshift",
            Self::InvEfficiency => "inv_efficiency",
            Self::T1Bm => "T1bm",
            Self::T2Bm => "T2bm",
            Self::Kbm => "kbm",
            Self::WeightBm => "weight_bm",
            Self::ChemShiftBm => "chemshift_bm",
            Self::Kmt => "kmt",
            Self::WeightMt => "weight_mt",
            Self::Tr => "TR",
            Self::Te => "TE",
            Self::Ti => "TI",
        }
    }

    /// Returns `true` for sequence timings rather than tissue properties.
    #[must_use]
    pub const fn is_timing(self) -> bool {
        matches!(self, Self::Tr | Self::Te | Self::Ti)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|parameter| parameter.name() == s)
            .ok_or_else(|| ConfigurationError::UnknownParameter(s.to_owned()))
    }
}
