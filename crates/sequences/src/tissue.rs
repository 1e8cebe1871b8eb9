use phasegraph_core::{ConfigurationError, Param, broadcast_shapes, lane_count};

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::{Parameter, SimulationError};

/// A secondary free-water pool exchanging with the main pool.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct SecondaryPool {
    /// Longitudinal relaxation time in ms.
    pub t1: Param,
    /// Transverse relaxation time in ms.
    pub t2: Param,
    /// Non-directional exchange rate in 1/s.
    pub exchange_rate: Param,
    /// Population fraction.
    pub weight: Param,
    /// Chemical shift relative to the main pool in Hz.
    pub chemshift: Param,
}

/// A macromolecular pool with no observable transverse magnetization.
///
/// It shares the longitudinal relaxation rate of the free pool
/// and is saturated, not rotated, by RF pulses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct BoundPool {
    /// Non-directional exchange rate in 1/s.
    pub exchange_rate: Param,
    /// Population fraction.
    pub weight: Param,
}

/// How many pools a tissue has and how they are coupled.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub enum PoolModel {
    SinglePool,
    BlochMcConnell(SecondaryPool),
    MagnetizationTransfer(BoundPool),
    /// Free and secondary pools coupled by `kbm`; secondary and bound pools by `kmt`.
    Combined {
        secondary: SecondaryPool,
        bound: BoundPool,
    },
}

impl PoolModel {
    #[must_use]
    pub fn transverse_pools(&self) -> usize {
        match self {
            Self::SinglePool | Self::MagnetizationTransfer(_) => 1,
            Self::BlochMcConnell(_) | Self::Combined { .. } => 2,
        }
    }

    #[must_use]
    pub fn longitudinal_pools(&self) -> usize {
        match self {
            Self::SinglePool => 1,
            Self::BlochMcConnell(_) | Self::MagnetizationTransfer(_) => 2,
            Self::Combined { .. } => 3,
        }
    }

    #[must_use]
    pub fn secondary(&self) -> Option<&SecondaryPool> {
        match self {
            Self::BlochMcConnell(secondary) | Self::Combined { secondary, .. } => Some(secondary),
            Self::SinglePool | Self::MagnetizationTransfer(_) => None,
        }
    }

    #[must_use]
    pub fn bound(&self) -> Option<&BoundPool> {
        match self {
            Self::MagnetizationTransfer(bound) | Self::Combined { bound, .. } => Some(bound),
            Self::SinglePool | Self::BlochMcConnell(_) => None,
        }
    }
}

/// Validated, broadcast-compatible tissue properties.
///
/// Units: times in ms, frequencies in Hz, `B1` as a fraction of nominal,
/// `B1phase` in degrees, `D` in µm²/ms, `v` in cm/s, exchange rates in 1/s.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct TissueParameters {
    shape: Vec<usize>,
    t1: Param,
    t2: Param,
    m0: Param,
    b1: Param,
    b1_phase: Param,
    b0: Param,
    t2star: Option<Param>,
    diffusion: Option<Param>,
    velocity: Option<Param>,
    chemshift: Param,
    inv_efficiency: Param,
    model: PoolModel,
}

impl TissueParameters {
    /// Starts a builder from the required relaxation times (ms).
    pub fn builder(t1: impl Into<Param>, t2: impl Into<Param>) -> TissueBuilder {
        TissueBuilder {
            t1: t1.into(),
            t2: t2.into(),
            ..TissueBuilder::default()
        }
    }

    /// Returns the common batch shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of lanes in the batch.
    #[must_use]
    pub fn lanes(&self) -> usize {
        lane_count(&self.shape)
    }

    #[must_use]
    pub fn model(&self) -> &PoolModel {
        &self.model
    }

    /// Returns the value of a tissue parameter, if the tissue carries it.
    ///
    /// Sequence timings always return `None`.
    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<&Param> {
        let secondary = self.model.secondary();
        let bound = self.model.bound();
        match parameter {
            Parameter::T1 => Some(&self.t1),
            Parameter::T2 => Some(&self.t2),
            Parameter::M0 => Some(&self.m0),
            Parameter::B1 => Some(&self.b1),
            Parameter::B1Phase => Some(&self.b1_phase),
            Parameter::B0 => Some(&self.b0),
            Parameter::T2Star => self.t2star.as_ref(),
            Parameter::Diffusion => self.diffusion.as_ref(),
            Parameter::Velocity => self.velocity.as_ref(),
            Parameter::ChemShift => Some(&self.chemshift),
            Parameter::InvEfficiency => Some(&self.inv_efficiency),
            Parameter::T1Bm => secondary.map(|pool| &pool.t1),
            Parameter::T2Bm => secondary.map(|pool| &pool.t2),
            Parameter::Kbm => secondary.map(|pool| &pool.exchange_rate),
            Parameter::WeightBm => secondary.map(|pool| &pool.weight),
            Parameter::ChemShiftBm => secondary.map(|pool| &pool.chemshift),
            Parameter::Kmt => bound.map(|pool| &pool.exchange_rate),
            Parameter::WeightMt => bound.map(|pool| &pool.weight),
            Parameter::Tr | Parameter::Te | Parameter::Ti => None,
        }
    }
}

/// Collects tissue properties and selects the [`PoolModel`].
///
/// The secondary pool is enabled by `T1bm`, `T2bm`, `kbm` and `weight_bm`,
/// which must be given together. The bound pool is enabled by `kmt` and
/// `weight_mt`, also together.
#[derive(Debug, Clone, Default)]
pub struct TissueBuilder {
    t1: Param,
    t2: Param,
    m0: Option<Param>,
    b1: Option<Param>,
    b1_phase: Option<Param>,
    b0: Option<Param>,
    t2star: Option<Param>,
    diffusion: Option<Param>,
    velocity: Option<Param>,
    chemshift: Option<Param>,
    inv_efficiency: Option<Param>,
    t1bm: Option<Param>,
    t2bm: Option<Param>,
    kbm: Option<Param>,
    weight_bm: Option<Param>,
    chemshift_bm: Option<Param>,
    kmt: Option<Param>,
    weight_mt: Option<Param>,
}

macro_rules! setters {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[must_use]
            pub fn $name(mut self, value: impl Into<Param>) -> Self {
                self.$name = Some(value.into());
                self
            }
        )*
    };
}

impl TissueBuilder {
    setters! {
        /// Proton density (default 1).
        m0,
        /// Transmit field scale (default 1).
        b1,
        /// Transmit field phase in degrees (default 0).
        b1_phase,
        /// Off-resonance in Hz (default 0).
        b0,
        /// Effective transverse relaxation time in ms.
        t2star,
        /// Apparent diffusion coefficient in µm²/ms.
        diffusion,
        /// Velocity along the gradient in cm/s.
        velocity,
        /// Chemical shift of the main pool in Hz (default 0).
        chemshift,
        /// Adiabatic inversion efficiency in `[0, 1]` (default 1).
        inv_efficiency,
        t1bm,
        t2bm,
        kbm,
        weight_bm,
        /// Chemical shift of the secondary pool in Hz (default 0).
        chemshift_bm,
        kmt,
        weight_mt,
    }

    /// Validates the properties and selects the pool model.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Configuration`] if coupled parameters are
    /// incomplete or out of range, and [`SimulationError::Shape`] if the
    /// shapes cannot be broadcast together.
    pub fn build(self) -> Result<TissueParameters, SimulationError> {
        let secondary = coupled([
            ("T1bm", self.t1bm),
            ("T2bm", self.t2bm),
            ("kbm", self.kbm),
            ("weight_bm", self.weight_bm),
        ])?;
        let bound = coupled([("kmt", self.kmt), ("weight_mt", self.weight_mt)])?;

        let secondary = match (secondary, self.chemshift_bm) {
            (Some([t1, t2, exchange_rate, weight]), chemshift) => Some(SecondaryPool {
                t1,
                t2,
                exchange_rate,
                weight,
                chemshift: chemshift.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(ConfigurationError::MissingCoupled {
                    given: "chemshift_bm",
                    missing: "weight_bm",
                }
                .into());
            }
            (None, None) => None,
        };
        let bound = bound.map(|[exchange_rate, weight]| BoundPool {
            exchange_rate,
            weight,
        });

        let model = match (secondary, bound) {
            (None, None) => PoolModel::SinglePool,
            (Some(secondary), None) => PoolModel::BlochMcConnell(secondary),
            (None, Some(bound)) => PoolModel::MagnetizationTransfer(bound),
            (Some(secondary), Some(bound)) => PoolModel::Combined { secondary, bound },
        };

        let tissue = TissueParameters {
            shape: Vec::new(),
            t1: self.t1,
            t2: self.t2,
            m0: self.m0.unwrap_or(Param::Scalar(1.0)),
            b1: self.b1.unwrap_or(Param::Scalar(1.0)),
            b1_phase: self.b1_phase.unwrap_or_default(),
            b0: self.b0.unwrap_or_default(),
            t2star: self.t2star,
            diffusion: self.diffusion,
            velocity: self.velocity,
            chemshift: self.chemshift.unwrap_or_default(),
            inv_efficiency: self.inv_efficiency.unwrap_or(Param::Scalar(1.0)),
            model,
        };

        let shape = broadcast_shapes(
            Parameter::ALL
                .into_iter()
                .filter_map(|parameter| tissue.get(parameter))
                .map(Param::shape),
        )?;
        validate(&tissue, &shape)?;

        Ok(TissueParameters { shape, ..tissue })
    }
}

/// Returns all values of a coupled group, none, or the first missing name.
fn coupled<const N: usize>(
    group: [(&'static str, Option<Param>); N],
) -> Result<Option<[Param; N]>, ConfigurationError> {
    let given = group
        .iter()
        .find(|(_, value)| value.is_some())
        .map(|(name, _)| *name);
    let Some(given) = given else {
        return Ok(None);
    };
    if let Some((missing, _)) = group.iter().find(|(_, value)| value.is_none()) {
        return Err(ConfigurationError::MissingCoupled {
            given,
            missing: *missing,
        });
    }
    Ok(Some(group.map(|(_, value)| value.unwrap_or_default())))
}

fn validate(tissue: &TissueParameters, shape: &[usize]) -> Result<(), SimulationError> {
    let fraction = |value: f64| (0.0..=1.0).contains(&value);
    let non_negative = |value: f64| value >= 0.0;

    let mut checks: Vec<(&'static str, &Param, fn(f64) -> bool, &'static str)> = vec![
        ("M0", &tissue.m0, f64::is_finite, "must be finite"),
        ("B1", &tissue.b1, f64::is_finite, "must be finite"),
        ("B1phase", &tissue.b1_phase, f64::is_finite, "must be finite"),
        ("B0", &tissue.b0, f64::is_finite, "must be finite"),
        ("chemshift", &tissue.chemshift, f64::is_finite, "must be finite"),
        ("inv_efficiency", &tissue.inv_efficiency, fraction, "must lie in [0, 1]"),
    ];
    if let Some(diffusion) = &tissue.diffusion {
        checks.push(("D", diffusion, non_negative, "must be non-negative"));
    }
    if let Some(velocity) = &tissue.velocity {
        checks.push(("v", velocity, f64::is_finite, "must be finite"));
    }
    if let Some(pool) = tissue.model.secondary() {
        checks.push(("kbm", &pool.exchange_rate, non_negative, "must be non-negative"));
        checks.push(("weight_bm", &pool.weight, fraction, "must lie in [0, 1]"));
        checks.push(("chemshift_bm", &pool.chemshift, f64::is_finite, "must be finite"));
    }
    if let Some(pool) = tissue.model.bound() {
        checks.push(("kmt", &pool.exchange_rate, non_negative, "must be non-negative"));
        checks.push(("weight_mt", &pool.weight, fraction, "must lie in [0, 1]"));
    }

    for (name, param, predicate, reason) in checks {
        if !param.all(predicate) {
            return Err(ConfigurationError::OutOfRange {
                name,
                reason: reason.into(),
            }
            .into());
        }
    }

    if let (Some(secondary), Some(bound)) = (tissue.model.secondary(), tissue.model.bound()) {
        let wbm = secondary.weight.to_lanes(shape)?;
        let wmt = bound.weight.to_lanes(shape)?;
        if wbm.iter().zip(&wmt).any(|(a, b)| a + b > 1.0) {
            return Err(ConfigurationError::OutOfRange {
                name: "weight_bm",
                reason: "weight_bm + weight_mt must not exceed 1".into(),
            }
            .into());
        }
    }

    Ok(())
}
