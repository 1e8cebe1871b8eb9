use std::collections::HashMap;
use std::ops::Range;

use ndarray::{Array1, Array2, Array3, Zip, s};
use phasegraph_core::{Real, ShapeError, safe_rate};
use phasegraph_epg::{Observation, PoolRates, StateLayout, Transmit, reversible_rate};

use crate::sequence::Plan;
use crate::{Parameter, PoolModel, TissueParameters};

/// Every tissue parameter broadcast to one value per lane.
#[derive(Debug, Clone)]
pub(crate) struct Batch {
    values: HashMap<Parameter, Array1<f64>>,
}

impl Batch {
    pub fn new(tissue: &TissueParameters) -> Result<Self, ShapeError> {
        let mut values = HashMap::new();
        for parameter in Parameter::ALL {
            if let Some(param) = tissue.get(parameter) {
                values.insert(parameter, param.to_lanes(tissue.shape())?);
            }
        }
        Ok(Self { values })
    }
}

/// Sequence timings in seconds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timing<T: Real> {
    pub tr: T,
    pub te: T,
    pub ti: Option<T>,
    pub block: Option<T>,
}

/// Everything the engine needs to simulate one chunk of lanes.
///
/// Values are lifted into `T` once, with a unit tangent on the seeded
/// parameter and zero elsewhere.
#[derive(Debug, Clone)]
pub(crate) struct Context<T: Real> {
    pub layout: StateLayout,
    pub rates: PoolRates<T>,
    pub observation: Observation<T>,
    pub transmit: Transmit<T>,
    pub efficiency: Array1<T>,
    /// Off-resonance common to all transverse pools, Hz.
    pub offresonance: Array1<T>,
    /// Reversible decay rate, 1/s.
    pub r2prime: Array1<T>,
    /// m²/s.
    pub diffusion: Option<Array1<T>>,
    /// m/s.
    pub velocity: Option<Array1<T>>,
    pub timing: Timing<T>,
}

impl<T: Real> Context<T> {
    pub fn new(
        model: &PoolModel,
        batch: &Batch,
        plan: &Plan,
        nstates: usize,
        range: Range<usize>,
        seed: Option<Parameter>,
    ) -> Result<Self, ShapeError> {
        let lanes = range.len();
        let tangent = |parameter: Parameter| {
            if seed == Some(parameter) { 1.0 } else { 0.0 }
        };
        let given = |parameter: Parameter| {
            batch.values.get(&parameter).map(|values| {
                values
                    .slice(s![range.clone()])
                    .mapv(|value| T::with_tangent(value, tangent(parameter)))
            })
        };
        let value = |parameter: Parameter| {
            given(parameter).unwrap_or_else(|| Array1::from_elem(lanes, T::zero()))
        };
        let timing = |parameter: Parameter, ms: f64| {
            T::with_tangent(ms, tangent(parameter)) * T::from_f64(1e-3)
        };

        let layout = StateLayout::new(
            lanes,
            nstates,
            plan.profile.len(),
            model.transverse_pools(),
            model.longitudinal_pools(),
        )?;

        let r1 = value(Parameter::T1).mapv(safe_rate);
        let r2 = value(Parameter::T2).mapv(safe_rate);
        let one = Array1::from_elem(lanes, T::one());
        let zero = Array1::from_elem(lanes, T::zero());

        let (rates, weights) = match model {
            PoolModel::SinglePool => (PoolRates::single(r1, r2), columns(&[&one])),
            PoolModel::BlochMcConnell(_) => {
                let w = value(Parameter::WeightBm);
                let free = &one - &w;
                let rates = PoolRates::coupled(
                    columns(&[&r1, &value(Parameter::T1Bm).mapv(safe_rate)]),
                    columns(&[&r2, &value(Parameter::T2Bm).mapv(safe_rate)]),
                    columns(&[&free, &w]),
                    exchange(lanes, 2, &[(0, 1, &value(Parameter::Kbm))]),
                    columns(&[&value(Parameter::ChemShift), &value(Parameter::ChemShiftBm)]),
                )?;
                (rates, columns(&[&free, &w]))
            }
            PoolModel::MagnetizationTransfer(_) => {
                let w = value(Parameter::WeightMt);
                let free = &one - &w;
                let rates = PoolRates::coupled(
                    columns(&[&r1, &r1]),
                    columns(&[&r2]),
                    columns(&[&free, &w]),
                    exchange(lanes, 2, &[(0, 1, &value(Parameter::Kmt))]),
                    columns(&[&zero]),
                )?;
                (rates, columns(&[&free]))
            }
            PoolModel::Combined { .. } => {
                let wbm = value(Parameter::WeightBm);
                let wmt = value(Parameter::WeightMt);
                let free = &one - &wbm - &wmt;
                let rates = PoolRates::coupled(
                    columns(&[&r1, &value(Parameter::T1Bm).mapv(safe_rate), &r1]),
                    columns(&[&r2, &value(Parameter::T2Bm).mapv(safe_rate)]),
                    columns(&[&free, &wbm, &wmt]),
                    exchange(
                        lanes,
                        3,
                        &[(0, 1, &value(Parameter::Kbm)), (1, 2, &value(Parameter::Kmt))],
                    ),
                    columns(&[&value(Parameter::ChemShift), &value(Parameter::ChemShiftBm)]),
                )?;
                (rates, columns(&[&free, &wbm]))
            }
        };
        let observation = Observation::new(weights, value(Parameter::M0))?;

        let mut transmit = Transmit::new(value(Parameter::B1), Array1::from(plan.profile.clone()));
        let b1_phase = value(Parameter::B1Phase);
        if seed == Some(Parameter::B1Phase) || b1_phase.iter().any(|phase| phase.value() != 0.0) {
            let radians = T::from_f64(std::f64::consts::PI / 180.0);
            transmit = transmit.with_phase(b1_phase.mapv(|phase| phase * radians));
        }

        // Multi-pool models carry chemical shifts in the transverse generator.
        let mut offresonance = value(Parameter::B0);
        if model.transverse_pools() == 1 {
            offresonance = offresonance + value(Parameter::ChemShift);
        }

        let r2prime = match given(Parameter::T2Star) {
            Some(t2star) => Zip::from(&t2star)
                .and(&value(Parameter::T2))
                .map_collect(|&t2star, &t2| reversible_rate(t2star, t2)),
            None => zero,
        };

        Ok(Self {
            layout,
            rates,
            observation,
            transmit,
            efficiency: value(Parameter::InvEfficiency),
            offresonance,
            r2prime,
            diffusion: given(Parameter::Diffusion).map(|d| d.mapv(|d| d * T::from_f64(1e-9))),
            velocity: given(Parameter::Velocity).map(|v| v.mapv(|v| v * T::from_f64(1e-2))),
            timing: Timing {
                tr: timing(Parameter::Tr, plan.tr),
                te: timing(Parameter::Te, plan.te),
                ti: plan.ti.map(|ti| timing(Parameter::Ti, ti)),
                block: plan.block.map(|block| T::from_f64(block * 1e-3)),
            },
        })
    }
}

/// Stacks per-lane vectors as the columns of a `(lanes, pools)` array.
fn columns<T: Real>(pools: &[&Array1<T>]) -> Array2<T> {
    let lanes = pools.first().map_or(0, |pool| pool.len());
    Array2::from_shape_fn((lanes, pools.len()), |(lane, pool)| pools[pool][lane])
}

/// Builds a symmetric exchange array from the coupled pool pairs.
fn exchange<T: Real>(lanes: usize, pools: usize, pairs: &[(usize, usize, &Array1<T>)]) -> Array3<T> {
    let mut k = Array3::from_elem((lanes, pools, pools), T::zero());
    for &(a, b, rate) in pairs {
        for lane in 0..lanes {
            k[[lane, a, b]] = rate[lane];
            k[[lane, b, a]] = rate[lane];
        }
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use phasegraph_core::Dual;
    use uom::si::angle::degree;
    use uom::si::f64::{Angle, Time};
    use uom::si::time::millisecond;

    use crate::{SpgrConfig, Train};

    // --- Test fixtures ---

    fn plan() -> Plan {
        let train = Train::constant(Angle::new::<degree>(10.0), 3, Time::new::<millisecond>(10.0))
            .expect("valid train")
            .with_te(Time::new::<millisecond>(2.0))
            .expect("valid TE");
        SpgrConfig::new(train).plan()
    }

    #[test]
    fn chunk_selects_lanes() {
        let tissue = TissueParameters::builder(vec![500.0, 1000.0, 1500.0, 2000.0], 80.0)
            .b0(vec![0.0, 10.0, 20.0, 30.0])
            .chemshift(5.0)
            .build()
            .expect("valid tissue");
        let batch = Batch::new(&tissue).expect("broadcasts");

        let context =
            Context::<f64>::new(tissue.model(), &batch, &plan(), 5, 1..3, None).expect("valid");
        assert_eq!(context.layout.lanes(), 2);
        assert_eq!(context.offresonance.to_vec(), vec![15.0, 25.0]);
        assert_relative_eq!(context.timing.tr, 0.01, max_relative = 1e-12);
        assert_relative_eq!(context.timing.te, 0.002, max_relative = 1e-12);
        assert!(context.r2prime.iter().all(|&r| r == 0.0));
        assert!(context.diffusion.is_none());
    }

    #[test]
    fn seed_marks_one_parameter() {
        let tissue = TissueParameters::builder(1000.0, 100.0)
            .t2star(50.0)
            .build()
            .expect("valid tissue");
        let batch = Batch::new(&tissue).expect("broadcasts");

        let context = Context::<Dual>::new(
            tissue.model(),
            &batch,
            &plan(),
            5,
            0..1,
            Some(Parameter::T2Star),
        )
        .expect("valid");

        // R2' = 1000/T2* - 1000/T2, dR2'/dT2* = -1000/T2*².
        assert_relative_eq!(context.r2prime[0].re, 10.0, max_relative = 1e-12);
        assert_relative_eq!(context.r2prime[0].eps, -0.4, max_relative = 1e-12);
        assert_eq!(context.timing.tr.eps, 0.0);
        assert_eq!(context.efficiency[0].eps, 0.0);
    }

    #[test]
    fn bound_pool_layout() {
        let tissue = TissueParameters::builder(1000.0, 100.0)
            .kmt(20.0)
            .weight_mt(0.1)
            .build()
            .expect("valid tissue");
        let batch = Batch::new(&tissue).expect("broadcasts");
        let context =
            Context::<f64>::new(tissue.model(), &batch, &plan(), 5, 0..1, None).expect("valid");

        assert!(context.layout.has_bound_pool());
        assert_eq!(context.rates.longitudinal_pools(), 2);
        assert_eq!(context.rates.transverse_pools(), 1);
    }
}
