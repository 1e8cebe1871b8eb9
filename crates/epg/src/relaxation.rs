use ndarray::{Array1, Array2, Array3, Axis, Zip};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError, cexp};

use crate::expm::{expm, expm2};
use crate::{Operator, States};

/// Relaxation and exchange rates of every pool in every lane.
///
/// Rates are in 1/s and frequencies in Hz. Pool `p` of the transverse arrays
/// is pool `p` of the longitudinal arrays. Exchange rates are
/// non-directional: the rate from pool `a` to pool `b` is
/// `exchange[a, b] · weights[b]`, which keeps detailed balance.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRates<T: Real> {
    r1: Array2<T>,
    r2: Array2<T>,
    weights: Array2<T>,
    exchange: Array3<T>,
    frequency: Array2<T>,
}

impl<T: Real> PoolRates<T> {
    /// Rates for a single pool without exchange.
    #[must_use]
    pub fn single(r1: Array1<T>, r2: Array1<T>) -> Self {
        let lanes = r1.len();
        Self {
            r1: r1.insert_axis(Axis(1)),
            r2: r2.insert_axis(Axis(1)),
            weights: Array2::from_elem((lanes, 1), T::one()),
            exchange: Array3::from_elem((lanes, 1, 1), T::zero()),
            frequency: Array2::from_elem((lanes, 1), T::zero()),
        }
    }

    /// Rates for coupled pools.
    ///
    /// Shapes are `r1`, `weights`: `(lanes, longitudinal)`; `r2`, `frequency`:
    /// `(lanes, transverse)`; `exchange`: `(lanes, longitudinal, longitudinal)`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] if the shapes disagree.
    pub fn coupled(
        r1: Array2<T>,
        r2: Array2<T>,
        weights: Array2<T>,
        exchange: Array3<T>,
        frequency: Array2<T>,
    ) -> Result<Self, ShapeError> {
        let (lanes, longitudinal) = r1.dim();
        let transverse = r2.ncols();

        let checks: [(&'static str, Vec<usize>, &[usize]); 4] = [
            ("pool weights", vec![lanes, longitudinal], weights.shape()),
            ("transverse rates", vec![lanes, transverse], r2.shape()),
            (
                "exchange rates",
                vec![lanes, longitudinal, longitudinal],
                exchange.shape(),
            ),
            ("pool frequencies", vec![lanes, transverse], frequency.shape()),
        ];
        for (what, expected, found) in checks {
            if expected != found {
                return Err(ShapeError::Mismatch {
                    what,
                    expected,
                    found: found.to_vec(),
                });
            }
        }

        Ok(Self {
            r1,
            r2,
            weights,
            exchange,
            frequency,
        })
    }

    #[must_use]
    pub fn lanes(&self) -> usize {
        self.r1.nrows()
    }

    #[must_use]
    pub fn longitudinal_pools(&self) -> usize {
        self.r1.ncols()
    }

    #[must_use]
    pub fn transverse_pools(&self) -> usize {
        self.r2.ncols()
    }

    /// Longitudinal generator of one lane in per-pool normalized units.
    fn longitudinal_generator(&self, lane: usize) -> Array2<T> {
        let n = self.longitudinal_pools();
        let mut g = Array2::from_elem((n, n), T::zero());
        for a in 0..n {
            let mut outflow = T::zero();
            for b in (0..n).filter(|&b| b != a) {
                let rate = self.exchange[[lane, a, b]] * self.weights[[lane, b]];
                g[[a, b]] = rate;
                outflow += rate;
            }
            g[[a, a]] = -self.r1[[lane, a]] - outflow;
        }
        g
    }

    /// Transverse generator of one lane.
    ///
    /// Transverse magnetization only exchanges between pools that carry it.
    fn transverse_generator(&self, lane: usize) -> Array2<Complex<T>> {
        let n = self.transverse_pools();
        let two_pi = T::from_f64(std::f64::consts::TAU);
        let mut h = Array2::from_elem((n, n), Complex::new(T::zero(), T::zero()));
        for a in 0..n {
            let mut outflow = T::zero();
            for b in (0..n).filter(|&b| b != a) {
                let rate = self.exchange[[lane, a, b]] * self.weights[[lane, b]];
                h[[a, b]] = Complex::new(rate, T::zero());
                outflow += rate;
            }
            h[[a, a]] = Complex::new(
                -self.r2[[lane, a]] - outflow,
                -(two_pi * self.frequency[[lane, a]]),
            );
        }
        h
    }
}

/// Returns `(E1, 1 - E1)` for a rate `r1` over `dt`.
pub fn longitudinal_decay<T: Real>(r1: T, dt: T) -> (T, T) {
    let e1 = (-(r1 * dt)).exp();
    (e1, T::one() - e1)
}

/// Free relaxation, and exchange between pools, over a fixed interval.
///
/// Longitudinal recovery feeds only the zero order, since thermal
/// equilibrium has no dephasing.
#[derive(Debug, Clone, PartialEq)]
pub enum Relaxation<T: Real> {
    /// One pool: scalar decay per lane.
    Independent {
        e1: Array1<T>,
        e2: Array1<Complex<T>>,
    },

    /// Several longitudinal pools coupled by exchange.
    Exchange {
        e1: Array3<T>,
        recovery: Array2<T>,
        e2: Array3<Complex<T>>,
    },
}

impl<T: Real> Relaxation<T> {
    /// Precomputes the decay over `dt` seconds.
    pub fn new(rates: &PoolRates<T>, dt: T) -> Self {
        let lanes = rates.lanes();

        if rates.longitudinal_pools() == 1 {
            let e1 = Array1::from_shape_fn(lanes, |lane| {
                longitudinal_decay(rates.r1[[lane, 0]], dt).0
            });
            let e2 = Array1::from_shape_fn(lanes, |lane| {
                cexp(rates.transverse_generator(lane)[[0, 0]] * dt)
            });
            return Self::Independent { e1, e2 };
        }

        let nl = rates.longitudinal_pools();
        let nt = rates.transverse_pools();
        let mut e1 = Array3::from_elem((lanes, nl, nl), T::zero());
        let mut recovery = Array2::from_elem((lanes, nl), T::zero());
        let mut e2 = Array3::from_elem((lanes, nt, nt), Complex::new(T::zero(), T::zero()));

        for lane in 0..lanes {
            let g = rates.longitudinal_generator(lane);
            let decay = longitudinal_exponential(&g, dt);
            for a in 0..nl {
                let mut row_sum = T::zero();
                for b in 0..nl {
                    e1[[lane, a, b]] = decay[[a, b]];
                    row_sum += decay[[a, b]];
                }
                // Every pool is normalized to 1 at equilibrium.
                recovery[[lane, a]] = T::one() - row_sum;
            }

            let h = rates.transverse_generator(lane).mapv(|z| z * dt);
            let propagator = if nt == 1 {
                Array2::from_elem((1, 1), cexp(h[[0, 0]]))
            } else {
                expm(&h)
            };
            e2.index_axis_mut(Axis(0), lane).assign(&propagator);
        }

        Self::Exchange { e1, recovery, e2 }
    }

    fn lanes(&self) -> usize {
        match self {
            Self::Independent { e1, .. } => e1.len(),
            Self::Exchange { e1, .. } => e1.len_of(Axis(0)),
        }
    }
}

fn longitudinal_exponential<T: Real>(g: &Array2<T>, dt: T) -> Array2<T> {
    if g.nrows() == 2 {
        let e = expm2([[g[[0, 0]], g[[0, 1]]], [g[[1, 0]], g[[1, 1]]]], dt);
        Array2::from_shape_fn((2, 2), |(a, b)| e[a][b])
    } else {
        expm(&g.mapv(|v| Complex::new(v * dt, T::zero()))).mapv(|z| z.re)
    }
}

impl<T: Real> Operator<T> for Relaxation<T> {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        let layout = states.layout();
        layout.check_lanes("relaxation", self.lanes())?;
        let (fp, fm, z) = states.arrays_mut();

        match self {
            Self::Independent { e1, e2 } => {
                if layout.longitudinal_pools() != 1 {
                    return Err(ShapeError::Mismatch {
                        what: "relaxation pools",
                        expected: vec![1],
                        found: vec![layout.longitudinal_pools()],
                    });
                }
                Zip::indexed(fp).and(fm).for_each(|(lane, _, _, _), fp, fm| {
                    *fp = *fp * e2[lane];
                    *fm = *fm * e2[lane].conj();
                });
                Zip::indexed(z).for_each(|(lane, order, _, _), z| {
                    *z = *z * e1[lane];
                    if order == 0 {
                        z.re += T::one() - e1[lane];
                    }
                });
            }

            Self::Exchange { e1, recovery, e2 } => {
                let nl = e1.len_of(Axis(1));
                let nt = e2.len_of(Axis(1));
                if layout.longitudinal_pools() != nl || layout.transverse_pools() != nt {
                    return Err(ShapeError::Mismatch {
                        what: "relaxation pools",
                        expected: vec![nt, nl],
                        found: vec![layout.transverse_pools(), layout.longitudinal_pools()],
                    });
                }

                Zip::indexed(z.lanes_mut(Axis(3))).for_each(|(lane, order, _), mut pools| {
                    let old = pools.to_vec();
                    for (a, slot) in pools.iter_mut().enumerate() {
                        let mut acc = Complex::new(T::zero(), T::zero());
                        for (b, value) in old.iter().enumerate() {
                            acc += *value * e1[[lane, a, b]];
                        }
                        if order == 0 {
                            acc.re += recovery[[lane, a]];
                        }
                        *slot = acc;
                    }
                });

                Zip::indexed(fp.lanes_mut(Axis(3)))
                    .and(fm.lanes_mut(Axis(3)))
                    .for_each(|(lane, _, _), mut plus, mut minus| {
                        let (old_plus, old_minus) = (plus.to_vec(), minus.to_vec());
                        for a in 0..nt {
                            let mut acc_plus = Complex::new(T::zero(), T::zero());
                            let mut acc_minus = Complex::new(T::zero(), T::zero());
                            for b in 0..nt {
                                let k = e2[[lane, a, b]];
                                acc_plus += old_plus[b] * k;
                                acc_minus += old_minus[b] * k.conj();
                            }
                            plus[a] = acc_plus;
                            minus[a] = acc_minus;
                        }
                    });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::StateLayout;

    // --- Test fixtures ---

    fn populated(layout: StateLayout) -> States<f64> {
        let mut states = States::equilibrium(layout);
        let (fp, fm, z) = states.arrays_mut();
        for ((lane, order, _, pool), value) in fp.indexed_iter_mut() {
            *value = Complex::new(0.3 + 0.1 * order as f64, -0.2 * (lane + pool) as f64);
        }
        for ((_, order, _, pool), value) in fm.indexed_iter_mut() {
            *value = Complex::new(0.1 * pool as f64, 0.4 - 0.05 * order as f64);
        }
        for ((_, order, _, pool), value) in z.indexed_iter_mut() {
            *value = Complex::new(0.5 - 0.1 * order as f64, 0.02 * pool as f64);
        }
        states
    }

    fn two_pools(k: f64, w: f64, lanes: usize) -> PoolRates<f64> {
        let r1 = Array2::from_shape_fn((lanes, 2), |(_, p)| [1.0, 2.5][p]);
        let r2 = Array2::from_shape_fn((lanes, 2), |(_, p)| [10.0, 40.0][p]);
        let weights = Array2::from_shape_fn((lanes, 2), |(_, p)| [1.0 - w, w][p]);
        let exchange =
            Array3::from_shape_fn((lanes, 2, 2), |(_, a, b)| if a == b { 0.0 } else { k });
        let frequency = Array2::zeros((lanes, 2));
        PoolRates::coupled(r1, r2, weights, exchange, frequency).expect("valid rates")
    }

    /// Free, secondary and bound pools coupled in a chain.
    fn three_pools(kbm: f64, kmt: f64) -> PoolRates<f64> {
        let r1 = Array2::from_shape_fn((1, 3), |(_, p)| [1.0, 2.5, 1.0][p]);
        let r2 = Array2::from_shape_fn((1, 2), |(_, p)| [10.0, 40.0][p]);
        let weights = Array2::from_shape_fn((1, 3), |(_, p)| [0.6, 0.3, 0.1][p]);
        let mut exchange = Array3::zeros((1, 3, 3));
        for (a, b, k) in [(0, 1, kbm), (1, 2, kmt)] {
            exchange[[0, a, b]] = k;
            exchange[[0, b, a]] = k;
        }
        PoolRates::coupled(r1, r2, weights, exchange, Array2::zeros((1, 2))).expect("valid rates")
    }

    #[test]
    fn decay_bounds() {
        for r1 in [0.0, 0.5, 1.0, 30.0] {
            for dt in [0.0, 1e-3, 0.1, 10.0] {
                let (e1, re1) = longitudinal_decay(r1, dt);
                assert!((0.0..=1.0).contains(&e1));
                assert_eq!(re1, 1.0 - e1);
            }
        }
        assert_eq!(longitudinal_decay(1.0, 0.0).0, 1.0);
        assert_relative_eq!(longitudinal_decay(1.0, 1e6).0, 0.0);
    }

    #[test]
    fn single_pool_relaxation() {
        let layout = StateLayout::new(1, 3, 1, 1, 1).expect("valid layout");
        let mut states = populated(layout);
        let before = states.clone();

        let rates = PoolRates::single(Array1::from(vec![1.0]), Array1::from(vec![10.0]));
        Relaxation::new(&rates, 0.01)
            .apply(&mut states)
            .expect("should apply");

        let e1 = (-0.01_f64).exp();
        let e2 = (-0.1_f64).exp();
        for order in 0..3 {
            let recovery = if order == 0 { 1.0 - e1 } else { 0.0 };
            assert_relative_eq!(
                states.z()[[0, order, 0, 0]].re,
                before.z()[[0, order, 0, 0]].re * e1 + recovery
            );
            assert_relative_eq!(
                states.fplus()[[0, order, 0, 0]].im,
                before.fplus()[[0, order, 0, 0]].im * e2
            );
            assert_relative_eq!(
                states.fminus()[[0, order, 0, 0]].re,
                before.fminus()[[0, order, 0, 0]].re * e2
            );
        }
    }

    #[test]
    fn zero_exchange_matches_independent_pools() {
        let layout = StateLayout::new(2, 4, 1, 2, 2).expect("valid layout");
        let mut coupled = populated(layout);
        let before = coupled.clone();
        Relaxation::new(&two_pools(0.0, 0.3, 2), 0.02)
            .apply(&mut coupled)
            .expect("should apply");

        for (pool, (r1, r2)) in [(1.0, 10.0), (2.5, 40.0)].into_iter().enumerate() {
            let (e1, re1) = longitudinal_decay(r1, 0.02);
            let e2 = (-r2 * 0.02_f64).exp();
            for ((lane, order, loc, p), value) in coupled.z().indexed_iter() {
                if p != pool {
                    continue;
                }
                let recovery = if order == 0 { re1 } else { 0.0 };
                let expected = before.z()[[lane, order, loc, p]] * e1
                    + Complex::new(recovery, 0.0);
                assert_relative_eq!(value.re, expected.re, epsilon = 1e-12);
                assert_relative_eq!(value.im, expected.im, epsilon = 1e-12);
            }
            for ((lane, order, loc, p), value) in coupled.fplus().indexed_iter() {
                if p != pool {
                    continue;
                }
                let expected = before.fplus()[[lane, order, loc, p]] * e2;
                assert_relative_eq!(value.re, expected.re, epsilon = 1e-12);
                assert_relative_eq!(value.im, expected.im, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn three_uncoupled_pools_relax_independently() {
        let layout = StateLayout::new(1, 3, 1, 2, 3).expect("valid layout");
        let mut coupled = populated(layout);
        let before = coupled.clone();
        Relaxation::new(&three_pools(0.0, 0.0), 0.05)
            .apply(&mut coupled)
            .expect("should apply");

        for (pool, r1) in [1.0, 2.5, 1.0].into_iter().enumerate() {
            let (e1, re1) = longitudinal_decay(r1, 0.05);
            for order in 0..3 {
                let recovery = if order == 0 { re1 } else { 0.0 };
                let expected = before.z()[[0, order, 0, pool]] * e1 + Complex::new(recovery, 0.0);
                let value = coupled.z()[[0, order, 0, pool]];
                assert_relative_eq!(value.re, expected.re, epsilon = 1e-12);
                assert_relative_eq!(value.im, expected.im, epsilon = 1e-12);
            }
        }
        for (pool, r2) in [10.0, 40.0].into_iter().enumerate() {
            let e2 = (-r2 * 0.05_f64).exp();
            for order in 0..3 {
                let expected = before.fplus()[[0, order, 0, pool]] * e2;
                let value = coupled.fplus()[[0, order, 0, pool]];
                assert_relative_eq!(value.re, expected.re, epsilon = 1e-12);
                assert_relative_eq!(value.im, expected.im, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn three_pool_chain_preserves_equilibrium() {
        let layout = StateLayout::new(1, 2, 1, 2, 3).expect("valid layout");
        let mut states = States::equilibrium(layout);
        states.arrays_mut().2[[0, 0, 0, 2]] = Complex::new(0.0, 0.0);
        Relaxation::new(&three_pools(15.0, 30.0), 0.2)
            .apply(&mut states)
            .expect("should apply");

        // The saturated bound pool drains the free pool through the secondary one.
        assert!(states.z()[[0, 0, 0, 0]].re < 1.0);
        assert!(states.z()[[0, 0, 0, 2]].re > 0.0);

        let mut equilibrium = States::equilibrium(layout);
        Relaxation::new(&three_pools(15.0, 30.0), 0.2)
            .apply(&mut equilibrium)
            .expect("should apply");
        for pool in 0..3 {
            assert_relative_eq!(equilibrium.z()[[0, 0, 0, pool]].re, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn exchange_preserves_equilibrium() {
        let layout = StateLayout::new(1, 2, 1, 2, 2).expect("valid layout");
        let mut states = States::equilibrium(layout);
        Relaxation::new(&two_pools(20.0, 0.2, 1), 0.5)
            .apply(&mut states)
            .expect("should apply");

        for pool in 0..2 {
            assert_relative_eq!(states.z()[[0, 0, 0, pool]].re, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn exchange_mixes_pools() {
        let layout = StateLayout::new(1, 1, 1, 2, 2).expect("valid layout");
        let mut states = States::equilibrium(layout);
        states.arrays_mut().2[[0, 0, 0, 0]] = Complex::new(-1.0, 0.0);

        Relaxation::new(&two_pools(50.0, 0.5, 1), 0.01)
            .apply(&mut states)
            .expect("should apply");

        // The inverted free pool pulls the secondary pool below equilibrium.
        assert!(states.z()[[0, 0, 0, 1]].re < 1.0);
    }

    #[test]
    fn bound_pool_has_no_transverse_exchange() {
        let lanes = 1;
        let r1 = Array2::from_elem((lanes, 2), 1.0);
        let r2 = Array2::from_elem((lanes, 1), 12.0);
        let weights = Array2::from_shape_fn((lanes, 2), |(_, p)| [0.8, 0.2][p]);
        let exchange =
            Array3::from_shape_fn((lanes, 2, 2), |(_, a, b)| if a == b { 0.0 } else { 40.0 });
        let rates =
            PoolRates::coupled(r1, r2, weights, exchange, Array2::zeros((lanes, 1)))
                .expect("valid rates");

        let layout = StateLayout::new(1, 2, 1, 1, 2).expect("valid layout");
        let mut states = populated(layout);
        let before = states.clone();
        Relaxation::new(&rates, 0.01)
            .apply(&mut states)
            .expect("should apply");

        let e2 = (-0.12_f64).exp();
        assert_relative_eq!(
            states.fplus()[[0, 1, 0, 0]].re,
            before.fplus()[[0, 1, 0, 0]].re * e2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn wrong_pool_count_is_rejected() {
        let layout = StateLayout::new(1, 2, 1, 2, 2).expect("valid layout");
        let mut states = States::<f64>::equilibrium(layout);
        let rates = PoolRates::single(Array1::from(vec![1.0]), Array1::from(vec![10.0]));
        assert!(Relaxation::new(&rates, 0.01).apply(&mut states).is_err());
    }
}
