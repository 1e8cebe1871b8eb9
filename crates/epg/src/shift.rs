use ndarray::{ArrayViewMut1, Axis, Zip};
use num_complex::Complex;
use num_traits::Zero;
use phasegraph_core::{Real, ShapeError};

use crate::{Operator, States};

/// Dephasing by one unit of gradient moment.
///
/// A forward shift moves `F+[k]` to `F+[k+1]` and `F-[k+1]` to `F-[k]`. The
/// new zero order is reflected from its conjugate counterpart,
/// `F+[0] = conj(F-[0])`. The inverse shift mirrors this with
/// `F-[0] = conj(F+[0])`.
///
/// The highest order of the side that grows is discarded, which is the
/// truncation error of a finite phase graph. Every state line that loses a
/// non-zero value is counted in [`States::truncations`]. With a single order
/// a shift spoils all transverse magnetization. `Z` is not affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Forward,
    Inverse,
}

impl<T: Real> Operator<T> for Shift {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        let (fp, fm, _) = states.arrays_mut();
        let mut lost = 0;

        Zip::from(fp.lanes_mut(Axis(1)))
            .and(fm.lanes_mut(Axis(1)))
            .for_each(|plus, minus| {
                let truncated = match self {
                    Self::Forward => raise(plus, minus),
                    Self::Inverse => raise(minus, plus),
                };
                if truncated {
                    lost += 1;
                }
            });

        states.record_truncations(lost);
        Ok(())
    }
}

/// Moves `rising` one order up and `falling` one order down, then reflects
/// the new zero order of `rising` from `falling`.
///
/// Returns `true` if the highest order of `rising` held a non-zero value.
fn raise<T: Real>(
    mut rising: ArrayViewMut1<'_, Complex<T>>,
    mut falling: ArrayViewMut1<'_, Complex<T>>,
) -> bool {
    let n = rising.len();
    let top = rising[n - 1];
    let truncated = top.re.value() != 0.0 || top.im.value() != 0.0;

    for k in (1..n).rev() {
        rising[k] = rising[k - 1];
    }
    for k in 0..n - 1 {
        falling[k] = falling[k + 1];
    }
    falling[n - 1] = Complex::zero();
    rising[0] = falling[0].conj();

    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::StateLayout;

    // --- Test fixtures ---

    /// Consistent states with `F-[0] = conj(F+[0])`.
    fn coherent(nstates: usize) -> States<f64> {
        let layout = StateLayout::new(2, nstates, 1, 1, 1).expect("valid layout");
        let mut states = States::equilibrium(layout);
        let (fp, fm, _) = states.arrays_mut();
        for ((lane, order, _, _), value) in fp.indexed_iter_mut() {
            *value = Complex::new(1.0 + order as f64, 0.5 * lane as f64 - 0.1 * order as f64);
        }
        for ((lane, order, _, _), value) in fm.indexed_iter_mut() {
            *value = Complex::new(-2.0 - order as f64, 0.3 + lane as f64);
        }
        for lane in 0..2 {
            fm[[lane, 0, 0, 0]] = fp[[lane, 0, 0, 0]].conj();
        }
        states
    }

    #[test]
    fn forward_moves_orders() {
        let mut states = coherent(4);
        let before = states.clone();
        Shift::Forward.apply(&mut states).expect("should shift");

        for lane in 0..2 {
            for k in 1..4 {
                assert_eq!(states.fplus()[[lane, k, 0, 0]], before.fplus()[[lane, k - 1, 0, 0]]);
            }
            for k in 0..3 {
                assert_eq!(states.fminus()[[lane, k, 0, 0]], before.fminus()[[lane, k + 1, 0, 0]]);
            }
            assert!(states.fminus()[[lane, 3, 0, 0]].is_zero());
            assert_eq!(states.fplus()[[lane, 0, 0, 0]], states.fminus()[[lane, 0, 0, 0]].conj());
        }
        assert_eq!(states.z(), before.z());
        assert_eq!(states.truncations(), 2);
    }

    #[test]
    fn forward_then_inverse_restores_interior() {
        let mut states = coherent(5);
        let before = states.clone();
        Shift::Forward.apply(&mut states).expect("should shift");
        Shift::Inverse.apply(&mut states).expect("should shift");

        for lane in 0..2 {
            for k in 0..4 {
                assert_eq!(states.fplus()[[lane, k, 0, 0]], before.fplus()[[lane, k, 0, 0]]);
            }
            for k in 0..5 {
                assert_eq!(states.fminus()[[lane, k, 0, 0]], before.fminus()[[lane, k, 0, 0]]);
            }
            // The top F+ order was discarded by the forward shift.
            assert!(states.fplus()[[lane, 4, 0, 0]].is_zero());
        }
    }

    #[test]
    fn inverse_reflects_into_fminus() {
        let mut states = coherent(3);
        let before = states.clone();
        Shift::Inverse.apply(&mut states).expect("should shift");

        for lane in 0..2 {
            assert_eq!(states.fminus()[[lane, 1, 0, 0]], before.fminus()[[lane, 0, 0, 0]]);
            assert_eq!(states.fplus()[[lane, 0, 0, 0]], before.fplus()[[lane, 1, 0, 0]]);
            assert_eq!(states.fminus()[[lane, 0, 0, 0]], states.fplus()[[lane, 0, 0, 0]].conj());
            assert!(states.fplus()[[lane, 2, 0, 0]].is_zero());
        }
    }

    #[test]
    fn single_order_shift_spoils() {
        let mut states = coherent(1);
        Shift::Forward.apply(&mut states).expect("should shift");
        assert!(states.fplus().iter().all(Complex::is_zero));
        assert!(states.fminus().iter().all(Complex::is_zero));
    }

    #[test]
    fn empty_top_order_is_not_counted() {
        let layout = StateLayout::new(3, 6, 2, 1, 1).expect("valid layout");
        let mut states = States::<f64>::equilibrium(layout);
        Shift::Forward.apply(&mut states).expect("should shift");
        assert_eq!(states.truncations(), 0);
    }
}
