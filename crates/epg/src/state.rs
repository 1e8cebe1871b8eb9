use ndarray::{Array4, ArrayView4, s};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError, lane_count};

/// Dimensions of a phase graph state.
///
/// Arrays are indexed `[lane, order, location, pool]`. Transverse arrays hold
/// `transverse_pools`; the longitudinal array holds `longitudinal_pools`, which
/// is larger when a bound pool without transverse magnetization is modelled.
/// Pools shared by both arrays come first, in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLayout {
    lanes: usize,
    nstates: usize,
    nlocs: usize,
    transverse_pools: usize,
    longitudinal_pools: usize,
}

impl StateLayout {
    /// Creates a validated layout.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Layout`] if any dimension is zero or there are
    /// fewer longitudinal than transverse pools.
    pub fn new(
        lanes: usize,
        nstates: usize,
        nlocs: usize,
        transverse_pools: usize,
        longitudinal_pools: usize,
    ) -> Result<Self, ShapeError> {
        if lanes == 0 || nstates == 0 || nlocs == 0 || transverse_pools == 0 {
            return Err(ShapeError::Layout(format!(
                "dimensions must be non-zero: lanes={lanes}, nstates={nstates}, \
                 nlocs={nlocs}, transverse_pools={transverse_pools}"
            )));
        }
        if longitudinal_pools < transverse_pools {
            return Err(ShapeError::Layout(format!(
                "{longitudinal_pools} longitudinal pools cannot hold {transverse_pools} transverse pools"
            )));
        }

        Ok(Self {
            lanes,
            nstates,
            nlocs,
            transverse_pools,
            longitudinal_pools,
        })
    }

    /// Creates a layout with one lane per element of `batch_shape`.
    ///
    /// # Errors
    ///
    /// See [`StateLayout::new`].
    pub fn for_batch(
        batch_shape: &[usize],
        nstates: usize,
        nlocs: usize,
        transverse_pools: usize,
        longitudinal_pools: usize,
    ) -> Result<Self, ShapeError> {
        Self::new(
            lane_count(batch_shape),
            nstates,
            nlocs,
            transverse_pools,
            longitudinal_pools,
        )
    }

    #[must_use]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    #[must_use]
    pub fn nstates(&self) -> usize {
        self.nstates
    }

    #[must_use]
    pub fn nlocs(&self) -> usize {
        self.nlocs
    }

    #[must_use]
    pub fn transverse_pools(&self) -> usize {
        self.transverse_pools
    }

    #[must_use]
    pub fn longitudinal_pools(&self) -> usize {
        self.longitudinal_pools
    }

    /// Returns `true` if the last longitudinal pool has no transverse partner.
    #[must_use]
    pub fn has_bound_pool(&self) -> bool {
        self.longitudinal_pools > self.transverse_pools
    }

    fn transverse_shape(&self) -> (usize, usize, usize, usize) {
        (self.lanes, self.nstates, self.nlocs, self.transverse_pools)
    }

    fn longitudinal_shape(&self) -> (usize, usize, usize, usize) {
        (self.lanes, self.nstates, self.nlocs, self.longitudinal_pools)
    }

    /// Fails unless `length` matches the number of lanes.
    pub(crate) fn check_lanes(&self, what: &'static str, length: usize) -> Result<(), ShapeError> {
        if length == self.lanes {
            Ok(())
        } else {
            Err(ShapeError::Mismatch {
                what,
                expected: vec![self.lanes],
                found: vec![length],
            })
        }
    }
}

/// The `F+`, `F-` and `Z` configuration states of every lane.
///
/// Only non-negative dephasing orders are stored: `F-[k]` holds the
/// conjugate-symmetric counterpart of order `-k`, so `F-[0] = conj(F+[0])`.
/// Orders at or beyond `nstates` are discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct States<T: Real> {
    layout: StateLayout,
    fplus: Array4<Complex<T>>,
    fminus: Array4<Complex<T>>,
    z: Array4<Complex<T>>,
    truncations: usize,
}

impl<T: Real> States<T> {
    /// Creates states at thermal equilibrium: `Z[0] = 1`, everything else 0.
    #[must_use]
    pub fn equilibrium(layout: StateLayout) -> Self {
        let zero = Complex::new(T::zero(), T::zero());
        let mut z = Array4::from_elem(layout.longitudinal_shape(), zero);
        z.slice_mut(s![.., 0, .., ..])
            .fill(Complex::new(T::one(), T::zero()));

        Self {
            layout,
            fplus: Array4::from_elem(layout.transverse_shape(), zero),
            fminus: Array4::from_elem(layout.transverse_shape(), zero),
            z,
            truncations: 0,
        }
    }

    #[must_use]
    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    #[must_use]
    pub fn fplus(&self) -> ArrayView4<'_, Complex<T>> {
        self.fplus.view()
    }

    #[must_use]
    pub fn fminus(&self) -> ArrayView4<'_, Complex<T>> {
        self.fminus.view()
    }

    #[must_use]
    pub fn z(&self) -> ArrayView4<'_, Complex<T>> {
        self.z.view()
    }

    /// Mutable access to `(F+, F-, Z)`.
    pub fn arrays_mut(
        &mut self,
    ) -> (
        &mut Array4<Complex<T>>,
        &mut Array4<Complex<T>>,
        &mut Array4<Complex<T>>,
    ) {
        (&mut self.fplus, &mut self.fminus, &mut self.z)
    }

    /// Number of state lines whose highest order was discarded while non-zero.
    #[must_use]
    pub fn truncations(&self) -> usize {
        self.truncations
    }

    pub(crate) fn record_truncations(&mut self, count: usize) {
        self.truncations += count;
    }
}
