use ndarray::{Array1, Array2, Axis, Zip, s};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError, cis};

use crate::{Operator, States};

/// Gyromagnetic ratio of hydrogen in rad/(s·µT).
pub const GAMMA: f64 = 267.522_19;

/// Default absorption lineshape of the bound pool at zero offset, in seconds.
pub const DEFAULT_LINESHAPE: f64 = 1.4e-5;

/// The 3×3 mixing matrix of an instantaneous rotation acting on `(F+, F-, Z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix<T: Real> {
    m: [[Complex<T>; 3]; 3],
}

impl<T: Real> RotationMatrix<T> {
    /// Rotation about the x axis by `alpha` radians.
    pub fn unphased(alpha: T) -> Self {
        let (c2, s2, sa, ca) = half_angles(alpha);
        let i = Complex::new(T::zero(), T::one());
        let half = T::from_f64(0.5);
        let real = |x: T| Complex::new(x, T::zero());

        Self {
            m: [
                [real(c2), real(s2), -i * sa],
                [real(s2), real(c2), i * sa],
                [-i * (sa * half), i * (sa * half), real(ca)],
            ],
        }
    }

    /// Rotation by `alpha` radians about an axis at angle `phi` from x.
    pub fn phased(alpha: T, phi: T) -> Self {
        let (c2, s2, sa, ca) = half_angles(alpha);
        let i = Complex::new(T::zero(), T::one());
        let half = T::from_f64(0.5);
        let e = cis(phi);
        let ec = e.conj();

        Self {
            m: [
                [Complex::new(c2, T::zero()), e * e * s2, -i * e * sa],
                [ec * ec * s2, Complex::new(c2, T::zero()), i * ec * sa],
                [
                    -i * ec * (sa * half),
                    i * e * (sa * half),
                    Complex::new(ca, T::zero()),
                ],
            ],
        }
    }

    /// Returns the entry at `(row, column)`.
    #[must_use]
    pub fn entry(&self, row: usize, column: usize) -> Complex<T> {
        self.m[row][column]
    }

    /// Rotates one `(F+, F-, Z)` triple.
    pub fn rotate(
        &self,
        fp: Complex<T>,
        fm: Complex<T>,
        z: Complex<T>,
    ) -> (Complex<T>, Complex<T>, Complex<T>) {
        let row = |r: &[Complex<T>; 3]| r[0] * fp + r[1] * fm + r[2] * z;
        (row(&self.m[0]), row(&self.m[1]), row(&self.m[2]))
    }
}

fn half_angles<T: Real>(alpha: T) -> (T, T, T, T) {
    let half = alpha * T::from_f64(0.5);
    let (ch, sh) = (half.cos(), half.sin());
    (ch * ch, sh * sh, alpha.sin(), alpha.cos())
}

/// Transmit field seen by each lane and location.
///
/// The effective flip angle at lane `l`, location `s` is
/// `flip · scale[l] · profile[s]` and the effective phase is
/// `phase + phase_offset[l]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmit<T: Real> {
    scale: Array1<T>,
    phase_offset: Option<Array1<T>>,
    profile: Array1<f64>,
}

impl<T: Real> Transmit<T> {
    /// Creates a transmit field from per-lane scales and per-location profile weights.
    #[must_use]
    pub fn new(scale: Array1<T>, profile: Array1<f64>) -> Self {
        Self {
            scale,
            phase_offset: None,
            profile,
        }
    }

    /// Adds a per-lane transmit phase in radians.
    #[must_use]
    pub fn with_phase(mut self, phase_offset: Array1<T>) -> Self {
        self.phase_offset = Some(phase_offset);
        self
    }

    #[must_use]
    pub fn lanes(&self) -> usize {
        self.scale.len()
    }

    #[must_use]
    pub fn scale(&self) -> &Array1<T> {
        &self.scale
    }

    #[must_use]
    pub fn profile(&self) -> &Array1<f64> {
        &self.profile
    }
}

/// Direct saturation of the bound pool by one RF pulse.
///
/// The bound pool is too short-lived to be rotated. Its longitudinal
/// magnetization is scaled by `exp(-π γ² B1²τ G)` instead, with the pulse
/// energy `B1²τ` scaled by the local transmit field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saturation<T: Real> {
    /// Pulse energy `∫B1²dt` in µT²·s.
    pub energy: T,
    /// Absorption lineshape `G` in seconds.
    pub lineshape: f64,
}

impl<T: Real> Saturation<T> {
    /// Fraction of bound-pool magnetization left where the transmit field
    /// is `local` times nominal.
    #[must_use]
    pub fn factor(&self, local: T) -> T {
        let rate = T::from_f64(std::f64::consts::PI * self.lineshape * GAMMA * GAMMA);
        (-(rate * self.energy * local * local)).exp()
    }
}

/// An instantaneous RF pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct RfPulse<T: Real> {
    rotations: Array2<RotationMatrix<T>>,
    saturation: Option<Array2<T>>,
}

impl<T: Real> RfPulse<T> {
    /// Builds the rotation of every lane and location.
    ///
    /// Without an RF phase or a transmit phase the unphased matrix is used.
    pub fn new(transmit: &Transmit<T>, flip: T, phase: Option<T>) -> Self {
        let lanes = transmit.lanes();
        let nlocs = transmit.profile.len();

        let rotations = Array2::from_shape_fn((lanes, nlocs), |(lane, loc)| {
            let alpha = flip * transmit.scale[lane] * T::from_f64(transmit.profile[loc]);
            let offset = transmit.phase_offset.as_ref().map(|p| p[lane]);
            match (phase, offset) {
                (None, None) => RotationMatrix::unphased(alpha),
                (Some(phi), None) | (None, Some(phi)) => RotationMatrix::phased(alpha, phi),
                (Some(phi), Some(offset)) => RotationMatrix::phased(alpha, phi + offset),
            }
        });

        Self {
            rotations,
            saturation: None,
        }
    }

    /// Adds saturation of the bound pool, if the states carry one.
    #[must_use]
    pub fn with_saturation(mut self, transmit: &Transmit<T>, saturation: Saturation<T>) -> Self {
        let factors = Array2::from_shape_fn(self.rotations.dim(), |(lane, loc)| {
            saturation.factor(transmit.scale[lane] * T::from_f64(transmit.profile[loc]))
        });
        self.saturation = Some(factors);
        self
    }

    /// Returns the rotation applied at `(lane, location)`.
    #[must_use]
    pub fn rotation(&self, lane: usize, location: usize) -> &RotationMatrix<T> {
        &self.rotations[[lane, location]]
    }
}

impl<T: Real> Operator<T> for RfPulse<T> {
    fn apply(&self, states: &mut States<T>) -> Result<(), ShapeError> {
        let layout = states.layout();
        let expected = (layout.lanes(), layout.nlocs());
        if self.rotations.dim() != expected {
            return Err(ShapeError::Mismatch {
                what: "rf pulse",
                expected: vec![expected.0, expected.1],
                found: self.rotations.shape().to_vec(),
            });
        }

        let ntrans = layout.transverse_pools();
        let (fp, fm, z) = states.arrays_mut();
        let mut z_exchangeable = z.slice_mut(s![.., .., .., ..ntrans]);

        Zip::indexed(fp)
            .and(fm)
            .and(&mut z_exchangeable)
            .for_each(|(lane, _, loc, _), fp, fm, z| {
                let (a, b, c) = self.rotations[[lane, loc]].rotate(*fp, *fm, *z);
                *fp = a;
                *fm = b;
                *z = c;
            });

        if let (Some(factors), true) = (&self.saturation, layout.has_bound_pool()) {
            let bound = layout.longitudinal_pools() - 1;
            let mut z_bound = z.index_axis_mut(Axis(3), bound);
            Zip::indexed(&mut z_bound).for_each(|(lane, _, loc), z| {
                *z = *z * factors[[lane, loc]];
            });
        }

        Ok(())
    }
}
