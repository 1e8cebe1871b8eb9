//! Matrix exponentials of small exchange generators.

use ndarray::Array2;
use num_complex::Complex;
use phasegraph_core::Real;

/// Relative size below which the eigenvalues of a 2×2 generator coincide.
const DEGENERACY_TOL: f64 = 1e-12;

/// Number of Taylor terms used after scaling.
const TAYLOR_TERMS: usize = 18;

/// Computes `exp(G·dt)` for a real 2×2 generator in closed form.
///
/// With `m = tr(G)/2` and `s² = ((a - d)/2)² + b·c` the eigenvalues are `m ± s`
/// and `exp(G·dt) = e^{m·dt}·(cosh(s·dt)·I + sinh(s·dt)/s·(G - m·I))`.
/// Exchange generators have `b·c ≥ 0`, so `s` is real. Coincident
/// eigenvalues use the `s → 0` limit.
pub fn expm2<T: Real>(g: [[T; 2]; 2], dt: T) -> [[T; 2]; 2] {
    let [[a, b], [c, d]] = g;
    let two = T::from_f64(2.0);
    let m = (a + d) / two;
    let h = (a - d) / two;
    let disc = h * h + b * c;

    let scale = (a.value().abs() + d.value().abs()).max(f64::MIN_POSITIVE);
    let (cosh, sinh_over_s) = if disc.value() > (DEGENERACY_TOL * scale).powi(2) {
        let s = disc.sqrt();
        let plus = (s * dt).exp();
        let minus = (-(s * dt)).exp();
        ((plus + minus) / two, (plus - minus) / (two * s))
    } else {
        (T::one(), dt)
    };

    let em = (m * dt).exp();
    [
        [em * (cosh + sinh_over_s * h), em * sinh_over_s * b],
        [em * sinh_over_s * c, em * (cosh - sinh_over_s * h)],
    ]
}

/// Computes `exp(A)` for a square complex matrix by scaling and squaring.
///
/// `A` is scaled by `2^-k` until its infinity norm is at most 1/2, expanded
/// as a truncated Taylor series, then squared `k` times.
pub fn expm<T: Real>(a: &Array2<Complex<T>>) -> Array2<Complex<T>> {
    let n = a.nrows();
    let norm = a
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|z| z.re.value().hypot(z.im.value())).sum::<f64>())
        .fold(0.0, f64::max);

    let squarings = if norm > 0.5 {
        (norm / 0.5).log2().ceil() as u32
    } else {
        0
    };
    let factor = T::from_f64(0.5_f64.powi(squarings as i32));
    let scaled = a.mapv(|z| z * factor);

    let mut result = identity(n);
    let mut term = identity(n);
    for k in 1..=TAYLOR_TERMS {
        term = matmul(&term, &scaled).mapv(|z| z / T::from_f64(k as f64));
        result = result + &term;
    }

    for _ in 0..squarings {
        result = matmul(&result, &result);
    }
    result
}

fn identity<T: Real>(n: usize) -> Array2<Complex<T>> {
    Array2::from_shape_fn((n, n), |(i, j)| {
        let v = if i == j { T::one() } else { T::zero() };
        Complex::new(v, T::zero())
    })
}

fn matmul<T: Real>(a: &Array2<Complex<T>>, b: &Array2<Complex<T>>) -> Array2<Complex<T>> {
    let (n, inner) = a.dim();
    let m = b.ncols();
    Array2::from_shape_fn((n, m), |(i, j)| {
        (0..inner).fold(Complex::new(T::zero(), T::zero()), |acc, k| {
            acc + a[[i, k]] * b[[k, j]]
        })
    })
}
