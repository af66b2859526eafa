// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Kernel smoothing of waveforms.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Absolute tolerance of the convolution quadrature.
pub const QUADRATURE_TOLERANCE: f64 = 1e-4;
const MAX_DEPTH: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingKernel {
    Gaussian,
    Logistic,
    Sigmoid,
    Triangle,
    Uniform,
    Parabolic,
    Biweight,
    Triweight,
    Tricube,
    Cosine,
}

impl SmoothingKernel {
    pub fn weight(&self, u: f64) -> f64 {
        let inside = u.abs() <= 1.0;
        match self {
            SmoothingKernel::Gaussian => (-0.5 * u * u).exp() / (2.0 * PI).sqrt(),
            SmoothingKernel::Logistic => 1.0 / (u.exp() + 2.0 + (-u).exp()),
            SmoothingKernel::Sigmoid => 2.0 / PI / (u.exp() + (-u).exp()),
            _ if !inside => 0.0,
            SmoothingKernel::Triangle => 1.0 - u.abs(),
            SmoothingKernel::Uniform => 0.5,
            SmoothingKernel::Parabolic => 0.75 * (1.0 - u * u),
            SmoothingKernel::Biweight => 15.0 / 16.0 * (1.0 - u * u).powi(2),
            SmoothingKernel::Triweight => 35.0 / 32.0 * (1.0 - u * u).powi(3),
            SmoothingKernel::Tricube => 70.0 / 81.0 * (1.0 - u.abs().powi(3)).powi(3),
            SmoothingKernel::Cosine => PI / 4.0 * (PI * u / 2.0).cos(),
        }
    }

    /// Integration bounds in units of the kernel radius.
    ///
    /// Infinite-support kernels are truncated where their tails drop below
    /// the quadrature tolerance.
    pub fn support(&self) -> (f64, f64) {
        match self {
            SmoothingKernel::Gaussian => (-8.0, 8.0),
            SmoothingKernel::Logistic | SmoothingKernel::Sigmoid => (-40.0, 40.0),
            _ => (-1.0, 1.0),
        }
    }
}

/// Convolve `signal` with the kernel scaled to `radius`.
///
/// `signal` must already be clamped outside its domain.
pub fn convolve(kernel: SmoothingKernel, radius: f64, t: f64, signal: impl Fn(f64) -> f64) -> f64 {
    if radius <= 0.0 {
        return signal(t);
    }
    let (lo, hi) = kernel.support();
    let integrand = |u: f64| kernel.weight(u) * signal(t - radius * u);
    // Split at the origin so the kink of the finite kernels is a node.
    integrate(&integrand, lo, 0.0) + integrate(&integrand, 0.0, hi)
}

/// Adaptive Simpson quadrature.
pub fn integrate(f: &impl Fn(f64) -> f64, a: f64, b: f64) -> f64 {
    let fa = f(a);
    let fb = f(b);
    let m = 0.5 * (a + b);
    let fm = f(m);
    let whole = simpson(a, b, fa, fm, fb);
    adaptive(f, a, b, fa, fm, fb, whole, QUADRATURE_TOLERANCE, MAX_DEPTH)
}

fn simpson(a: f64, b: f64, fa: f64, fm: f64, fb: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn adaptive(
    f: &impl Fn(f64) -> f64,
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    tolerance: f64,
    depth: u32,
) -> f64 {
    let m = 0.5 * (a + b);
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let flm = f(lm);
    let frm = f(rm);
    let left = simpson(a, m, fa, flm, fm);
    let right = simpson(m, b, fm, frm, fb);
    let delta = left + right - whole;
    if depth == 0 || delta.abs() <= 15.0 * tolerance {
        return left + right + delta / 15.0;
    }
    adaptive(f, a, m, fa, flm, fm, left, tolerance / 2.0, depth - 1)
        + adaptive(f, m, b, fm, frm, fb, right, tolerance / 2.0, depth - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNELS: [SmoothingKernel; 10] = [
        SmoothingKernel::Gaussian,
        SmoothingKernel::Logistic,
        SmoothingKernel::Sigmoid,
        SmoothingKernel::Triangle,
        SmoothingKernel::Uniform,
        SmoothingKernel::Parabolic,
        SmoothingKernel::Biweight,
        SmoothingKernel::Triweight,
        SmoothingKernel::Tricube,
        SmoothingKernel::Cosine,
    ];

    #[test]
    fn test_kernels_are_normalized() {
        for kernel in KERNELS {
            let (lo, hi) = kernel.support();
            let area = integrate(&|u| kernel.weight(u), lo, 0.0)
                + integrate(&|u| kernel.weight(u), 0.0, hi);
            assert!((area - 1.0).abs() < 1e-3, "{kernel:?}: {area}");
        }
    }

    #[test]
    fn test_convolve_preserves_linear_signal() {
        // Symmetric kernels leave affine functions unchanged.
        for kernel in KERNELS {
            let value = convolve(kernel, 0.5, 2.0, |t| 3.0 * t + 1.0);
            assert!((value - 7.0).abs() < 1e-2, "{kernel:?}: {value}");
        }
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let value = convolve(SmoothingKernel::Gaussian, 0.0, 1.5, |t| t * t);
        assert_eq!(value, 2.25);
    }
}
