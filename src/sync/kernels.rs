///! Elementwise array kernels
///!
///! The metric engine only needs a handful of batch operations over
///! contiguous slices. They sit behind [`VectorKernels`] so a SIMD backend
///! can replace the scalar loops without touching the estimator.
///!
///! All kernels operate on the common prefix of their arguments and make no
///! alignment assumptions.

use num::complex::Complex32;

/// Batch elementwise operations used by the ML metric
pub trait VectorKernels {
    /// `out[i] = |x[i]|^2`
    fn magnitude_squared(&self, out: &mut [f32], x: &[Complex32]);

    /// `out[i] = |x[i]|`
    fn magnitude(&self, out: &mut [f32], x: &[Complex32]);

    /// `out[i] = a[i] * conj(b[i])`
    fn multiply_conjugate(&self, out: &mut [Complex32], a: &[Complex32], b: &[Complex32]);

    /// `out[i] = a[i] * b[i]`
    fn multiply(&self, out: &mut [Complex32], a: &[Complex32], b: &[Complex32]);

    /// `x[i] *= scale`
    fn scale(&self, x: &mut [f32], scale: f32);

    /// `out[i] -= x[i]`
    fn subtract_assign(&self, out: &mut [f32], x: &[f32]);
}

/// Plain loop implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernels;

impl VectorKernels for ScalarKernels {
    fn magnitude_squared(&self, out: &mut [f32], x: &[Complex32]) {
        for (o, v) in out.iter_mut().zip(x) {
            *o = v.norm_sqr();
        }
    }

    fn magnitude(&self, out: &mut [f32], x: &[Complex32]) {
        for (o, v) in out.iter_mut().zip(x) {
            *o = v.norm();
        }
    }

    fn multiply_conjugate(&self, out: &mut [Complex32], a: &[Complex32], b: &[Complex32]) {
        for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
            *o = x * y.conj();
        }
    }

    fn multiply(&self, out: &mut [Complex32], a: &[Complex32], b: &[Complex32]) {
        for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
            *o = x * y;
        }
    }

    fn scale(&self, x: &mut [f32], scale: f32) {
        for v in x.iter_mut() {
            *v *= scale;
        }
    }

    fn subtract_assign(&self, out: &mut [f32], x: &[f32]) {
        for (o, v) in out.iter_mut().zip(x) {
            *o -= v;
        }
    }
}
