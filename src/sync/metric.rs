///! Maximum likelihood timing metric
///!
///! J.-J. van de Beek, M. Sandell, P. O. Börjesson, "ML Estimation of Time
///! and Frequency Offset in OFDM Systems", IEEE Trans. Signal Processing,
///! vol. 45, no. 7, 1997.
///!
///! For every candidate end-of-symbol index `i` in `[lookup_stop, lookup_start)`:
///!
///! ```text
///! gamma[k]  = sum_{j<cp} x[i-j] * conj(x[i-j-fft])
///! phi[k]    = sum_{j<cp} |x[i-j]|^2 + |x[i-j-fft]|^2
///! lambda[k] = |gamma[k]| - (rho / 2) * phi[k]          k = i - lookup_stop
///! ```
///!
///! The cyclic prefix makes `gamma` coherent exactly when `i` is the last
///! sample of a symbol, and `arg(gamma)` is then `fft` times the carrier
///! offset in radians per sample.

use num::complex::Complex32;
use snafu::ensure;

use super::kernels::{ScalarKernels, VectorKernels};
use super::scratch;
use crate::error::{
    InputTooShortSnafu, InsufficientHistorySnafu, Result, WindowOrderSnafu,
    WindowOutOfRangeSnafu, WindowTooWideSnafu,
};

/// Sliding correlation / energy engine with preallocated scratch
#[derive(Debug, Clone)]
pub struct MetricEngine<K = ScalarKernels> {
    fft_length: usize,
    cp_length: usize,
    rho: f32,
    kernels: K,
    /// |x[i]|^2, indexed by sample
    norm: Vec<f32>,
    /// x[i] * conj(x[i - fft]), stored at i - fft
    corr: Vec<Complex32>,
    gamma: Vec<Complex32>,
    phi: Vec<f32>,
    weighted_phi: Vec<f32>,
    lambda: Vec<f32>,
    width: usize,
}

impl MetricEngine<ScalarKernels> {
    pub fn new(fft_length: usize, cp_length: usize, rho: f32) -> Result<Self> {
        Self::with_kernels(fft_length, cp_length, rho, ScalarKernels)
    }
}

impl<K: VectorKernels> MetricEngine<K> {
    pub fn with_kernels(fft_length: usize, cp_length: usize, rho: f32, kernels: K) -> Result<Self> {
        let span = 2 * fft_length + cp_length;
        let zero = Complex32::new(0.0, 0.0);

        Ok(Self {
            fft_length,
            cp_length,
            rho,
            kernels,
            norm: scratch("norm", span, 0.0)?,
            corr: scratch("corr", span, zero)?,
            gamma: scratch("gamma", fft_length, zero)?,
            phi: scratch("phi", fft_length, 0.0)?,
            weighted_phi: scratch("weighted phi", fft_length, 0.0)?,
            lambda: scratch("lambda", fft_length, 0.0)?,
            width: 0,
        })
    }

    /// Smallest valid `lookup_stop`
    pub fn min_lookup_stop(&self) -> usize {
        self.fft_length + self.cp_length - 1
    }

    /// Largest valid `lookup_start`
    pub fn max_lookup_start(&self) -> usize {
        self.norm.len()
    }

    /// Compute the likelihood curve for the window `[lookup_stop, lookup_start)`.
    ///
    /// Reads `samples[lookup_stop + 1 - cp - fft .. lookup_start]`. The
    /// returned slice (and [`gamma`](Self::gamma), [`phi`](Self::phi)) holds
    /// `lookup_start - lookup_stop` entries and is valid until the next call.
    pub fn compute_likelihood(
        &mut self,
        samples: &[Complex32],
        lookup_start: usize,
        lookup_stop: usize,
    ) -> Result<&[f32]> {
        ensure!(
            lookup_start >= lookup_stop,
            WindowOrderSnafu {
                lookup_start,
                lookup_stop
            }
        );
        ensure!(
            lookup_stop >= self.min_lookup_stop(),
            InsufficientHistorySnafu {
                lookup_stop,
                required: self.min_lookup_stop(),
            }
        );
        ensure!(
            lookup_start <= self.max_lookup_start(),
            WindowOutOfRangeSnafu {
                lookup_start,
                limit: self.max_lookup_start(),
            }
        );
        let width = lookup_start - lookup_stop;
        ensure!(
            width <= self.gamma.len(),
            WindowTooWideSnafu {
                width,
                capacity: self.gamma.len(),
            }
        );
        ensure!(
            samples.len() >= lookup_start,
            InputTooShortSnafu {
                available: samples.len(),
                needed: lookup_start,
            }
        );

        let n = self.fft_length;
        let cp = self.cp_length;
        // First sample touched by the oldest correlation window
        let low = lookup_stop + 1 - cp - n;

        self.kernels
            .magnitude_squared(&mut self.norm[low..lookup_start], &samples[low..lookup_start]);

        self.kernels.multiply_conjugate(
            &mut self.corr[low..lookup_start - n],
            &samples[low + n..lookup_start],
            &samples[low..lookup_start - n],
        );

        // Fixed cp-length window per candidate
        for k in 0..width {
            let i = lookup_stop + k;
            let head = i + 1 - cp;

            self.gamma[k] = self.corr[head - n..=i - n].iter().sum();

            let recent: f32 = self.norm[head..=i].iter().sum();
            let delayed: f32 = self.norm[head - n..=i - n].iter().sum();
            self.phi[k] = recent + delayed;
        }

        self.kernels
            .magnitude(&mut self.lambda[..width], &self.gamma[..width]);
        self.weighted_phi[..width].copy_from_slice(&self.phi[..width]);
        self.kernels
            .scale(&mut self.weighted_phi[..width], self.rho / 2.0);
        self.kernels
            .subtract_assign(&mut self.lambda[..width], &self.weighted_phi[..width]);

        self.width = width;
        Ok(&self.lambda[..width])
    }

    /// Correlation sums from the last window
    pub fn gamma(&self) -> &[Complex32] {
        &self.gamma[..self.width]
    }

    /// Energy sums from the last window
    pub fn phi(&self) -> &[f32] {
        &self.phi[..self.width]
    }

    /// Likelihood curve from the last window
    pub fn lambda(&self) -> &[f32] {
        &self.lambda[..self.width]
    }

    pub fn rho(&self) -> f32 {
        self.rho
    }

    pub fn kernels(&self) -> &K {
        &self.kernels
    }
}
