//! Synthetic CP-OFDM signals
//!
//! Random QPSK on the occupied subcarriers, inverse FFT, cyclic prefix, then
//! optional carrier offset and complex AWGN. Used by the tests, the
//! benchmark and `ofdmsim`.

use std::sync::Arc;

use num::complex::Complex32;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use rustfft::{Fft, FftPlanner};
use snafu::{ensure, ResultExt, Snafu};

use crate::config::SyncConfig;

#[derive(Debug, Snafu)]
pub enum SimulationError {
    #[snafu(display("FFT length must be at least 2, got {fft_length}"))]
    InvalidFftLength { fft_length: usize },

    #[snafu(display("cyclic prefix length {cp_length} must be in 1..={fft_length}"))]
    InvalidCyclicPrefix { cp_length: usize, fft_length: usize },

    /// DC stays empty, so at most fft - 1 tones fit
    #[snafu(display("occupied tones {occupied_tones} must be in 1..{fft_length}"))]
    InvalidOccupiedTones { occupied_tones: usize, fft_length: usize },

    #[snafu(display("cannot build noise source for {snr_db} dB"))]
    Noise { snr_db: f32, source: NormalError },
}

/// OFDM frame geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfdmParams {
    pub fft_length: usize,
    pub cp_length: usize,
    pub occupied_tones: usize,
}

impl From<&SyncConfig> for OfdmParams {
    fn from(config: &SyncConfig) -> Self {
        Self {
            fft_length: config.fft_length,
            cp_length: config.cp_length,
            occupied_tones: config.occupied_tones,
        }
    }
}

impl OfdmParams {
    pub fn symbol_length(&self) -> usize {
        self.fft_length + self.cp_length
    }

    /// FFT bins carrying data: half above DC, half below, DC unused
    fn occupied_bins(&self) -> impl Iterator<Item = usize> {
        let n = self.fft_length;
        let upper = self.occupied_tones / 2;
        let lower = self.occupied_tones - upper;
        (1..=upper).chain(n - lower..n)
    }
}

/// Random CP-OFDM symbol source with unit mean sample power
pub struct OfdmGenerator {
    params: OfdmParams,
    rng: StdRng,
    ifft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
}

impl OfdmGenerator {
    pub fn new(params: OfdmParams, seed: u64) -> Result<Self, SimulationError> {
        let OfdmParams {
            fft_length,
            cp_length,
            occupied_tones,
        } = params;

        ensure!(fft_length >= 2, InvalidFftLengthSnafu { fft_length });
        ensure!(
            cp_length >= 1 && cp_length <= fft_length,
            InvalidCyclicPrefixSnafu {
                cp_length,
                fft_length
            }
        );
        ensure!(
            occupied_tones >= 1 && occupied_tones < fft_length,
            InvalidOccupiedTonesSnafu {
                occupied_tones,
                fft_length
            }
        );

        let mut planner = FftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(fft_length);

        Ok(Self {
            params,
            rng: StdRng::seed_from_u64(seed),
            ifft,
            buffer: vec![Complex32::new(0.0, 0.0); fft_length],
        })
    }

    pub fn params(&self) -> &OfdmParams {
        &self.params
    }

    /// Append one symbol (prefix then body) to `out`
    pub fn push_symbol(&mut self, out: &mut Vec<Complex32>) {
        let n = self.params.fft_length;
        let scale = 1.0 / (self.params.occupied_tones as f32).sqrt();
        let amplitude = core::f32::consts::FRAC_1_SQRT_2 * scale;

        self.buffer.fill(Complex32::new(0.0, 0.0));
        for bin in self.params.occupied_bins() {
            let re = if self.rng.random::<bool>() { amplitude } else { -amplitude };
            let im = if self.rng.random::<bool>() { amplitude } else { -amplitude };
            self.buffer[bin] = Complex32::new(re, im);
        }
        self.ifft.process(&mut self.buffer);

        out.extend_from_slice(&self.buffer[n - self.params.cp_length..]);
        out.extend_from_slice(&self.buffer);
    }

    /// `count` consecutive symbols
    pub fn symbols(&mut self, count: usize) -> Vec<Complex32> {
        let mut out = Vec::with_capacity(count * self.params.symbol_length());
        for _ in 0..count {
            self.push_symbol(&mut out);
        }
        out
    }
}

/// Rotate `samples[n]` by `radians_per_sample * n`
pub fn apply_frequency_offset(samples: &mut [Complex32], radians_per_sample: f32) {
    let step = radians_per_sample as f64;
    for (n, sample) in samples.iter_mut().enumerate() {
        let phase = (step * n as f64).rem_euclid(std::f64::consts::TAU);
        *sample *= Complex32::from_polar(1.0, phase as f32);
    }
}

pub fn mean_power(samples: &[Complex32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.norm_sqr()).sum::<f32>() / samples.len() as f32
}

/// Add circular complex Gaussian noise for the requested SNR, measured
/// against the mean power of `samples`. Returns the noise power.
pub fn add_awgn(samples: &mut [Complex32], snr_db: f32, seed: u64) -> Result<f32, SimulationError> {
    let noise_power = mean_power(samples) / 10f32.powf(snr_db / 10.0);
    let sigma = (noise_power / 2.0).sqrt();
    let normal = Normal::new(0.0f32, sigma).context(NoiseSnafu { snr_db })?;
    let mut rng = StdRng::seed_from_u64(seed);

    for sample in samples.iter_mut() {
        *sample += Complex32::new(normal.sample(&mut rng), normal.sample(&mut rng));
    }

    Ok(noise_power)
}
