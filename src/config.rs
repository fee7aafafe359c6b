//! Acquisition configuration
//!
//! Everything here is fixed once a [`SymbolAcquisition`](crate::SymbolAcquisition)
//! is built. Defaults follow the DVB-T 2K mode with a 1/32 guard interval.

use crate::error::{
    InvalidBlocksSnafu, InvalidCyclicPrefixSnafu, InvalidFftLengthSnafu,
    InvalidOccupiedTonesSnafu, InvalidPeakThresholdsSnafu, InvalidSnrSnafu, Result,
};
use snafu::ensure;

/// Adaptive threshold settings for the likelihood peak detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetectorConfig {
    /// A candidate starts when `value > avg * threshold_rise`
    pub threshold_rise: f32,
    /// A candidate ends when `value <= avg * threshold_fall`
    pub threshold_fall: f32,
    /// Moving average weight of the newest sample
    pub alpha: f32,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        // The likelihood curve sits below zero, so factors under one raise
        // the threshold towards zero.
        Self {
            threshold_rise: 0.8,
            threshold_fall: 0.9,
            alpha: 0.9,
        }
    }
}

impl PeakDetectorConfig {
    pub fn validate(&self) -> Result<()> {
        let ok = self.threshold_rise.is_finite()
            && self.threshold_fall.is_finite()
            && self.alpha > 0.0
            && self.alpha <= 1.0;
        ensure!(
            ok,
            InvalidPeakThresholdsSnafu {
                rise: self.threshold_rise,
                fall: self.threshold_fall,
                alpha: self.alpha,
            }
        );
        Ok(())
    }
}

/// Configuration for the symbol acquisition block
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Number of parallel blocks per stream item (informational)
    pub blocks: usize,
    /// FFT length in samples
    pub fft_length: usize,
    /// Number of occupied subcarriers (informational)
    pub occupied_tones: usize,
    /// Cyclic prefix length in samples
    pub cp_length: usize,
    /// Assumed signal to noise ratio in dB
    pub snr_db: f32,
    /// Peak detector thresholds
    pub peak: PeakDetectorConfig,
    /// Consecutive tracking misses tolerated before re-acquisition
    pub miss_timeout: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            blocks: 1,
            fft_length: 2048,
            occupied_tones: 1705,
            cp_length: 64,
            snr_db: 10.0,
            peak: PeakDetectorConfig::default(),
            miss_timeout: 0,
        }
    }
}

impl SyncConfig {
    /// Build a config from the block construction parameters, keeping the
    /// default detector settings.
    pub fn new(
        blocks: usize,
        fft_length: usize,
        occupied_tones: usize,
        cp_length: usize,
        snr_db: f32,
    ) -> Self {
        Self {
            blocks,
            fft_length,
            occupied_tones,
            cp_length,
            snr_db,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.fft_length >= 2,
            InvalidFftLengthSnafu {
                fft_length: self.fft_length
            }
        );
        ensure!(
            self.cp_length >= 1 && self.cp_length <= self.fft_length,
            InvalidCyclicPrefixSnafu {
                cp_length: self.cp_length,
                fft_length: self.fft_length,
            }
        );
        ensure!(
            self.occupied_tones <= self.fft_length,
            InvalidOccupiedTonesSnafu {
                occupied_tones: self.occupied_tones,
                fft_length: self.fft_length,
            }
        );
        ensure!(self.blocks >= 1, InvalidBlocksSnafu { blocks: self.blocks });
        ensure!(self.snr_db.is_finite(), InvalidSnrSnafu { snr_db: self.snr_db });
        self.peak.validate()
    }

    /// Samples in one OFDM symbol including its cyclic prefix
    pub fn symbol_length(&self) -> usize {
        self.fft_length + self.cp_length
    }

    /// History needed in front of (and including) one full acquisition window
    pub fn history_length(&self) -> usize {
        2 * self.fft_length + self.cp_length
    }

    /// Linear SNR
    pub fn snr_linear(&self) -> f32 {
        10.0f32.powf(self.snr_db / 10.0)
    }

    /// Likelihood weighting `rho = snr / (snr + 1)`, evaluated as
    /// `1 / (1 + 1/snr)` so it stays in [0, 1] where `snr` overflows
    pub fn rho(&self) -> f32 {
        1.0 / (1.0 + 10.0f32.powf(-self.snr_db / 10.0))
    }
}
