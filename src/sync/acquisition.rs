///! Symbol acquisition controller
///!
///! Drives the metric engine, the peak detector and the frequency tracker
///! through two modes:
///!
///! - **Searching**: one wide window covering a whole FFT length of
///!   candidate boundaries. Used at start-up and after a miss timeout.
///! - **Tracking**: a narrow window of ±[`TRACKING_SPAN`] samples around the
///!   previous boundary, run once per symbol.
///!
///! Each call consumes one symbol period (`fft + cp`) and emits at most one
///! derotated symbol of `fft` samples. A run of more than `miss_timeout`
///! consecutive tracking misses drops back to Searching and consumes only
///! half a period on that call, so the next search starts from a different
///! alignment.

use num::complex::Complex32;
use snafu::ensure;
use tracing::{debug, info, trace, warn};

use super::kernels::{ScalarKernels, VectorKernels};
use super::metric::MetricEngine;
use super::peak::PeakDetector;
use super::tracker::{FrequencyTracker, ResolvedPeak};
use crate::config::SyncConfig;
use crate::error::{InputTooShortSnafu, OutputTooShortSnafu, Result};

/// Half width of the tracking window in samples
pub const TRACKING_SPAN: usize = 8;

/// Tag key emitted on first lock
pub const SYNC_START: &str = "sync_start";

/// Controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// No boundary known, scanning the full ambiguity window
    Searching,
    /// Following a known boundary
    Tracking {
        /// Boundary index in the coordinates of the next input buffer
        boundary: usize,
        /// Consecutive tracking misses
        misses: u32,
    },
}

/// Stream annotation attached to an output item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTag {
    /// Absolute output item index
    pub offset: u64,
    pub key: &'static str,
}

/// Outcome of one [`SymbolAcquisition::process`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessStatus {
    /// Input samples to drop before the next call
    pub consumed: usize,
    /// Symbols written to the output buffer (0 or 1)
    pub produced: usize,
    /// Set on the call that first locks after a search
    pub tag: Option<StreamTag>,
    /// Peak behind the produced symbol
    pub peak: Option<ResolvedPeak>,
    /// The miss timeout fired on this call
    pub reacquired: bool,
}

/// One derotated symbol collected by [`SymbolAcquisition::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredSymbol {
    /// Absolute index of the symbol's last sample in the input stream
    pub stream_boundary: usize,
    /// Estimated carrier offset in radians per sample
    pub frequency_offset: f32,
    /// `fft` derotated samples
    pub samples: Vec<Complex32>,
}

/// Totals from [`SymbolAcquisition::run`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub symbols: Vec<AcquiredSymbol>,
    pub tags: Vec<StreamTag>,
    pub calls: usize,
    /// Calls that produced no symbol, searching or tracking
    pub misses: usize,
    pub reacquisitions: usize,
    /// Input samples consumed in total
    pub consumed: usize,
}

/// ML symbol timing and fractional frequency acquisition
#[derive(Debug, Clone)]
pub struct SymbolAcquisition<K = ScalarKernels> {
    config: SyncConfig,
    metric: MetricEngine<K>,
    detector: PeakDetector,
    tracker: FrequencyTracker,
    state: AcquisitionState,
    items_written: u64,
    last_peak: Option<ResolvedPeak>,
}

impl SymbolAcquisition<ScalarKernels> {
    pub fn new(config: SyncConfig) -> Result<Self> {
        Self::with_kernels(config, ScalarKernels)
    }
}

impl<K: VectorKernels> SymbolAcquisition<K> {
    /// Build with a specific elementwise backend. Fails if the configuration
    /// is invalid or the scratch buffers cannot be reserved.
    pub fn with_kernels(config: SyncConfig, kernels: K) -> Result<Self> {
        config.validate()?;

        info!(
            blocks = config.blocks,
            fft_length = config.fft_length,
            occupied_tones = config.occupied_tones,
            cp_length = config.cp_length,
            snr = config.snr_linear(),
            "OFDM symbol acquisition"
        );
        if config.blocks > 1 {
            warn!(
                blocks = config.blocks,
                "multi-block items are not supported, processing one symbol per call"
            );
        }

        let metric = MetricEngine::with_kernels(
            config.fft_length,
            config.cp_length,
            config.rho(),
            kernels,
        )?;
        let detector = PeakDetector::new(config.peak, config.fft_length);
        let tracker = FrequencyTracker::new(config.fft_length, config.cp_length)?;

        Ok(Self {
            config,
            metric,
            detector,
            tracker,
            state: AcquisitionState::Searching,
            items_written: 0,
            last_peak: None,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, AcquisitionState::Tracking { .. })
    }

    pub fn consecutive_misses(&self) -> u32 {
        match self.state {
            AcquisitionState::Tracking { misses, .. } => misses,
            AcquisitionState::Searching => 0,
        }
    }

    pub fn tracker(&self) -> &FrequencyTracker {
        &self.tracker
    }

    pub fn detector(&self) -> &PeakDetector {
        &self.detector
    }

    /// Peak behind the most recent produced symbol
    pub fn last_peak(&self) -> Option<&ResolvedPeak> {
        self.last_peak.as_ref()
    }

    /// Symbols produced so far
    pub fn items_written(&self) -> u64 {
        self.items_written
    }

    /// Input samples needed to produce `noutput` symbols
    pub fn required_input(&self, noutput: usize) -> usize {
        self.config.history_length() * noutput
    }

    /// Return to Searching and clear all tracking state
    pub fn reset(&mut self) {
        self.state = AcquisitionState::Searching;
        self.detector.reset();
        self.tracker.reset();
        self.last_peak = None;
    }

    fn search_window(&self) -> (usize, usize) {
        let n = self.config.fft_length;
        let cp = self.config.cp_length;
        (2 * n + cp - 1, n + cp - 1)
    }

    /// `boundary ± TRACKING_SPAN`, clipped to the search span
    fn tracking_window(&self, boundary: usize) -> (usize, usize) {
        let (start_limit, stop_limit) = self.search_window();
        let start = (boundary + TRACKING_SPAN).min(start_limit);
        let stop = boundary.saturating_sub(TRACKING_SPAN).max(stop_limit);
        (start, stop.min(start))
    }

    /// Metric, peak detection and peak resolution over one window
    fn locate(
        &mut self,
        input: &[Complex32],
        lookup_start: usize,
        lookup_stop: usize,
    ) -> Result<Option<ResolvedPeak>> {
        let lambda = self
            .metric
            .compute_likelihood(input, lookup_start, lookup_stop)?;

        let Some(best) = self.detector.detect(lambda) else {
            trace!(lookup_start, lookup_stop, "no peak");
            return Ok(None);
        };

        let resolved = self.tracker.resolve_peak(
            self.metric.gamma(),
            best.position,
            lookup_stop,
            best.value,
        );
        trace!(
            lookup_start,
            lookup_stop,
            peaks = self.detector.peaks().len(),
            boundary = resolved.boundary,
            epsilon = resolved.epsilon,
            "peak"
        );
        Ok(Some(resolved))
    }

    /// Process one symbol period.
    ///
    /// `input` must start at the first unconsumed sample and hold at least
    /// [`required_input(1)`](Self::required_input) samples. `output` must
    /// hold `fft_length` samples; it is written only when a symbol is
    /// produced.
    pub fn process(
        &mut self,
        input: &[Complex32],
        output: &mut [Complex32],
    ) -> Result<ProcessStatus> {
        let n = self.config.fft_length;
        let symbol_length = self.config.symbol_length();

        ensure!(
            input.len() >= self.required_input(1),
            InputTooShortSnafu {
                available: input.len(),
                needed: self.required_input(1),
            }
        );
        ensure!(
            output.len() >= n,
            OutputTooShortSnafu {
                available: output.len(),
                needed: n,
            }
        );

        let mut status = ProcessStatus {
            consumed: symbol_length,
            produced: 0,
            tag: None,
            peak: None,
            reacquired: false,
        };

        if self.state == AcquisitionState::Searching {
            let (start, stop) = self.search_window();
            match self.locate(input, start, stop)? {
                Some(peak) => {
                    self.tracker.derotate(&peak);
                    self.state = AcquisitionState::Tracking {
                        boundary: peak.boundary,
                        misses: 0,
                    };
                    status.tag = Some(StreamTag {
                        offset: self.items_written,
                        key: SYNC_START,
                    });
                    debug!(
                        boundary = peak.boundary,
                        frequency_offset = peak.frequency_offset(),
                        "initial acquisition"
                    );
                }
                None => {
                    self.tracker.advance(symbol_length);
                    return Ok(status);
                }
            }
        }

        let AcquisitionState::Tracking { boundary, misses } = self.state else {
            return Ok(status);
        };

        let (start, stop) = self.tracking_window(boundary);
        match self.locate(input, start, stop)? {
            Some(peak) => {
                let derot = self.tracker.derotate(&peak);
                let low = peak.boundary + 1 - n;
                self.metric
                    .kernels()
                    .multiply(&mut output[..n], &derot[..n], &input[low..=peak.boundary]);

                self.state = AcquisitionState::Tracking {
                    boundary: peak.boundary,
                    misses: 0,
                };
                self.items_written += 1;
                self.last_peak = Some(peak);
                status.produced = 1;
                status.peak = Some(peak);
            }
            None => {
                self.tracker.advance(symbol_length);
                let misses = misses + 1;
                if misses > self.config.miss_timeout {
                    info!(misses, "restarting acquisition");
                    self.state = AcquisitionState::Searching;
                    self.detector.reset();
                    status.consumed = symbol_length / 2;
                    status.reacquired = true;
                } else {
                    self.state = AcquisitionState::Tracking { boundary, misses };
                }
            }
        }

        Ok(status)
    }

    /// Feed a whole buffer through [`process`](Self::process), the way a
    /// streaming runtime would, until less than one call's worth of input
    /// remains.
    pub fn run(&mut self, samples: &[Complex32]) -> Result<RunSummary> {
        let n = self.config.fft_length;
        let needed = self.required_input(1);
        let mut output = vec![Complex32::new(0.0, 0.0); n];
        let mut summary = RunSummary::default();
        let mut position = 0;

        while samples.len() - position >= needed {
            let status = self.process(&samples[position..], &mut output)?;
            summary.calls += 1;

            if let Some(tag) = status.tag {
                summary.tags.push(tag);
            }
            match status.peak {
                Some(peak) if status.produced > 0 => {
                    summary.symbols.push(AcquiredSymbol {
                        stream_boundary: position + peak.boundary,
                        frequency_offset: peak.frequency_offset(),
                        samples: output.clone(),
                    });
                }
                _ => summary.misses += 1,
            }
            if status.reacquired {
                summary.reacquisitions += 1;
            }

            position += status.consumed;
        }

        summary.consumed = position;
        debug!(
            calls = summary.calls,
            symbols = summary.symbols.len(),
            misses = summary.misses,
            reacquisitions = summary.reacquisitions,
            "run complete"
        );
        Ok(summary)
    }
}
