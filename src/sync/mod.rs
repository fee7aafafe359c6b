///! OFDM symbol synchronization
///!
///! Blind symbol timing and fractional carrier offset acquisition for
///! cyclic-prefix OFDM using the van de Beek ML estimator.
///!
///! **Algorithm**:
///! 1. Correlate each sample with the sample one FFT length earlier and sum
///!    over a cyclic-prefix-long window (gamma), alongside the window energy (phi)
///! 2. Combine into the log-likelihood `lambda = |gamma| - rho/2 * phi`
///! 3. Pick the strongest peak of lambda with an adaptive-threshold detector
///! 4. Read the carrier offset from `arg(gamma)` at the peak and derotate
///!
///! **Search Strategy**:
///! - Searching: one FFT length of candidate boundaries
///! - Tracking: ±8 samples around the previous boundary, every symbol
///!
///! **Module Organization**:
///! - `kernels` - Elementwise array operations
///! - `metric` - Correlation, energy and likelihood curves
///! - `peak` - Hysteresis peak detector
///! - `tracker` - Phase accumulator, handoff and derotation
///! - `acquisition` - Searching / Tracking controller

pub mod acquisition;
pub mod kernels;
pub mod metric;
pub mod peak;
pub mod tracker;

pub use acquisition::{
    AcquiredSymbol, AcquisitionState, ProcessStatus, RunSummary, StreamTag, SymbolAcquisition,
    SYNC_START, TRACKING_SPAN,
};
pub use kernels::{ScalarKernels, VectorKernels};
pub use metric::MetricEngine;
pub use peak::{Peak, PeakDetector};
pub use tracker::{wrap_phase, FrequencyTracker, ResolvedPeak};

use crate::error::{AllocationSnafu, Result};
use snafu::ensure;

/// Reserve a fixed-size scratch buffer, failing instead of aborting when
/// the allocator refuses.
pub(crate) fn scratch<T: Clone>(what: &'static str, len: usize, fill: T) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    ensure!(
        buffer.try_reserve_exact(len).is_ok(),
        AllocationSnafu { what, len }
    );
    buffer.resize(len, fill);
    Ok(buffer)
}
