use snafu::Snafu;

/// Errors raised by the acquisition engine.
///
/// A detection miss is not an error. Only construction problems and calls
/// that would index outside the buffered history end up here.
#[derive(Debug, Snafu, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum SyncError {
    /// FFT length must be at least 2
    #[snafu(display("FFT length must be at least 2, got {fft_length}"))]
    InvalidFftLength { fft_length: usize },

    /// Cyclic prefix must be non-empty and no longer than the FFT
    #[snafu(display("cyclic prefix length {cp_length} must be in 1..={fft_length}"))]
    InvalidCyclicPrefix { cp_length: usize, fft_length: usize },

    #[snafu(display("occupied tones {occupied_tones} exceed FFT length {fft_length}"))]
    InvalidOccupiedTones { occupied_tones: usize, fft_length: usize },

    #[snafu(display("block count must be at least 1, got {blocks}"))]
    InvalidBlocks { blocks: usize },

    #[snafu(display("SNR must be finite, got {snr_db} dB"))]
    InvalidSnr { snr_db: f32 },

    #[snafu(display(
        "invalid peak detector settings: rise={rise}, fall={fall}, alpha={alpha}"
    ))]
    InvalidPeakThresholds { rise: f32, fall: f32, alpha: f32 },

    /// Scratch buffer reservation failed
    #[snafu(display("cannot allocate {what} ({len} elements)"))]
    Allocation { what: &'static str, len: usize },

    #[snafu(display("lookup start {lookup_start} is before lookup stop {lookup_stop}"))]
    WindowOrder { lookup_start: usize, lookup_stop: usize },

    /// Not enough look-back in front of the window for a full correlation
    #[snafu(display("lookup stop {lookup_stop} needs at least {required} samples of history"))]
    InsufficientHistory { lookup_stop: usize, required: usize },

    #[snafu(display("window of {width} candidates exceeds scratch capacity {capacity}"))]
    WindowTooWide { width: usize, capacity: usize },

    #[snafu(display("lookup start {lookup_start} lies beyond the buffered span of {limit}"))]
    WindowOutOfRange { lookup_start: usize, limit: usize },

    #[snafu(display("input too short: {available} samples (need {needed})"))]
    InputTooShort { available: usize, needed: usize },

    #[snafu(display("output too short: {available} samples (need {needed})"))]
    OutputTooShort { available: usize, needed: usize },
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
