///! Adaptive threshold peak detection
///!
///! Scans a likelihood curve with a two-state hysteresis machine. An
///! exponentially weighted moving average of the curve sets both thresholds:
///! a candidate opens when a sample rises above `avg * threshold_rise` and
///! closes once the curve falls to `avg * threshold_fall` or below.
///!
///! State transitions never advance the scan index. The sample that caused
///! the transition is re-evaluated in the new state, for rises and falls
///! alike.

use crate::config::PeakDetectorConfig;

/// A completed local maximum of the curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Index into the scanned curve
    pub position: usize,
    /// Curve value at `position`
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Below,
    Above,
}

/// Hysteresis peak detector
///
/// The moving average is detector state and carries over from one scan to
/// the next, so consecutive windows share one noise floor estimate.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    config: PeakDetectorConfig,
    avg: Option<f32>,
    peaks: Vec<Peak>,
}

impl PeakDetector {
    /// Create a detector that can record up to `capacity` peaks per scan
    /// without reallocating.
    pub fn new(config: PeakDetectorConfig, capacity: usize) -> Self {
        Self {
            config,
            avg: None,
            peaks: Vec::with_capacity(capacity),
        }
    }

    /// Current moving average, `None` before the first scan
    pub fn average(&self) -> Option<f32> {
        self.avg
    }

    /// Forget the moving average
    pub fn reset(&mut self) {
        self.avg = None;
        self.peaks.clear();
    }

    /// Peaks completed by the last scan, in curve order
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    #[inline]
    fn update_average(avg: f32, value: f32, alpha: f32) -> f32 {
        alpha * value + (1.0 - alpha) * avg
    }

    /// Scan `curve` and return the strongest completed peak.
    ///
    /// `None` means no candidate both rose and fell inside the curve. That is
    /// an ordinary outcome for noise or a window that misses the boundary.
    /// A candidate still open when the curve ends is dropped.
    pub fn detect(&mut self, curve: &[f32]) -> Option<Peak> {
        self.peaks.clear();

        let PeakDetectorConfig {
            threshold_rise,
            threshold_fall,
            alpha,
        } = self.config;

        let mut avg = match (self.avg, curve.first()) {
            (Some(avg), _) => avg,
            (None, Some(&first)) => first,
            (None, None) => return None,
        };

        let mut state = ScanState::Below;
        let mut peak_val = f32::NEG_INFINITY;
        let mut peak_index: Option<usize> = None;

        let mut i = 0;
        while i < curve.len() {
            let value = curve[i];
            match state {
                ScanState::Below => {
                    if value > avg * threshold_rise {
                        state = ScanState::Above;
                    } else {
                        avg = Self::update_average(avg, value, alpha);
                        i += 1;
                    }
                }
                ScanState::Above => {
                    if value > peak_val {
                        peak_val = value;
                        peak_index = Some(i);
                        avg = Self::update_average(avg, value, alpha);
                        i += 1;
                    } else if value > avg * threshold_fall {
                        avg = Self::update_average(avg, value, alpha);
                        i += 1;
                    } else {
                        if let Some(position) = peak_index.take() {
                            self.peaks.push(Peak {
                                position,
                                value: curve[position],
                            });
                        } else {
                            // Unordered sample (NaN) opened the candidate
                            i += 1;
                        }
                        state = ScanState::Below;
                        peak_val = f32::NEG_INFINITY;
                    }
                }
            }
        }

        self.avg = Some(avg);

        self.peaks
            .iter()
            .copied()
            .reduce(|best, p| if p.value > best.value { p } else { best })
    }
}
