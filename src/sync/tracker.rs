///! Fractional frequency tracking and derotation
///!
///! The phase of `gamma` at the detected boundary is `fft` times the carrier
///! offset in radians per sample. The tracker turns that into a per-sample
///! phase increment and keeps a running phase across calls so consecutive
///! symbols are derotated coherently.
///!
///! A new estimate is not applied immediately. It is parked together with a
///! handoff offset (the detected boundary, expressed in the coordinates of
///! the next call's buffer) and only replaces the running increment once the
///! next derotation walk reaches that offset.

use core::f32::consts::{PI, TAU};
use num::complex::Complex32;

use super::scratch;
use crate::error::Result;

/// Wrap a phase into (-pi, pi]
pub fn wrap_phase(phase: f32) -> f32 {
    let mut phase = phase;
    if phase.abs() > 4.0 * PI {
        phase = (phase + PI).rem_euclid(TAU) - PI;
    }
    while phase > PI {
        phase -= TAU;
    }
    while phase <= -PI {
        phase += TAU;
    }
    phase
}

/// Boundary and frequency estimate derived from a likelihood peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPeak {
    /// Index of the last sample of the detected symbol in the input buffer
    pub boundary: usize,
    /// Phase of gamma at the peak, `fft` times the offset in rad/sample
    pub epsilon: f32,
    /// Phase increment per sample that compensates the offset
    pub phase_increment: f32,
    /// Likelihood value at the peak
    pub metric: f32,
}

impl ResolvedPeak {
    /// Estimated carrier offset in radians per sample
    pub fn frequency_offset(&self) -> f32 {
        -self.phase_increment
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Handoff {
    phase_increment: f32,
    position: usize,
}

/// Running phase state and derotation buffer
#[derive(Debug, Clone)]
pub struct FrequencyTracker {
    fft_length: usize,
    cp_length: usize,
    phase: f32,
    phase_increment: f32,
    pending: Option<Handoff>,
    derot: Vec<Complex32>,
}

impl FrequencyTracker {
    pub fn new(fft_length: usize, cp_length: usize) -> Result<Self> {
        Ok(Self {
            fft_length,
            cp_length,
            phase: 0.0,
            phase_increment: 0.0,
            pending: None,
            derot: scratch("derotation", fft_length + cp_length, Complex32::new(0.0, 0.0))?,
        })
    }

    fn symbol_length(&self) -> usize {
        self.fft_length + self.cp_length
    }

    /// Convert a peak of the likelihood curve into a boundary and frequency
    /// estimate. Does not touch the tracker state.
    pub fn resolve_peak(
        &self,
        gamma: &[Complex32],
        peak_index: usize,
        lookup_stop: usize,
        metric: f32,
    ) -> ResolvedPeak {
        let g = gamma[peak_index];
        let epsilon = libm::atan2f(g.im, g.re);
        let sensitivity = -1.0 / self.fft_length as f32;

        ResolvedPeak {
            boundary: peak_index + lookup_stop,
            epsilon,
            phase_increment: sensitivity * epsilon,
            metric,
        }
    }

    /// Build the derotation phasors for one symbol period and schedule the
    /// estimate in `peak` for the next call.
    ///
    /// The pending estimate from the previous peak takes over at its handoff
    /// offset; samples before it still use the older increment.
    pub fn derotate(&mut self, peak: &ResolvedPeak) -> &[Complex32] {
        let len = self.symbol_length();

        for i in 0..len {
            if let Some(handoff) = self.pending {
                if i == handoff.position {
                    self.phase_increment = handoff.phase_increment;
                    self.pending = None;
                }
            }

            self.phase = wrap_phase(self.phase + self.phase_increment);
            let (sin, cos) = libm::sincosf(self.phase);
            self.derot[i] = Complex32::new(cos, sin);
        }

        // A handoff past the walk can only come from a boundary outside the
        // acquisition span; take it over now rather than let it go stale.
        if let Some(handoff) = self.pending.take() {
            self.phase_increment = handoff.phase_increment;
        }

        self.pending = Some(Handoff {
            phase_increment: peak.phase_increment,
            position: peak.boundary.saturating_sub(len),
        });

        &self.derot
    }

    /// Keep the phase running across a period with no detected symbol
    pub fn advance(&mut self, samples: usize) {
        for _ in 0..samples {
            self.phase = wrap_phase(self.phase + self.phase_increment);
        }
    }

    /// Phasors from the last [`derotate`](Self::derotate)
    pub fn derotation(&self) -> &[Complex32] {
        &self.derot
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Increment currently applied per sample
    pub fn phase_increment(&self) -> f32 {
        self.phase_increment
    }

    /// Increment waiting for its handoff
    pub fn pending_increment(&self) -> Option<f32> {
        self.pending.map(|h| h.phase_increment)
    }

    /// Walk index at which the pending increment takes over
    pub fn handoff(&self) -> Option<usize> {
        self.pending.map(|h| h.position)
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.phase_increment = 0.0;
        self.pending = None;
    }
}
