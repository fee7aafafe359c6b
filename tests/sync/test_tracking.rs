//! Derotation across consecutive symbols

use num::complex::Complex32;
use rustyofdm::simulation::apply_frequency_offset;
use rustyofdm::tracing_init::init_test_tracing;
use rustyofdm::{SymbolAcquisition, SyncConfig};

#[path = "../test_utils.rs"]
mod test_utils;
use test_utils::*;

const SEED: u64 = 29;
const SYMBOLS: usize = 12;

/// Phase of `derotated * conj(reference)` for every sample with usable energy
fn residual_phases(derotated: &[Complex32], reference: &[Complex32]) -> Vec<f32> {
    derotated
        .iter()
        .zip(reference)
        .filter(|(_, r)| r.norm_sqr() > 1e-4)
        .map(|(d, r)| (d * r.conj()).arg())
        .collect()
}

#[test]
fn test_derotated_symbols_match_transmitted() {
    init_test_tracing();

    let offset = subcarrier_offset(0.35, N);
    let reference = burst(params(N, CP, TONES), SYMBOLS, DELAY, SEED);
    let signal = burst_with_offset(params(N, CP, TONES), SYMBOLS, DELAY, SEED, offset);

    let mut acquisition = SymbolAcquisition::new(SyncConfig::new(1, N, TONES, CP, 100.0)).unwrap();
    let summary = acquisition.run(&signal).unwrap();
    assert_eq!(summary.symbols.len(), SYMBOLS - 1);

    // The first symbol is derotated before its own estimate takes over;
    // from the second one on the offset is removed across the whole body
    // and the residual phase is one constant for the whole burst.
    let mut common: Option<f32> = None;
    for symbol in &summary.symbols[1..] {
        let body = &reference[symbol.stream_boundary + 1 - N..=symbol.stream_boundary];
        let phases = residual_phases(&symbol.samples, body);
        assert!(phases.len() > N / 2);

        let anchor = *common.get_or_insert(phases[0]);
        for (m, phase) in phases.iter().enumerate() {
            let drift = phase_diff(*phase, anchor);
            assert!(
                drift.abs() < 1e-3,
                "boundary {} sample {}: drift {}",
                symbol.stream_boundary,
                m,
                drift
            );
        }
    }
}

#[test]
fn test_derotation_keeps_magnitude() {
    let offset = subcarrier_offset(-0.2, N);
    let signal = burst_with_offset(params(N, CP, TONES), 4, DELAY, SEED, offset);

    let mut acquisition = SymbolAcquisition::new(SyncConfig::new(1, N, TONES, CP, 100.0)).unwrap();
    let summary = acquisition.run(&signal).unwrap();
    assert!(!summary.symbols.is_empty());

    for symbol in &summary.symbols {
        let body = &signal[symbol.stream_boundary + 1 - N..=symbol.stream_boundary];
        for (d, x) in symbol.samples.iter().zip(body) {
            assert!((d.norm() - x.norm()).abs() < 1e-5);
        }
    }
}

#[test]
fn test_estimate_takes_over_at_detected_boundary() {
    let offset = 0.02f32;
    let signal = burst_with_offset(params(N, CP, TONES), 4, DELAY, SEED, offset);
    let mut output = vec![Complex32::new(0.0, 0.0); N];

    let mut acquisition = SymbolAcquisition::new(SyncConfig::new(1, N, TONES, CP, 100.0)).unwrap();
    let status = acquisition.process(&signal, &mut output).unwrap();
    let boundary = first_boundary(DELAY, N, CP);
    assert_eq!(status.peak.map(|p| p.boundary), Some(boundary));

    // The lock call runs the walk twice: once on the initial hit and once on
    // the tracking pass, which switches to the new increment at the handoff.
    let tracker = acquisition.tracker();
    assert!((tracker.phase_increment() + offset).abs() < 1e-6);
    assert_eq!(tracker.handoff(), Some(boundary - (N + CP)));
    assert!(tracker.pending_increment().is_some());

    let derot = tracker.derotation();
    let handoff = boundary - (N + CP);
    for i in 0..handoff - 1 {
        let step = (derot[i + 1] * derot[i].conj()).arg();
        assert!(step.abs() < 1e-5, "sample {}", i);
    }
    for i in handoff..N + CP - 1 {
        let step = (derot[i + 1] * derot[i].conj()).arg();
        assert!((step + offset).abs() < 1e-4, "sample {}", i);
    }
}

/// Per-sample rotation of the last derotation walk
fn walk_steps(acquisition: &SymbolAcquisition) -> Vec<f32> {
    let derot = acquisition.tracker().derotation();
    derot.windows(2).map(|w| (w[1] * w[0].conj()).arg()).collect()
}

#[test]
fn test_offset_change_hands_over_at_symbol_boundary() {
    init_test_tracing();

    let (before, after) = (0.01f32, -0.02f32);
    let mut signal = burst(params(N, CP, TONES), 12, DELAY, SEED);
    let split = DELAY + 6 * (N + CP);
    apply_frequency_offset(&mut signal[..split], before);
    apply_frequency_offset(&mut signal[split..], after);

    let mut acquisition = SymbolAcquisition::new(SyncConfig::new(1, N, TONES, CP, 100.0)).unwrap();
    let mut output = vec![Complex32::new(0.0, 0.0); N];
    let handoff = first_boundary(DELAY, N, CP) - (N + CP);

    for call in 0..11 {
        let status = acquisition.process(&signal[call * (N + CP)..], &mut output).unwrap();
        let peak = status.peak.expect("every call should find its symbol");
        let expected = if call < 6 { before } else { after };
        assert!(
            (peak.frequency_offset() - expected).abs() < 1e-5,
            "call {}: offset {}",
            call,
            peak.frequency_offset()
        );

        // Steps before the handoff carry the estimate from two symbols back,
        // steps from the handoff on the estimate of the previous symbol
        let steps = walk_steps(&acquisition);
        let (early, late) = match call {
            0 => continue,
            1..=6 => (before, before),
            7 => (before, after),
            _ => (after, after),
        };
        for (i, step) in steps.iter().enumerate() {
            let expected = if i + 1 < handoff { -early } else { -late };
            assert!(
                (step - expected).abs() < 1e-4,
                "call {} step {}: {} (expected {})",
                call,
                i,
                step,
                expected
            );
        }
    }
}
