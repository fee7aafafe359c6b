//! Acquisition on simulated bursts: first lock, boundaries and carrier offset

use num::complex::Complex32;
use rustyofdm::simulation::add_awgn;
use rustyofdm::sync::{StreamTag, SYNC_START};
use rustyofdm::tracing_init::init_test_tracing;
use rustyofdm::{AcquisitionState, SymbolAcquisition, SyncConfig};

#[path = "../test_utils.rs"]
mod test_utils;
use test_utils::*;

/// 100 dB gives rho == 1.0 in f32, where the likelihood peaks at exactly
/// zero on a clean boundary and stays negative everywhere else
fn clean_config() -> SyncConfig {
    SyncConfig::new(1, N, TONES, CP, 100.0)
}

#[test]
fn test_clean_burst_locks_on_exact_boundaries() {
    init_test_tracing();

    let offset = 0.01f32;
    let signal = burst_with_offset(params(N, CP, TONES), 20, DELAY, 11, offset);
    let mut acquisition = SymbolAcquisition::new(clean_config()).unwrap();
    let summary = acquisition.run(&signal).unwrap();

    // Every call but the last full one finds a symbol, starting with the first
    assert_eq!(summary.calls, 19);
    assert_eq!(summary.symbols.len(), 19);
    assert_eq!(summary.misses, 0);
    assert_eq!(summary.reacquisitions, 0);
    assert_eq!(
        summary.tags,
        vec![StreamTag {
            offset: 0,
            key: SYNC_START
        }]
    );

    let first = first_boundary(DELAY, N, CP);
    for (index, symbol) in summary.symbols.iter().enumerate() {
        assert_eq!(symbol.stream_boundary, first + index * (N + CP), "symbol {}", index);
        assert!(
            (symbol.frequency_offset - offset).abs() < 1e-5,
            "symbol {}: offset {}",
            index,
            symbol.frequency_offset
        );
        assert_eq!(symbol.samples.len(), N);
    }

    assert!(acquisition.is_locked());
    assert_eq!(acquisition.items_written(), 19);
}

#[test]
fn test_extreme_snr_setting_still_locks() {
    init_test_tracing();

    let signal = burst_with_offset(params(N, CP, TONES), 10, DELAY, 13, 0.01);
    let mut acquisition = SymbolAcquisition::new(SyncConfig::new(1, N, TONES, CP, 400.0)).unwrap();
    let summary = acquisition.run(&signal).unwrap();

    assert_eq!(summary.calls, 9);
    assert_eq!(summary.symbols.len(), 9);
    assert_eq!(summary.symbols[0].stream_boundary, first_boundary(DELAY, N, CP));
}

#[test]
fn test_negative_offset_is_estimated() {
    init_test_tracing();

    let offset = subcarrier_offset(-0.4, N);
    let signal = burst_with_offset(params(N, CP, TONES), 6, DELAY, 3, offset);
    let mut acquisition = SymbolAcquisition::new(clean_config()).unwrap();
    let summary = acquisition.run(&signal).unwrap();

    assert_eq!(summary.symbols.len(), 5);
    for symbol in &summary.symbols {
        assert!((symbol.frequency_offset - offset).abs() < 1e-5);
    }
}

#[test]
fn test_noisy_burst_tracks_boundaries() {
    init_test_tracing();

    let offset = subcarrier_offset(0.2, N);
    let mut signal = burst_with_offset(params(N, CP, TONES), 50, DELAY, 21, offset);
    add_awgn(&mut signal, 20.0, 5).unwrap();

    let config = SyncConfig::new(1, N, TONES, CP, 20.0);
    let mut acquisition = SymbolAcquisition::new(config).unwrap();
    let summary = acquisition.run(&signal).unwrap();

    assert_eq!(summary.tags.len(), 1);
    assert!(summary.symbols.len() >= 45, "only {} symbols", summary.symbols.len());

    let first = first_boundary(DELAY, N, CP) as i64;
    let period = (N + CP) as i64;
    let mut offset_error = 0.0f32;
    for symbol in &summary.symbols {
        let error = (symbol.stream_boundary as i64 - first + period / 2).rem_euclid(period) - period / 2;
        assert!(error.abs() <= 3, "boundary {} off by {}", symbol.stream_boundary, error);
        offset_error += symbol.frequency_offset - offset;
    }
    offset_error /= summary.symbols.len() as f32;
    assert!(offset_error.abs() < 1e-3, "mean offset error {}", offset_error);
}

#[test]
fn test_dvbt_2k_geometry() {
    init_test_tracing();

    let config = SyncConfig {
        snr_db: 40.0,
        ..SyncConfig::default()
    };
    let (n, cp) = (config.fft_length, config.cp_length);
    let offset = subcarrier_offset(0.3, n);
    let delay = 1000;
    let signal = burst_with_offset(params(n, cp, config.occupied_tones), 3, delay, 8, offset);

    let mut acquisition = SymbolAcquisition::new(config).unwrap();
    let summary = acquisition.run(&signal).unwrap();

    assert_eq!(summary.symbols.len(), 2);
    let first = first_boundary(delay, n, cp);
    assert_eq!(summary.symbols[0].stream_boundary, first);
    assert_eq!(summary.symbols[1].stream_boundary, first + n + cp);
    for symbol in &summary.symbols {
        assert!((symbol.frequency_offset - offset).abs() < 1e-5);
    }
}

#[test]
fn test_miss_timeout_returns_to_search() {
    init_test_tracing();

    let config = SyncConfig {
        miss_timeout: 1,
        ..SyncConfig::new(1, N, TONES, CP, 30.0)
    };
    let signal = burst_with_offset(params(N, CP, TONES), 6, DELAY, 17, 0.01);
    let dc = vec![Complex32::new(0.5, -0.5); 2 * N + CP];
    let mut output = vec![Complex32::new(0.0, 0.0); N];
    let mut acquisition = SymbolAcquisition::new(config).unwrap();

    for call in 0..3 {
        let status = acquisition.process(&signal[call * (N + CP)..], &mut output).unwrap();
        assert_eq!(status.produced, 1, "call {}", call);
        assert_eq!(status.consumed, N + CP);
        if call == 0 {
            assert_eq!(
                status.tag,
                Some(StreamTag {
                    offset: 0,
                    key: SYNC_START
                })
            );
        } else {
            assert_eq!(status.tag, None);
        }
    }
    assert!(acquisition.is_locked());

    // Constant input is equally self-similar at every lag: no peak ever closes
    let status = acquisition.process(&dc, &mut output).unwrap();
    assert_eq!(status.produced, 0);
    assert_eq!(status.consumed, N + CP);
    assert!(!status.reacquired);
    assert_eq!(acquisition.consecutive_misses(), 1);
    assert!(acquisition.is_locked());

    let status = acquisition.process(&dc, &mut output).unwrap();
    assert!(status.reacquired);
    assert_eq!(status.consumed, (N + CP) / 2);
    assert_eq!(acquisition.state(), AcquisitionState::Searching);

    let status = acquisition.process(&dc, &mut output).unwrap();
    assert_eq!(status.produced, 0);
    assert_eq!(status.consumed, N + CP);
    assert_eq!(status.tag, None);
    assert_eq!(acquisition.state(), AcquisitionState::Searching);

    // Lock again: the new tag points at the next output item
    let status = acquisition.process(&signal, &mut output).unwrap();
    assert_eq!(status.produced, 1);
    assert_eq!(
        status.tag,
        Some(StreamTag {
            offset: 3,
            key: SYNC_START
        })
    );
    assert!(acquisition.is_locked());
}

#[test]
fn test_reset_forgets_lock() {
    let signal = burst(params(N, CP, TONES), 4, DELAY, 2);
    let mut output = vec![Complex32::new(0.0, 0.0); N];
    let mut acquisition = SymbolAcquisition::new(clean_config()).unwrap();

    acquisition.process(&signal, &mut output).unwrap();
    assert!(acquisition.is_locked());
    assert!(acquisition.last_peak().is_some());

    acquisition.reset();
    assert_eq!(acquisition.state(), AcquisitionState::Searching);
    assert!(acquisition.last_peak().is_none());
    assert_eq!(acquisition.tracker().pending_increment(), None);
}
