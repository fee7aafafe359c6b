//! Complex baseband WAV files
//!
//! I/Q recordings are stored as two-channel WAV, in-phase on the left and
//! quadrature on the right. Files are written as 32-bit float; reading also
//! accepts 16-bit PCM, scaled to [-1, 1).

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use num::complex::Complex32;
use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum IqError {
    #[snafu(display("cannot create {}", path.display()))]
    Create { path: PathBuf, source: hound::Error },

    #[snafu(display("cannot open {}", path.display()))]
    Open { path: PathBuf, source: hound::Error },

    #[snafu(display("error writing {}", path.display()))]
    Write { path: PathBuf, source: hound::Error },

    #[snafu(display("error reading {}", path.display()))]
    Read { path: PathBuf, source: hound::Error },

    #[snafu(display("{} has {channels} channel(s), I/Q needs 2", path.display()))]
    NotStereo { path: PathBuf, channels: u16 },

    #[snafu(display("{}: unsupported {bits}-bit {format:?} samples", path.display()))]
    UnsupportedFormat {
        path: PathBuf,
        bits: u16,
        format: SampleFormat,
    },
}

/// Samples and rate loaded from an I/Q file
#[derive(Debug, Clone, PartialEq)]
pub struct IqRecording {
    pub sample_rate: u32,
    pub samples: Vec<Complex32>,
}

pub fn write_iq(path: impl AsRef<Path>, samples: &[Complex32], sample_rate: u32) -> Result<(), IqError> {
    let path = path.as_ref();
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).context(CreateSnafu { path })?;
    for sample in samples {
        writer.write_sample(sample.re).context(WriteSnafu { path })?;
        writer.write_sample(sample.im).context(WriteSnafu { path })?;
    }
    writer.finalize().context(WriteSnafu { path })?;
    Ok(())
}

pub fn read_iq(path: impl AsRef<Path>) -> Result<IqRecording, IqError> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path).context(OpenSnafu { path })?;
    let spec = reader.spec();

    ensure!(
        spec.channels == 2,
        NotStereoSnafu {
            path,
            channels: spec.channels
        }
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context(ReadSnafu { path })?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()
            .context(ReadSnafu { path })?,
        (format, bits) => {
            return UnsupportedFormatSnafu { path, bits, format }.fail();
        }
    };

    let samples = interleaved
        .chunks_exact(2)
        .map(|pair| Complex32::new(pair[0], pair[1]))
        .collect();

    Ok(IqRecording {
        sample_rate: spec.sample_rate,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rustyofdm_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_float_iq_survives_file() {
        let path = temp_path("float");
        let samples: Vec<Complex32> = (0..100)
            .map(|i| Complex32::new(i as f32 * 0.01, -(i as f32) * 0.02))
            .collect();

        write_iq(&path, &samples, 8_000_000).unwrap();
        let recording = read_iq(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(recording.sample_rate, 8_000_000);
        assert_eq!(recording.samples, samples);
    }

    #[test]
    fn test_pcm_iq_is_scaled() {
        let path = temp_path("pcm");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-32768i16).unwrap();
        writer.finalize().unwrap();

        let recording = read_iq(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(recording.samples, vec![Complex32::new(0.5, -1.0)]);
    }

    #[test]
    fn test_mono_is_rejected() {
        let path = temp_path("mono");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let result = read_iq(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(IqError::NotStereo { channels: 1, .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = read_iq(temp_path("does_not_exist"));
        assert!(matches!(result, Err(IqError::Open { .. })));
    }
}
