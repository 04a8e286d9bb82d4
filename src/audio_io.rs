//! WAV decoding and sample normalization.

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::error::FingerprintError;

/// A decoded WAV file: normalized `f32` samples in `[-1.0, 1.0]`, the
/// channel count, and the sample rate read from the header.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

pub fn load_wav_file(path: &Path) -> Result<DecodedAudio, FingerprintError> {
    let reader = WavReader::open(path)
        .map_err(|e| FingerprintError::DecodeFailure(format!("{}: {e}", path.display())))?;
    decode(reader)
}

pub fn load_wav_reader<R: Read>(source: R) -> Result<DecodedAudio, FingerprintError> {
    let reader = WavReader::new(source)
        .map_err(|e| FingerprintError::DecodeFailure(e.to_string()))?;
    decode(reader)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<DecodedAudio, FingerprintError> {
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| FingerprintError::DecodeFailure(e.to_string()))?,
        SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
                .collect::<Result<_, _>>()
                .map_err(|e| FingerprintError::DecodeFailure(e.to_string()))?,
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / (1 << 23) as f32))
                .collect::<Result<_, _>>()
                .map_err(|e| FingerprintError::DecodeFailure(e.to_string()))?,
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / i32::MAX as f32))
                .collect::<Result<_, _>>()
                .map_err(|e| FingerprintError::DecodeFailure(e.to_string()))?,
            other => {
                return Err(FingerprintError::DecodeFailure(format!(
                    "unsupported bit depth: {other}"
                )))
            }
        },
    };

    if samples.is_empty() {
        return Err(FingerprintError::EmptyAudio);
    }

    Ok(DecodedAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}
