//! Signal Conditioner: mono downmix and window-multiple padding.

use crate::error::FingerprintError;

/// Reduces interleaved multi-channel PCM to mono by arithmetic mean across
/// channels. A mono input (`channels == 1`) is returned unchanged, which is
/// what makes `to_mono` idempotent.
pub fn to_mono(samples: &[f32], channels: u16) -> Result<Vec<f32>, FingerprintError> {
    if samples.is_empty() {
        return Err(FingerprintError::EmptyAudio);
    }
    if channels <= 1 {
        return Ok(samples.to_vec());
    }

    let channels = channels as usize;
    Ok(samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect())
}

/// Appends trailing zero samples so the result's length is an exact multiple
/// of `window_len`. The original samples are always a prefix of the result.
pub fn pad_to_multiple(samples: &[f32], window_len: usize) -> Vec<f32> {
    if window_len == 0 {
        return samples.to_vec();
    }
    let remainder = samples.len() % window_len;
    let pad_amount = (window_len - remainder) % window_len;

    let mut padded = Vec::with_capacity(samples.len() + pad_amount);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + pad_amount, 0.0);
    padded
}
