//! Constellation Builder: STFT magnitude + prominence-based peak picking.
//!
//! Peak selection mirrors `scipy.signal.find_peaks(spectrum, prominence=0,
//! distance=200)`: local maxima, greedily suppressed by minimum distance,
//! then ranked by topographic prominence.

use ordered_float::OrderedFloat;
use rustfft::{num_complex::Complex32, FftPlanner};

use crate::error::FingerprintError;
use crate::signal::pad_to_multiple;

pub const WINDOW_SECONDS: f32 = 0.5;
pub const NUM_PEAKS_PER_FRAME: usize = 15;
pub const MIN_PEAK_DISTANCE_BINS: usize = 200;

/// A single time-frequency peak in a track's constellation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub frame_index: u32,
    pub frequency_hz: f32,
}

/// `window_samples = round(WINDOW_SECONDS * fs)`, forced to an even length.
pub fn window_samples_for(fs: u32) -> usize {
    let raw = (WINDOW_SECONDS * fs as f32).round() as usize;
    raw + (raw % 2)
}

fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos())
        })
        .collect()
}

/// Extracts the constellation of prominent peaks from mono samples.
///
/// `samples` must already be mono (downmixing is the caller's responsibility);
/// this function pads to a `window_samples`-multiple and runs a one-sided,
/// non-overlapping STFT over the padded signal.
pub fn extract(samples: &[f32], fs: u32) -> Result<Vec<Peak>, FingerprintError> {
    if samples.is_empty() {
        return Err(FingerprintError::EmptyAudio);
    }

    let window_len = window_samples_for(fs);
    if window_len == 0 {
        return Err(FingerprintError::InternalDspError(
            "computed a zero-length STFT window".into(),
        ));
    }

    let padded = pad_to_multiple(samples, window_len);
    if padded.is_empty() {
        return Err(FingerprintError::InternalDspError(
            "zero-length signal after padding".into(),
        ));
    }

    let window = hann_window(window_len);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_len);

    let one_sided_len = window_len / 2 + 1;
    let mut buffer = vec![Complex32::new(0.0, 0.0); window_len];
    let mut peaks = Vec::new();

    for (frame_index, chunk) in padded.chunks_exact(window_len).enumerate() {
        for (slot, (&sample, &w)) in buffer.iter_mut().zip(chunk.iter().zip(window.iter())) {
            *slot = Complex32::new(sample * w, 0.0);
        }
        fft.process(&mut buffer);

        let magnitude: Vec<f32> = buffer[..one_sided_len].iter().map(|c| c.norm()).collect();
        let frame_peaks = select_frame_peaks(&magnitude);

        for bin in frame_peaks {
            let frequency_hz = bin as f32 * fs as f32 / window_len as f32;
            peaks.push(Peak {
                frame_index: frame_index as u32,
                frequency_hz,
            });
        }
    }

    Ok(peaks)
}

/// Selects up to `NUM_PEAKS_PER_FRAME` bin indices, local maxima of
/// `magnitude` subject to `MIN_PEAK_DISTANCE_BINS` spacing, ranked by
/// prominence (ties broken by ascending bin index).
fn select_frame_peaks(magnitude: &[f32]) -> Vec<usize> {
    let n = magnitude.len();
    if n < 3 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = (1..n - 1)
        .filter(|&i| magnitude[i] > magnitude[i - 1] && magnitude[i] > magnitude[i + 1])
        .collect();

    // Enforce minimum spacing: greedily accept the tallest remaining
    // candidate, then drop any unaccepted candidate within distance of it.
    candidates.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(magnitude[i])));
    let mut accepted: Vec<usize> = Vec::new();
    for &i in &candidates {
        if accepted
            .iter()
            .all(|&a| i.abs_diff(a) >= MIN_PEAK_DISTANCE_BINS)
        {
            accepted.push(i);
        }
    }

    // Compute prominence for each accepted peak against the *original*
    // magnitude array (independent of which other candidates survived the
    // distance filter), scanning outward until a taller value or an edge.
    let mut scored: Vec<(usize, f32)> = accepted
        .into_iter()
        .map(|i| (i, prominence(magnitude, i)))
        .collect();

    // Largest prominence first; ties broken by ascending bin for determinism.
    scored.sort_by(|a, b| {
        OrderedFloat(b.1)
            .cmp(&OrderedFloat(a.1))
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(NUM_PEAKS_PER_FRAME);
    scored.sort_by_key(|&(i, _)| i);
    scored.into_iter().map(|(i, _)| i).collect()
}

/// Topographic prominence of the peak at `index`: its height minus the
/// higher of the two nearest valley floors reached while scanning outward
/// until a taller value or an array edge is hit.
fn prominence(magnitude: &[f32], index: usize) -> f32 {
    let height = magnitude[index];

    let mut left_min = height;
    let mut i = index;
    while i > 0 {
        i -= 1;
        left_min = left_min.min(magnitude[i]);
        if magnitude[i] > height {
            break;
        }
    }

    let mut right_min = height;
    let mut j = index;
    while j + 1 < magnitude.len() {
        j += 1;
        right_min = right_min.min(magnitude[j]);
        if magnitude[j] > height {
            break;
        }
    }

    height - left_min.max(right_min)
}
