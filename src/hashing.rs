//! Hash Generator: combinatorial 32-bit tokens from pairs of peaks.
//!
//! Bit layout:
//!
//! ```text
//! bits [ 0..10) freq_anchor_bin
//! bits [10..20) freq_target_bin
//! bits [20..32) frame_delta
//! ```

use std::collections::HashMap;

use crate::constellation::Peak;

const UPPER_FREQUENCY_HZ: f32 = 23_000.0;
const FREQUENCY_BINS: u32 = 1024;
const FREQUENCY_BIN_MASK: u32 = FREQUENCY_BINS - 1;
const MAX_TARGET_LOOKAHEAD: usize = 100;
const MIN_DELTA: u32 = 2;
const MAX_DELTA: u32 = 10;

/// A hash token's anchor time and originating track.
///
/// `track_id` is `0` as a sentinel for query-side hashes, where it is never
/// read back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashValue {
    pub anchor_frame: u32,
    pub track_id: u32,
}

/// Quantizes a frequency in Hz into a clamped 10-bit bin index.
///
/// Frequencies above the Nyquist-adjacent 23 kHz ceiling are clamped to the
/// top bin rather than masked, so they never wrap around into an unrelated
/// low bin.
pub fn freq_to_bin(freq_hz: f32) -> u32 {
    let raw = (freq_hz / UPPER_FREQUENCY_HZ * FREQUENCY_BINS as f32).floor();
    if raw < 0.0 {
        0
    } else if raw as u32 > FREQUENCY_BIN_MASK {
        FREQUENCY_BIN_MASK
    } else {
        raw as u32
    }
}

/// Packs an (anchor bin, target bin, frame delta) triple into a 32-bit hash.
pub fn pack(anchor_bin: u32, target_bin: u32, delta: u32) -> u32 {
    debug_assert!(anchor_bin <= FREQUENCY_BIN_MASK);
    debug_assert!(target_bin <= FREQUENCY_BIN_MASK);
    debug_assert!((MIN_DELTA..=MAX_DELTA).contains(&delta));
    (anchor_bin & FREQUENCY_BIN_MASK)
        | ((target_bin & FREQUENCY_BIN_MASK) << 10)
        | (delta << 20)
}

/// Inverse of `pack`, used by the packing-law test.
pub fn unpack(hash: u32) -> (u32, u32, u32) {
    let anchor_bin = hash & FREQUENCY_BIN_MASK;
    let target_bin = (hash >> 10) & FREQUENCY_BIN_MASK;
    let delta = hash >> 20;
    (anchor_bin, target_bin, delta)
}

/// Generates combinatorial hashes from a (frame-sorted) constellation.
///
/// Each peak is paired, as an anchor, with up to the next 100 peaks as
/// targets; pairs whose frame delta falls outside `[2, 10]` are dropped.
/// Later anchors overwrite earlier ones under a hash collision
/// (last-writer-wins) — this is a `HashMap` insert, not an `entry`, so
/// iteration order over `constellation` alone determines the outcome.
pub fn hashes(constellation: &[Peak], track_id: Option<u32>) -> HashMap<u32, HashValue> {
    let track_id = track_id.unwrap_or(0);
    let mut out = HashMap::new();

    for (i, anchor) in constellation.iter().enumerate() {
        let anchor_bin = freq_to_bin(anchor.frequency_hz);
        let end = (i + 1 + MAX_TARGET_LOOKAHEAD).min(constellation.len());

        for target in &constellation[i + 1..end] {
            let delta = target.frame_index.saturating_sub(anchor.frame_index);
            if delta < MIN_DELTA || delta > MAX_DELTA {
                continue;
            }
            let target_bin = freq_to_bin(target.frequency_hz);
            let hash = pack(anchor_bin, target_bin, delta);
            out.insert(
                hash,
                HashValue {
                    anchor_frame: anchor.frame_index,
                    track_id,
                },
            );
        }
    }

    out
}
