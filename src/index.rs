//! Index & Matcher: the inverted hash index, the track registry, and the
//! offset-histogram query scorer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constellation;
use crate::error::FingerprintError;
use crate::hashing;
use crate::signal;

/// `(anchor_frame_index, track_id)`, stored under a hash token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub anchor_frame: u32,
    pub track_id: u32,
}

/// Hash token → postings. Multiple tracks may share a hash; duplicate
/// postings for one track are permitted.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Index {
    postings: HashMap<u32, Vec<Posting>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, hash: u32, posting: Posting) {
        self.postings.entry(hash).or_default().push(posting);
    }

    pub fn get(&self, hash: u32) -> Option<&[Posting]> {
        self.postings.get(&hash).map(Vec::as_slice)
    }

    pub fn hash_count(&self) -> usize {
        self.postings.len()
    }
}

/// Dense `track_id -> label` table. IDs are assigned in ingestion order,
/// contiguous starting at 0, and never reused.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TrackRegistry {
    labels: Vec<String>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, label: String) -> u32 {
        let id = self.labels.len() as u32;
        self.labels.push(label);
        id
    }

    pub fn label(&self, track_id: u32) -> Option<&str> {
        self.labels.get(track_id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One track's rank in a query response: its id, label, the winning time
/// offset, and the vote count that offset received.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTrack {
    pub track_id: u32,
    pub label: String,
    pub offset: i64,
    pub count: usize,
}

/// Extracts a constellation + query hashes from possibly multi-channel
/// samples: downmix, then constellation extraction, then hashing.
/// `track_id = None` marks this as the query-side hash set.
fn fingerprint(
    samples: &[f32],
    channels: u16,
    fs: u32,
    track_id: Option<u32>,
) -> Result<HashMap<u32, hashing::HashValue>, FingerprintError> {
    let mono = signal::to_mono(samples, channels)?;
    let peaks = constellation::extract(&mono, fs)?;
    Ok(hashing::hashes(&peaks, track_id))
}

/// Builds an `Index` + `TrackRegistry` from a set of tracks in one pass.
///
/// Ingestion of any single track is fatal to the whole batch — the caller is
/// expected to discard the partial result on `Err` rather than adopt it as a
/// snapshot.
pub fn build_index(
    tracks: &[(String, Vec<f32>, u16, u32)],
) -> Result<(Index, TrackRegistry), FingerprintError> {
    let mut index = Index::new();
    let mut registry = TrackRegistry::new();

    for (label, samples, channels, fs) in tracks {
        let track_id = registry.push(label.clone());
        let hashes = fingerprint(samples, *channels, *fs, Some(track_id))?;
        for (hash, value) in hashes {
            index.insert(
                hash,
                Posting {
                    anchor_frame: value.anchor_frame,
                    track_id: value.track_id,
                },
            );
        }
    }

    Ok((index, registry))
}

/// The query-time matcher state machine.
///
/// `Empty` until a snapshot is loaded; `Loaded` holds an immutable index and
/// registry that query handlers read without locking. There is no
/// transition back to `Empty` short of process restart.
pub enum Matcher {
    Empty,
    Loaded {
        index: Index,
        registry: TrackRegistry,
    },
}

impl Matcher {
    pub fn empty() -> Self {
        Matcher::Empty
    }

    pub fn loaded(index: Index, registry: TrackRegistry) -> Self {
        Matcher::Loaded { index, registry }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Matcher::Loaded { .. })
    }

    pub fn track_count(&self) -> usize {
        match self {
            Matcher::Empty => 0,
            Matcher::Loaded { registry, .. } => registry.len(),
        }
    }

    /// Scores a query recording against the loaded index.
    pub fn score(
        &self,
        query_samples: &[f32],
        channels: u16,
        fs: u32,
    ) -> Result<Vec<ScoredTrack>, FingerprintError> {
        let (index, registry) = match self {
            Matcher::Empty => return Err(FingerprintError::NotReady),
            Matcher::Loaded { index, registry } => (index, registry),
        };

        let query_hashes = fingerprint(query_samples, channels, fs, None)?;

        // counts[track_id][offset] = votes
        let mut counts: HashMap<u32, HashMap<i64, usize>> = HashMap::new();
        for (hash, query_value) in &query_hashes {
            let Some(postings) = index.get(*hash) else {
                continue;
            };
            for posting in postings {
                let offset = posting.anchor_frame as i64 - query_value.anchor_frame as i64;
                *counts
                    .entry(posting.track_id)
                    .or_default()
                    .entry(offset)
                    .or_default() += 1;
            }
        }

        let mut scored: Vec<ScoredTrack> = counts
            .into_iter()
            .filter_map(|(track_id, histogram)| {
                let (best_offset, best_count) = histogram
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))?;
                let label = registry.label(track_id)?.to_string();
                Some(ScoredTrack {
                    track_id,
                    label,
                    offset: best_offset,
                    count: best_count,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.track_id.cmp(&b.track_id)));
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, fs: u32, duration_secs: f32) -> Vec<f32> {
        let n = (fs as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / fs as f32).sin())
            .collect()
    }

    #[test]
    fn empty_matcher_rejects_queries() {
        let matcher = Matcher::empty();
        let result = matcher.score(&[0.0, 0.1], 1, 16_000);
        assert!(matches!(result, Err(FingerprintError::NotReady)));
    }

    #[test]
    fn self_match_dominates() {
        let fs = 16_000;
        let track = sine(440.0, fs, 5.0);
        let (index, registry) =
            build_index(&[("A".to_string(), track.clone(), 1, fs)]).unwrap();
        let matcher = Matcher::loaded(index, registry);

        let total_hashes = {
            let mono = signal::to_mono(&track, 1).unwrap();
            let peaks = constellation::extract(&mono, fs).unwrap();
            hashing::hashes(&peaks, Some(0)).len()
        };

        let scores = matcher.score(&track, 1, fs).unwrap();
        assert_eq!(scores[0].label, "A");
        assert_eq!(scores[0].offset, 0);
        assert!(scores[0].count as f32 >= 0.5 * total_hashes as f32);
    }

    #[test]
    fn unrelated_track_scores_below_self_match() {
        let fs = 16_000;
        let a = sine(440.0, fs, 5.0);
        let b = sine(880.0, fs, 5.0);

        let (index_a, registry_a) = build_index(&[("A".to_string(), a.clone(), 1, fs)]).unwrap();
        let self_score = Matcher::loaded(index_a, registry_a)
            .score(&a, 1, fs)
            .unwrap();
        let self_count = self_score[0].count;

        let (index_b, registry_b) = build_index(&[("B".to_string(), b, 1, fs)]).unwrap();
        let cross_score = Matcher::loaded(index_b, registry_b).score(&a, 1, fs).unwrap();
        let cross_count = cross_score.first().map(|s| s.count).unwrap_or(0);

        assert!(cross_count < self_count);
    }

    #[test]
    fn stereo_duplicate_matches_mono_original() {
        let fs = 16_000;
        let mono_track = sine(440.0, fs, 3.0);
        let stereo_track: Vec<f32> = mono_track.iter().flat_map(|&s| [s, s]).collect();

        let (index, registry) = build_index(&[
            ("mono".to_string(), mono_track.clone(), 1, fs),
            ("stereo".to_string(), stereo_track, 2, fs),
        ])
        .unwrap();
        let matcher = Matcher::loaded(index, registry);

        let scores = matcher.score(&mono_track, 1, fs).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].count, scores[1].count);
        // Deterministic tie-break: ascending track_id ("mono" ingested first).
        assert_eq!(scores[0].label, "mono");
        assert_eq!(scores[1].label, "stereo");
    }
}
