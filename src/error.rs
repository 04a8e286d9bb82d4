use thiserror::Error;

/// Errors surfaced by the DSP pipeline and the matcher.
///
/// This is the only error type that crosses module boundaries inside the
/// fingerprinting core; the HTTP layer maps each variant to a status code at
/// the handler edge.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("audio input is empty")]
    EmptyAudio,

    #[error("failed to decode WAV audio: {0}")]
    DecodeFailure(String),

    #[error("no snapshot loaded; matcher is not ready")]
    NotReady,

    #[error("snapshot on disk is corrupt: {0}")]
    SnapshotCorrupt(String),

    #[error("internal DSP error: {0}")]
    InternalDspError(String),

    #[error("temp file I/O failed: {0}")]
    TempFileIo(#[from] std::io::Error),
}
