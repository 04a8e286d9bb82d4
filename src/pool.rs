//! Bridges the CPU-bound DSP/match path onto the `rayon` global thread pool
//! so the async I/O reactor never blocks on FFT or scoring work.

use tokio::sync::oneshot;

use crate::error::FingerprintError;

/// Runs `work` on the global `rayon` thread pool (sized by `rayon` to
/// `std::thread::available_parallelism()` unless overridden) and awaits its
/// result without blocking the calling async task's executor thread.
///
/// This is the only suspension point between the HTTP handler and the
/// DSP/match path — the closure itself never `.await`s.
pub async fn run_blocking<F, T>(work: F) -> Result<T, FingerprintError>
where
    F: FnOnce() -> Result<T, FingerprintError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    rayon::spawn(move || {
        let result = work();
        // Dropped receiver means the client disconnected before the
        // response was written; the worker still finishes but nothing
        // reads the result.
        let _ = tx.send(result);
    });

    rx.await
        .map_err(|_| FingerprintError::InternalDspError("worker task was dropped".into()))?
}
