//! HTTP surface: `POST /shazam` (identify a recording) and `GET /healthz`.

use std::io::Write;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::audio_io;
use crate::error::FingerprintError;
use crate::index::Matcher;
use crate::pool;

#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<Matcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/shazam", post(shazam))
        .with_state(state)
}

/// `200 OK` once the matcher has a snapshot loaded, `503` otherwise — the
/// ambient readiness probe a production deployment needs, not a query.
async fn healthz(State(state): State<AppState>) -> Response {
    if state.matcher.is_loaded() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// `[track_label, [offset, count]]` per entry, matching the JSON shape
/// `{"scores": [[label, [offset, count]], ...]}`.
#[derive(Debug, Serialize)]
struct ShazamResponse {
    scores: Vec<(String, (i64, usize))>,
}

/// Accepts a single `file` multipart field holding WAV bytes, writes it to a
/// scratch temp file (deleted on every exit path via `NamedTempFile`'s RAII
/// drop), decodes it, and scores it against the loaded matcher.
async fn shazam(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload: Option<NamedTempFile> = None;

    // Only the first `file` field is used, but every field must still be
    // read to completion so the multipart stream is fully drained.
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError(FingerprintError::DecodeFailure(e.to_string())))?
    {
        if field.name() != Some("file") || upload.is_some() {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError(FingerprintError::DecodeFailure(e.to_string())))?;

        let mut file = NamedTempFile::new().map_err(FingerprintError::TempFileIo)?;
        file.write_all(&bytes).map_err(FingerprintError::TempFileIo)?;
        file.flush().map_err(FingerprintError::TempFileIo)?;
        upload = Some(file);
    }

    let Some(upload) = upload else {
        return Ok((StatusCode::BAD_REQUEST, "missing \"file\" field").into_response());
    };

    let path = upload.path().to_path_buf();
    let matcher = state.matcher;

    let scores = pool::run_blocking(move || {
        let decoded = audio_io::load_wav_file(&path)?;
        matcher.score(&decoded.samples, decoded.channels, decoded.sample_rate)
    })
    .await?;

    let body = ShazamResponse {
        scores: scores
            .into_iter()
            .map(|s| (s.label, (s.offset, s.count)))
            .collect(),
    };
    Ok(Json(body).into_response())
}

struct AppError(FingerprintError);

impl From<FingerprintError> for AppError {
    fn from(err: FingerprintError) -> Self {
        AppError(err)
    }
}

/// Maps a `FingerprintError` to an HTTP status. The only place this mapping
/// happens — the core DSP/matcher path never constructs a status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FingerprintError::EmptyAudio | FingerprintError::DecodeFailure(_) => {
                StatusCode::BAD_REQUEST
            }
            FingerprintError::NotReady => StatusCode::INTERNAL_SERVER_ERROR,
            FingerprintError::SnapshotCorrupt(_) | FingerprintError::InternalDspError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            FingerprintError::TempFileIo(_) => {
                tracing::error!(error = %self.0, "temp file I/O failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;

    fn sine(freq: f32, fs: u32, duration_secs: f32) -> Vec<f32> {
        let n = (fs as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / fs as f32).sin())
            .collect()
    }

    #[test]
    fn not_ready_maps_to_500() {
        let err = AppError(FingerprintError::NotReady);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_audio_maps_to_400() {
        let err = AppError(FingerprintError::EmptyAudio);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn healthz_reports_unready_before_load() {
        let state = AppState {
            matcher: Arc::new(Matcher::empty()),
        };
        let response = healthz(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthz_reports_ok_once_loaded() {
        let fs = 8_000;
        let track = sine(440.0, fs, 1.0);
        let (index, registry) = build_index(&[("A".to_string(), track, 1, fs)]).unwrap();
        let state = AppState {
            matcher: Arc::new(Matcher::loaded(index, registry)),
        };
        let response = healthz(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn app_state_carries_loaded_matcher() {
        let fs = 8_000;
        let track = sine(440.0, fs, 1.0);
        let (index, registry) = build_index(&[("A".to_string(), track, 1, fs)]).unwrap();
        let state = AppState {
            matcher: Arc::new(Matcher::loaded(index, registry)),
        };
        assert!(state.matcher.is_loaded());
        assert_eq!(state.matcher.track_count(), 1);
    }

    fn wav_bytes(samples: &[f32], fs: u32) -> Vec<u8> {
        use hound::{SampleFormat, WavSpec, WavWriter};
        use std::io::Cursor;

        let spec = WavSpec {
            channels: 1,
            sample_rate: fs,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    /// A second multipart field (another `file`, arriving after the first is
    /// already captured) must still be drained rather than left unread — the
    /// handler must not error or hang when extra fields follow the one used.
    #[tokio::test]
    async fn shazam_drains_fields_after_the_first_file_is_captured() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;

        let fs = 8_000;
        let track = sine(440.0, fs, 1.0);
        let (index, registry) = build_index(&[("A".to_string(), track.clone(), 1, fs)]).unwrap();
        let state = AppState {
            matcher: Arc::new(Matcher::loaded(index, registry)),
        };

        let boundary = "XBOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"a.wav\"\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&wav_bytes(&track, fs));
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"b.wav\"\r\n\r\nnot a wav\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );

        let request = Request::builder()
            .method("POST")
            .uri("/shazam")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let multipart = Multipart::from_request(request, &state).await.unwrap();
        let response = shazam(State(state), multipart)
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
