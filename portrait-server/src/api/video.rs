//! `POST /image-to-video`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use portrait::{ComposeOptions, InputSource, MediaKind, OutputMode, OutputVideo};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

const DOWNLOAD_NAME: &str = "output_video.mp4";

/// Request body. Which input pair is required depends on the configured
/// input source.
#[derive(Debug, Default, Deserialize)]
pub struct ImageToVideoRequest {
    /// Image URL (`url` input source)
    #[serde(default)]
    pub image_url: Option<String>,

    /// Audio URL (`url` input source)
    #[serde(default)]
    pub audio_url: Option<String>,

    /// Base64 image (`base64` input source)
    #[serde(default)]
    pub image: Option<String>,

    /// Base64 audio (`base64` input source)
    #[serde(default)]
    pub audio: Option<String>,

    /// Target length in seconds, capped at the audio length (default 10)
    #[serde(default)]
    pub duration: Option<f64>,

    /// Volume multiplier (default 1.0)
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Body of a successful response in `base64` output mode.
#[derive(Debug, Serialize)]
pub struct ImageToVideoResponse {
    pub success: bool,
    pub message: String,
    pub video: String,
    pub mime_type: &'static str,
}

pub async fn image_to_video(
    State(state): State<AppState>,
    payload: Result<Json<ImageToVideoRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(json_rejection)?;

    let options = compose_options(&request, state.config.fps)?;
    info!(
        input = %state.config.input,
        output = %state.config.output,
        duration = ?options.duration,
        volume = options.volume,
        "image-to-video request"
    );

    let (image, audio) = acquire_inputs(&state, &request).await?;
    debug!(image_bytes = image.len(), audio_bytes = audio.len(), "inputs acquired");

    let video = run_encode(state.encode_slots.clone(), move || {
        portrait::compose_bytes(&image, &audio, &options)
    })
    .await?
    .map_err(|e| ApiError::from(e).context("Video creation failed"))?;

    info!(bytes = video.len(), "video ready");
    Ok(respond(state.config.output, video))
}

/// Run `job` on the blocking pool once an encode slot is free. The slot goes
/// with the job, so it stays taken until the job finishes even if the request
/// that started it is dropped.
async fn run_encode<T, F>(slots: Arc<Semaphore>, job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let permit = slots
        .acquire_owned()
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {e}")))?;

    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        job()
    })
    .await
    .map_err(|e| ApiError::internal(format!("Server error: {e}")))
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => ApiError::bad_request("No JSON data received"),
        other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => ApiError {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "Request body too large".into(),
            url: None,
        },
        other => ApiError::bad_request(format!("Invalid JSON: {}", other.body_text())),
    }
}

fn compose_options(request: &ImageToVideoRequest, fps: u32) -> Result<ComposeOptions, ApiError> {
    let mut options = ComposeOptions::new().fps(fps)?;
    if let Some(secs) = request.duration {
        options = options.duration(secs)?;
    }
    if let Some(volume) = request.volume {
        options = options.volume(volume)?;
    }
    Ok(options)
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn acquire_inputs(
    state: &AppState,
    request: &ImageToVideoRequest,
) -> Result<(Vec<u8>, Vec<u8>), ApiError> {
    match state.config.input {
        InputSource::Url => {
            let (Some(image_url), Some(audio_url)) =
                (present(&request.image_url), present(&request.audio_url))
            else {
                return Err(ApiError::bad_request(
                    "Missing required fields: 'image_url' and/or 'audio_url'",
                ));
            };
            let image = download(state, image_url, MediaKind::Image).await?;
            let audio = download(state, audio_url, MediaKind::Audio).await?;
            Ok((image, audio))
        }
        InputSource::Base64 => {
            let (Some(image), Some(audio)) = (present(&request.image), present(&request.audio))
            else {
                return Err(ApiError::bad_request(
                    "Missing required fields: 'image' and/or 'audio'",
                ));
            };
            let image = portrait::decode_base64(image, MediaKind::Image)?;
            let audio = portrait::decode_base64(audio, MediaKind::Audio)?;
            Ok((image, audio))
        }
    }
}

async fn download(state: &AppState, url: &str, kind: MediaKind) -> Result<Vec<u8>, ApiError> {
    portrait::fetch::download(url, kind, &state.fetch)
        .await
        .map_err(|e| {
            let mut err = ApiError::from(e).context(&format!("Failed to download {kind}"));
            err.url.get_or_insert_with(|| url.to_string());
            err
        })
}

fn respond(mode: OutputMode, video: Vec<u8>) -> Response {
    match mode {
        OutputMode::File => (
            [
                (header::CONTENT_TYPE, OutputVideo::MIME_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
                ),
            ],
            video,
        )
            .into_response(),
        OutputMode::Base64 => Json(ImageToVideoResponse {
            success: true,
            message: "Video created successfully".into(),
            video: base64::engine::general_purpose::STANDARD.encode(&video),
            mime_type: OutputVideo::MIME_TYPE,
        })
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_compose_options_defaults() {
        let opts = compose_options(&ImageToVideoRequest::default(), 24).unwrap();
        assert_eq!(opts.duration, Some(10.0));
        assert_eq!(opts.volume, 1.0);
        assert_eq!(opts.fps, 24);
    }

    #[test]
    fn test_compose_options_from_request() {
        let request = ImageToVideoRequest {
            duration: Some(5.0),
            volume: Some(0.5),
            ..Default::default()
        };
        let opts = compose_options(&request, 30).unwrap();
        assert_eq!(opts.duration, Some(5.0));
        assert_eq!(opts.volume, 0.5);
        assert_eq!(opts.fps, 30);
    }

    #[test]
    fn test_compose_options_rejects_bad_values() {
        let request = ImageToVideoRequest {
            volume: Some(-1.0),
            ..Default::default()
        };
        let err = compose_options(&request, 24).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let request = ImageToVideoRequest {
            duration: Some(0.0),
            ..Default::default()
        };
        assert!(compose_options(&request, 24).is_err());
    }

    #[test]
    fn test_present_ignores_blank() {
        assert_eq!(present(&Some("  http://x ".into())), Some("http://x"));
        assert_eq!(present(&Some("   ".into())), None);
        assert_eq!(present(&None), None);
    }

    #[tokio::test]
    async fn test_run_encode_returns_job_result() {
        let slots = Arc::new(Semaphore::new(1));
        let value = run_encode(slots.clone(), || 41 + 1).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(slots.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_dropped_request_keeps_encode_slot_until_job_ends() {
        let slots = Arc::new(Semaphore::new(1));
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let request = tokio::spawn(run_encode(slots.clone(), move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }));

        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // client went away: the handler future is dropped mid-encode
        request.abort();
        let _ = request.await;
        assert_eq!(slots.available_permits(), 0);

        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while slots.available_permits() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("slot released after the job finished");
    }
}
