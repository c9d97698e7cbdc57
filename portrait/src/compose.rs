use std::path::Path;

use tracing::{info, warn};

use crate::audio::{self, SourceAudio};
use crate::canvas::{self, SourceImage};
use crate::config::{ComposeOptions, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::encode::{self, EncodeJob};
use crate::error::{Error, Result};
use crate::scratch::ScratchDir;
use crate::types::OutputVideo;

/// Length of the composed video: the requested target capped at the audio
/// length, or the audio length when no target is given. The picture never
/// outlives the sound and the sound is never stretched past the request.
pub fn effective_duration(target: Option<f64>, audio_duration: f64) -> f64 {
    match target {
        Some(t) => t.min(audio_duration),
        None => audio_duration,
    }
}

/// Compose a still image and an audio clip into a 1080x1920 MP4 at `output`.
///
/// The image is letterboxed onto a black canvas, the audio is gain-adjusted
/// and trimmed or silence-padded to the effective duration, and both tracks
/// are muxed as H.264/AAC. On failure no file is left at `output`.
pub fn compose(
    image: SourceImage,
    mut audio: SourceAudio,
    options: &ComposeOptions,
    output: &Path,
) -> Result<OutputVideo> {
    options.validate()?;

    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidImage("invalid image dimensions".into()));
    }

    let audio_duration = audio.duration();
    if audio_duration <= 0.0 {
        return Err(Error::InvalidAudio("invalid audio file duration".into()));
    }

    let duration = effective_duration(options.duration, audio_duration);
    info!(
        requested = ?options.duration,
        audio_secs = format!("{audio_duration:.2}"),
        effective_secs = format!("{duration:.2}"),
        "composing portrait video"
    );

    let (canvas, _) = canvas::letterbox(&image, CANVAS_WIDTH, CANVAS_HEIGHT)?;
    drop(image);

    audio.apply_volume(options.volume);
    audio.fit_to_duration(duration);

    let scratch = ScratchDir::create("portrait-encode")?;
    let canvas_path = scratch.path().join("canvas.png");
    let audio_path = scratch.path().join("audio.f32");

    canvas
        .save(&canvas_path)
        .map_err(|e| Error::Encoding(format!("failed to write canvas: {e}")))?;
    drop(canvas);

    std::fs::write(&audio_path, audio.to_f32le_bytes())?;
    let (sample_rate, channels) = (audio.sample_rate(), audio.channels());
    drop(audio);

    let guard = OutputGuard::new(output);

    encode::mux(&EncodeJob {
        canvas_path: &canvas_path,
        audio_path: &audio_path,
        sample_rate,
        channels,
        duration,
        options,
        output,
    })?;

    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => {}
        _ => {
            return Err(Error::Encoding(
                "video file was not created successfully".into(),
            ))
        }
    }

    guard.disarm();
    info!(output = %output.display(), "video created");

    Ok(OutputVideo {
        path: output.to_path_buf(),
        duration,
        width: CANVAS_WIDTH,
        height: CANVAS_HEIGHT,
        fps: options.fps,
    })
}

/// Decode the two input files and compose them into `output`.
pub fn compose_files(
    image_path: &Path,
    audio_path: &Path,
    output: &Path,
    options: &ComposeOptions,
) -> Result<OutputVideo> {
    options.validate()?;
    let image = canvas::load_image(image_path)?;
    let audio = audio::load_audio(audio_path, options.duration)?;
    compose(image, audio, options, output)
}

/// Removes a partially written output file unless disarmed.
struct OutputGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> OutputGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to remove partial output");
            }
        }
    }
}
