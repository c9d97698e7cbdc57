use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ComposeOptions;
use crate::error::{Error, Result};

/// Inputs for one mux run. The canvas is a still PNG; the audio is raw
/// interleaved `f32le` already trimmed/padded to `duration`.
pub(crate) struct EncodeJob<'a> {
    pub canvas_path: &'a Path,
    pub audio_path: &'a Path,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: f64,
    pub options: &'a ComposeOptions,
    pub output: &'a Path,
}

/// Whether an `ffmpeg` binary can be spawned from PATH.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Build the ffmpeg argument list for a still-frame H.264 + AAC MP4.
fn mux_args(job: &EncodeJob<'_>) -> Vec<OsString> {
    let fps = job.options.fps.to_string();
    let duration = format!("{:.3}", job.duration);
    let sample_rate = job.sample_rate.to_string();
    let channels = job.channels.to_string();

    let mut args: Vec<OsString> = Vec::new();
    extend(&mut args, &["-nostdin", "-y", "-v", "error"]);

    // Input 0: the canvas held as a looping still.
    extend(&mut args, &["-loop", "1", "-framerate", &fps, "-i"]);
    args.push(job.canvas_path.into());

    // Input 1: processed PCM.
    extend(&mut args, &["-f", "f32le", "-ar", &sample_rate, "-ac", &channels, "-i"]);
    args.push(job.audio_path.into());

    extend(
        &mut args,
        &[
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "libx264",
            "-preset",
            &job.options.preset,
            "-tune",
            "stillimage",
            "-pix_fmt",
            "yuv420p",
            "-r",
            &fps,
            "-b:v",
            &job.options.video_bitrate,
            "-c:a",
            "aac",
            "-b:a",
            &job.options.audio_bitrate,
            "-t",
            &duration,
            "-movflags",
            "+faststart",
        ],
    );
    args.push(job.output.into());
    args
}

fn extend(args: &mut Vec<OsString>, values: &[&str]) {
    args.extend(values.iter().map(OsString::from));
}

/// Encode and mux the still canvas and the audio into an MP4 at `job.output`.
///
/// The encoder is not retried; its stderr is surfaced in the error.
pub(crate) fn mux(job: &EncodeJob<'_>) -> Result<()> {
    info!(
        output = %job.output.display(),
        duration_secs = format!("{:.2}", job.duration),
        fps = job.options.fps,
        "encoding video"
    );

    let args = mux_args(job);
    debug!(?args, "spawning ffmpeg");

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .map_err(spawn_error)?;

    if !output.status.success() {
        return Err(Error::Encoding(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr_excerpt(&output.stderr)
        )));
    }

    Ok(())
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Container duration in seconds, as reported by ffprobe.
pub fn probe_duration(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .arg(path)
        .output()
        .map_err(spawn_error)?;

    if !output.status.success() {
        return Err(Error::Encoding(format!(
            "ffprobe failed: {}",
            stderr_excerpt(&output.stderr)
        )));
    }

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| Error::Encoding("ffprobe reported no duration".into()))
}

pub(crate) fn spawn_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::FfmpegNotFound
    } else {
        Error::Encoding(format!("failed to run ffmpeg: {e}"))
    }
}

/// The tail of ffmpeg's stderr, where the actual error usually is.
fn stderr_excerpt(stderr: &[u8]) -> String {
    const LIMIT: usize = 1000;
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= LIMIT {
        text.to_string()
    } else {
        text.chars().skip(count - LIMIT).collect()
    }
}
