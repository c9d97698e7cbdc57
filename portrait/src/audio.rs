use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::encode;
use crate::error::{Error, Result};

/// Sample rate every input is resampled to before composition.
pub const SAMPLE_RATE: u32 = 44_100;

/// Channel count every input is mixed to before composition.
pub const CHANNELS: u16 = 2;

/// Maximum audio duration in seconds (1 hour).
/// 1 hour at 44.1kHz stereo f32 = ~1.3 GB, which is already more than a
/// single request should hold.
const MAX_AUDIO_DURATION_SECS: f64 = 3600.0;

/// Decoded PCM, interleaved `f32` in [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct SourceAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl SourceAudio {
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .copied()
            .map(f32::abs)
            .fold(0.0f32, f32::max)
    }

    /// Multiply every sample by `volume`.
    pub fn apply_volume(&mut self, volume: f32) {
        if (volume - 1.0).abs() < f32::EPSILON {
            return;
        }
        debug!(volume, "scaling audio");
        for s in self.samples.iter_mut() {
            *s *= volume;
        }
    }

    /// Truncate from t=0 or pad with silence so the clip lasts exactly `secs`.
    /// Never loops the source.
    pub fn fit_to_duration(&mut self, secs: f64) {
        let target_frames = (secs.max(0.0) * self.sample_rate as f64).round() as usize;
        let target_len = target_frames * self.channels as usize;
        let current_len = self.samples.len() - self.samples.len() % self.channels as usize;

        if target_len < current_len {
            debug!(from_frames = self.frames(), to_frames = target_frames, "truncating audio");
        } else if target_len > current_len {
            debug!(from_frames = self.frames(), to_frames = target_frames, "padding audio with silence");
        }
        self.samples.resize(target_len, 0.0);
    }

    /// Raw `f32le` bytes, the form the encoder reads.
    pub fn to_f32le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Load an audio file of any format ffmpeg understands and decode it to
/// 44.1kHz stereo `f32`.
///
/// With `limit` set, decoding stops after that many seconds so a long clip
/// paired with a short target is never held in memory in full. Without it the
/// whole clip is decoded, up to the one hour cap.
pub fn load_audio(path: &Path, limit: Option<f64>) -> Result<SourceAudio> {
    info!(path = %path.display(), limit = ?limit, "loading audio");

    if !path.exists() {
        return Err(Error::AudioNotFound {
            path: path.to_path_buf(),
        });
    }

    let samples = decode_with_ffmpeg(path, decode_limit(limit))?;
    let audio = SourceAudio::from_interleaved(samples, SAMPLE_RATE, CHANNELS);

    let duration = audio.duration();
    debug!(
        samples = audio.samples().len(),
        duration_secs = format!("{duration:.2}"),
        "decoded audio"
    );

    if duration > MAX_AUDIO_DURATION_SECS {
        return Err(Error::InvalidAudio(format!(
            "audio too long ({duration:.0}s), maximum supported duration is {MAX_AUDIO_DURATION_SECS:.0}s"
        )));
    }

    Ok(audio)
}

/// Seconds handed to ffmpeg's `-t`. One second past the cap is enough to tell
/// an over-long clip from one that fits.
fn decode_limit(limit: Option<f64>) -> f64 {
    let ceiling = MAX_AUDIO_DURATION_SECS + 1.0;
    limit.map_or(ceiling, |secs| secs.min(ceiling))
}

fn decode_args(path: &Path, limit_secs: f64) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nostdin", "-v", "error", "-threads", "0", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(path.into());
    args.extend(
        [
            "-t".to_string(),
            format!("{limit_secs:.3}"),
            "-vn".into(),
            "-f".into(),
            "f32le".into(),
            "-acodec".into(),
            "pcm_f32le".into(),
            "-ac".into(),
            CHANNELS.to_string(),
            "-ar".into(),
            SAMPLE_RATE.to_string(),
            "-".into(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

/// Decode via an ffmpeg subprocess. ffmpeg handles demuxing, decoding,
/// resampling and channel mixing in one shot and writes raw `f32le` to stdout.
fn decode_with_ffmpeg(path: &Path, limit_secs: f64) -> Result<Vec<f32>> {
    let output = Command::new("ffmpeg")
        .args(decode_args(path, limit_secs))
        .stdin(Stdio::null())
        .output()
        .map_err(encode::spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_truncated: String = stderr.chars().take(1000).collect();
        return Err(Error::InvalidAudio(format!(
            "failed to decode audio: {}",
            stderr_truncated.trim()
        )));
    }

    if output.stdout.len() < 4 {
        return Err(Error::InvalidAudio("audio has zero duration".into()));
    }

    let samples: Vec<f32> = output
        .stdout
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(samples)
}
