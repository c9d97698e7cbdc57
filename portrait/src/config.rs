#[cfg(feature = "fetch")]
use std::time::Duration;

use crate::error::Error;

/// Output frame width (9:16 portrait).
pub const CANVAS_WIDTH: u32 = 1080;

/// Output frame height (9:16 portrait).
pub const CANVAS_HEIGHT: u32 = 1920;

/// Target duration applied when the caller does not ask for one.
pub const DEFAULT_DURATION_SECS: f64 = 10.0;

/// Frame rate of the still-frame video track.
pub const DEFAULT_FPS: u32 = 24;

/// Highest accepted frame rate.
pub const MAX_FPS: u32 = 120;

/// Options for a single composition.
///
/// The defaults produce a 10 second, 24 fps H.264/AAC MP4 at unity gain.
/// Setters that take caller-supplied numbers validate them and return a
/// `Result`, the rest are plain builders.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Linear gain applied to every audio sample. `0.0` mutes the clip.
    pub volume: f32,
    /// Requested output length in seconds. `None` follows the audio length;
    /// `Some(t)` is capped at the audio length.
    pub duration: Option<f64>,
    /// Frame rate of the still-frame video track.
    pub fps: u32,
    /// Target video bitrate passed to the encoder (e.g. "2000k").
    pub video_bitrate: String,
    /// AAC bitrate (e.g. "192k").
    pub audio_bitrate: String,
    /// x264 speed/quality preset.
    pub preset: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            volume: 1.0,
            duration: Some(DEFAULT_DURATION_SECS),
            fps: DEFAULT_FPS,
            video_bitrate: "2000k".into(),
            audio_bitrate: "192k".into(),
            preset: "medium".into(),
        }
    }
}

impl ComposeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the volume multiplier. Must be finite and non-negative.
    pub fn volume(mut self, volume: f32) -> Result<Self, Error> {
        check_volume(volume)?;
        self.volume = volume;
        Ok(self)
    }

    /// Set the target duration in seconds. Must be finite and positive.
    pub fn duration(mut self, secs: f64) -> Result<Self, Error> {
        check_duration(secs)?;
        self.duration = Some(secs);
        Ok(self)
    }

    /// Use the full length of the audio clip instead of a fixed target.
    pub fn full_length(mut self) -> Self {
        self.duration = None;
        self
    }

    pub fn fps(mut self, fps: u32) -> Result<Self, Error> {
        check_fps(fps)?;
        self.fps = fps;
        Ok(self)
    }

    pub fn video_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.video_bitrate = bitrate.into();
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Re-check every invariant. Fields are public, so the composer calls this
    /// before doing any work.
    pub fn validate(&self) -> Result<(), Error> {
        check_volume(self.volume)?;
        if let Some(secs) = self.duration {
            check_duration(secs)?;
        }
        check_fps(self.fps)?;
        if self.video_bitrate.trim().is_empty() || self.audio_bitrate.trim().is_empty() {
            return Err(Error::InvalidOption("bitrate must not be empty".into()));
        }
        Ok(())
    }
}

fn check_volume(volume: f32) -> Result<(), Error> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(Error::InvalidOption(format!(
            "volume must be a non-negative number, got {volume}"
        )));
    }
    Ok(())
}

fn check_duration(secs: f64) -> Result<(), Error> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::InvalidOption(format!(
            "duration must be greater than zero, got {secs}"
        )));
    }
    Ok(())
}

fn check_fps(fps: u32) -> Result<(), Error> {
    if fps == 0 || fps > MAX_FPS {
        return Err(Error::InvalidOption(format!(
            "fps must be between 1 and {MAX_FPS}, got {fps}"
        )));
    }
    Ok(())
}

/// Options for fetching inputs over HTTP(S).
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Whole-request timeout, per attempt.
    pub timeout: Duration,
    /// Verify TLS certificates. Turning this off is only meant for
    /// development against self-signed hosts.
    pub verify_ssl: bool,
    /// Largest accepted response body.
    pub max_bytes: u64,
    /// Extra attempts after a transient failure. `0` means a single attempt.
    pub retries: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

#[cfg(feature = "fetch")]
impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            verify_ssl: true,
            max_bytes: 100 * 1024 * 1024,
            retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[cfg(feature = "fetch")]
impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verify_ssl(mut self, enabled: bool) -> Self {
        self.verify_ssl = enabled;
        self
    }

    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}
