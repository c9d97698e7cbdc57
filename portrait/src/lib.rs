//! Still image + audio in, portrait MP4 out.
//!
//! **portrait** letterboxes an image onto a black 1080x1920 canvas, adjusts
//! the gain of an audio clip, trims or silence-pads it to the requested
//! length, and muxes both into an H.264/AAC MP4. Audio decoding and video
//! encoding go through the system `ffmpeg`; the geometry and sample work is
//! done here.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use portrait::ComposeOptions;
//!
//! # fn main() -> portrait::Result<()> {
//! let opts = ComposeOptions::new().duration(5.0)?.volume(0.5)?;
//! let video = portrait::compose_files(
//!     "cover.png".as_ref(),
//!     "track.mp3".as_ref(),
//!     "out.mp4".as_ref(),
//!     &opts,
//! )?;
//! println!("{:.1}s at {}x{}", video.duration, video.width, video.height);
//! # Ok(())
//! # }
//! ```
//!
//! With the `fetch` feature (on by default), [`compose_urls`] downloads both
//! inputs first.

pub mod audio;
pub mod canvas;
pub mod compose;
pub mod config;
pub mod encode;
pub mod error;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod inline;
pub(crate) mod scratch;
#[cfg(test)]
pub(crate) mod test_support;
pub mod types;

pub use audio::SourceAudio;
pub use canvas::{Placement, SourceImage};
pub use compose::{compose, compose_files, effective_duration};
#[cfg(feature = "fetch")]
pub use config::FetchOptions;
pub use config::{ComposeOptions, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use error::{Error, Result};
pub use inline::decode_base64;
pub use types::{InputSource, MediaKind, OutputMode, OutputVideo};

use scratch::ScratchDir;

/// Compose from in-memory image and audio bytes and return the MP4 bytes.
///
/// Inputs and output live in a per-call temp directory that is removed on
/// every exit path.
pub fn compose_bytes(image: &[u8], audio: &[u8], options: &ComposeOptions) -> Result<Vec<u8>> {
    options.validate()?;

    let image = canvas::decode_image(image)?;
    if audio.is_empty() {
        return Err(Error::InvalidAudio("audio payload is empty".into()));
    }

    let scratch = ScratchDir::create("portrait")?;
    let audio_path = scratch.path().join("input_audio");
    std::fs::write(&audio_path, audio)?;
    let audio = audio::load_audio(&audio_path, options.duration)?;

    let output_path = scratch.path().join("output_video.mp4");
    compose::compose(image, audio, options, &output_path)?;

    Ok(std::fs::read(&output_path)?)
}

/// Download an image and an audio clip, compose them, and return the MP4 bytes.
///
/// Downloads are async; the encode itself runs on the calling thread. Servers
/// should download first and hand [`compose_bytes`] to a blocking pool.
#[cfg(feature = "fetch")]
pub async fn compose_urls(
    image_url: &str,
    audio_url: &str,
    options: &ComposeOptions,
    fetch: &FetchOptions,
) -> Result<Vec<u8>> {
    options.validate()?;

    let image = fetch::download(image_url, MediaKind::Image, fetch).await?;
    let audio = fetch::download(audio_url, MediaKind::Audio, fetch).await?;

    compose_bytes(&image, &audio, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ffmpeg_available;
    use crate::test_support::{png_bytes, sine_wav, TestDir};

    #[test]
    fn test_compose_bytes_rejects_corrupt_image() {
        let err = compose_bytes(b"nope", &sine_wav(22_050, 1.0, 0.5), &ComposeOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn test_compose_bytes_rejects_empty_audio() {
        let err = compose_bytes(&png_bytes(8, 8), &[], &ComposeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidAudio(_)));
    }

    #[test]
    fn test_compose_bytes_produces_mp4() {
        if !ffmpeg_available() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let opts = ComposeOptions::new().duration(1.0).unwrap();
        let video = compose_bytes(&png_bytes(120, 80), &sine_wav(22_050, 3.0, 0.5), &opts).unwrap();

        // ISO BMFF: box size then "ftyp"
        assert!(video.len() > 8);
        assert_eq!(&video[4..8], b"ftyp");

        let dir = TestDir::new("bytes_probe");
        let path = dir.path().join("out.mp4");
        std::fs::write(&path, &video).unwrap();
        let probed = encode::probe_duration(&path).unwrap();
        assert!((probed - 1.0).abs() < 0.15, "probed duration {probed}");
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_compose_urls_rejects_bad_scheme() {
        let err = compose_urls(
            "file:///tmp/a.png",
            "https://example.com/a.mp3",
            &ComposeOptions::default(),
            &FetchOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
