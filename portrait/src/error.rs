use std::path::PathBuf;

/// All errors that can occur in portrait.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image file not found: {path}")]
    ImageNotFound { path: PathBuf },

    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    #[error("audio file not found: {path}")]
    AudioNotFound { path: PathBuf },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("ffmpeg not found (install with: apt install ffmpeg)")]
    FfmpegNotFound,

    #[cfg(feature = "fetch")]
    #[error("download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "fetch")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by what the caller supplied rather than by
    /// the host (missing ffmpeg, I/O, encoder failures).
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::InvalidImage(_)
            | Error::InvalidAudio(_)
            | Error::InvalidOption(_)
            | Error::InvalidInput(_)
            | Error::ImageNotFound { .. }
            | Error::AudioNotFound { .. } => true,
            #[cfg(feature = "fetch")]
            Error::Download { .. } => true,
            _ => false,
        }
    }

    /// The offending URL, for download failures.
    pub fn url(&self) -> Option<&str> {
        match self {
            #[cfg(feature = "fetch")]
            Error::Download { url, .. } => Some(url.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
