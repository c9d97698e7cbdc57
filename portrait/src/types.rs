use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which of the two inputs a payload is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How request inputs reach the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// `image_url` / `audio_url` fields, fetched over HTTP(S).
    #[default]
    Url,
    /// `image` / `audio` fields carrying base64 payloads.
    Base64,
}

impl FromStr for InputSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "url" => Ok(InputSource::Url),
            "base64" | "inline" => Ok(InputSource::Base64),
            _ => Err(format!("unknown input source \"{s}\" (expected url or base64)")),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Url => write!(f, "url"),
            InputSource::Base64 => write!(f, "base64"),
        }
    }
}

/// How the finished video is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Raw MP4 bytes as a file download.
    #[default]
    File,
    /// MP4 bytes base64-encoded inside a JSON envelope.
    Base64,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(OutputMode::File),
            "base64" | "json" => Ok(OutputMode::Base64),
            _ => Err(format!("unknown output mode \"{s}\" (expected file or base64)")),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::File => write!(f, "file"),
            OutputMode::Base64 => write!(f, "base64"),
        }
    }
}

/// Description of a video written by the composer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputVideo {
    pub path: PathBuf,
    /// Length of both tracks in seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl OutputVideo {
    pub const MIME_TYPE: &'static str = "video/mp4";
}
