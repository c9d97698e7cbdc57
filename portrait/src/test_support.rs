//! Fixture builders shared by the unit tests.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::scratch::ScratchDir;

/// A scratch directory for one test, removed on drop.
pub(crate) struct TestDir(ScratchDir);

impl TestDir {
    pub(crate) fn new(name: &str) -> Self {
        Self(ScratchDir::create(&format!("portrait-test-{name}")).unwrap())
    }

    pub(crate) fn path(&self) -> &Path {
        self.0.path()
    }
}

/// Fill color of [`png_bytes`].
pub(crate) const PNG_COLOR: Rgb<u8> = Rgb([40, 120, 200]);

/// A solid-color PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, PNG_COLOR)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A mono 16-bit PCM WAV holding a 440 Hz sine at `amplitude` (0.0..=1.0).
pub(crate) fn sine_wav(sample_rate: u32, secs: f64, amplitude: f32) -> Vec<u8> {
    let frames = (secs * sample_rate as f64) as u32;
    let data_len = frames * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());

    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let v = amplitude * (t * 440.0 * std::f32::consts::TAU).sin();
        wav.extend_from_slice(&((v * i16::MAX as f32) as i16).to_le_bytes());
    }
    wav
}
