use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::{Error, Result};

/// A decoded still image, RGB8.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbImage,
}

impl SourceImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Decode an image from raw bytes, sniffing the format from its magic number.
pub fn decode_image(bytes: &[u8]) -> Result<SourceImage> {
    if bytes.is_empty() {
        return Err(Error::InvalidImage("image payload is empty".into()));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::InvalidImage(format!("failed to decode image: {e}")))?;

    debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "decoded image"
    );

    Ok(SourceImage::from_rgb(decoded.into_rgb8()))
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<SourceImage> {
    if !path.exists() {
        return Err(Error::ImageNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Where a scaled image lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Placement {
    /// Largest uniform scale that fits `src` inside `canvas` without cropping,
    /// centered. Returns `None` when either side of either box is zero.
    pub fn fit(src_width: u32, src_height: u32, canvas_width: u32, canvas_height: u32) -> Option<Self> {
        if src_width == 0 || src_height == 0 || canvas_width == 0 || canvas_height == 0 {
            return None;
        }

        let scale = (canvas_width as f64 / src_width as f64)
            .min(canvas_height as f64 / src_height as f64);

        // Rounding keeps the constrained side exact when the product lands a
        // hair below the canvas edge.
        let scaled_width = ((src_width as f64 * scale).round() as u32).clamp(1, canvas_width);
        let scaled_height = ((src_height as f64 * scale).round() as u32).clamp(1, canvas_height);

        Some(Self {
            scaled_width,
            scaled_height,
            offset_x: (canvas_width - scaled_width) / 2,
            offset_y: (canvas_height - scaled_height) / 2,
        })
    }
}

/// Scale `image` to fit a black `canvas_width` x `canvas_height` frame and
/// center it. Pixels outside the placed image stay black.
pub fn letterbox(
    image: &SourceImage,
    canvas_width: u32,
    canvas_height: u32,
) -> Result<(RgbImage, Placement)> {
    let placement = Placement::fit(image.width(), image.height(), canvas_width, canvas_height)
        .ok_or_else(|| {
            Error::InvalidImage(format!(
                "invalid image dimensions {}x{}",
                image.width(),
                image.height()
            ))
        })?;

    debug!(
        src_width = image.width(),
        src_height = image.height(),
        scaled_width = placement.scaled_width,
        scaled_height = placement.scaled_height,
        offset_x = placement.offset_x,
        offset_y = placement.offset_y,
        "letterboxing image"
    );

    let mut canvas = RgbImage::new(canvas_width, canvas_height);

    if placement.scaled_width == image.width() && placement.scaled_height == image.height() {
        imageops::replace(
            &mut canvas,
            image.pixels(),
            placement.offset_x as i64,
            placement.offset_y as i64,
        );
    } else {
        let scaled = imageops::resize(
            image.pixels(),
            placement.scaled_width,
            placement.scaled_height,
            FilterType::Lanczos3,
        );
        imageops::replace(
            &mut canvas,
            &scaled,
            placement.offset_x as i64,
            placement.offset_y as i64,
        );
    }

    Ok((canvas, placement))
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::config::{CANVAS_HEIGHT, CANVAS_WIDTH};
    use crate::test_support::{png_bytes, PNG_COLOR};

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn solid(width: u32, height: u32) -> SourceImage {
        SourceImage::from_rgb(RgbImage::from_pixel(width, height, RED))
    }

    // --- Placement geometry ---

    #[test]
    fn test_fit_square_is_width_constrained() {
        let p = Placement::fit(500, 500, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(p.scaled_width, 1080);
        assert_eq!(p.scaled_height, 1080);
        assert_eq!(p.offset_x, 0);
        assert_eq!(p.offset_y, 420);
        // equal top and bottom margins
        assert_eq!(CANVAS_HEIGHT - p.scaled_height - p.offset_y, p.offset_y);
    }

    #[test]
    fn test_fit_landscape_fills_width() {
        let p = Placement::fit(1920, 1080, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(p.scaled_width, 1080);
        assert_eq!(p.scaled_height, 608);
        assert_eq!(p.offset_x, 0);
        assert_eq!(p.offset_y, (1920 - 608) / 2);
    }

    #[test]
    fn test_fit_tall_fills_height() {
        let p = Placement::fit(1080, 3840, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(p.scaled_height, 1920);
        assert_eq!(p.scaled_width, 540);
        assert_eq!(p.offset_x, 270);
        assert_eq!(p.offset_y, 0);
    }

    #[test]
    fn test_fit_exact_portrait_is_identity() {
        let p = Placement::fit(1080, 1920, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(
            p,
            Placement {
                scaled_width: 1080,
                scaled_height: 1920,
                offset_x: 0,
                offset_y: 0
            }
        );
    }

    #[test]
    fn test_fit_upscales_small_images() {
        let p = Placement::fit(9, 16, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!((p.scaled_width, p.scaled_height), (1080, 1920));
    }

    #[test]
    fn test_fit_preserves_aspect_ratio() {
        for (w, h) in [(640, 480), (300, 1000), (1, 7), (4000, 3), (1234, 987)] {
            let p = Placement::fit(w, h, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
            // one side always touches the canvas edge
            assert!(
                p.scaled_width == CANVAS_WIDTH || p.scaled_height == CANVAS_HEIGHT,
                "{w}x{h} -> {p:?}"
            );
            // the free side is within a pixel of the exact proportional size
            let exact_height = p.scaled_width as f64 * h as f64 / w as f64;
            let exact_width = p.scaled_height as f64 * w as f64 / h as f64;
            assert!(
                (p.scaled_height as f64 - exact_height).abs() <= 1.0
                    || (p.scaled_width as f64 - exact_width).abs() <= 1.0,
                "{w}x{h} -> {p:?}"
            );
        }
    }

    #[test]
    fn test_fit_rejects_zero_dimensions() {
        assert!(Placement::fit(0, 100, CANVAS_WIDTH, CANVAS_HEIGHT).is_none());
        assert!(Placement::fit(100, 0, CANVAS_WIDTH, CANVAS_HEIGHT).is_none());
        assert!(Placement::fit(100, 100, 0, CANVAS_HEIGHT).is_none());
    }

    // --- Letterboxing ---

    #[test]
    fn test_letterbox_square_has_black_bars_top_and_bottom() {
        let (canvas, p) = letterbox(&solid(100, 100), CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(canvas.dimensions(), (1080, 1920));
        assert_eq!(p.offset_y, 420);

        assert_eq!(*canvas.get_pixel(540, 10), BLACK);
        assert_eq!(*canvas.get_pixel(540, 1910), BLACK);
        assert_eq!(*canvas.get_pixel(540, 419), BLACK);
        assert_eq!(*canvas.get_pixel(540, 1500), BLACK);
        assert_eq!(*canvas.get_pixel(540, 960), RED);
        assert_eq!(*canvas.get_pixel(0, 960), RED);
        assert_eq!(*canvas.get_pixel(1079, 960), RED);
    }

    #[test]
    fn test_letterbox_tall_has_black_bars_left_and_right() {
        let (canvas, p) = letterbox(&solid(100, 800), CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(p.scaled_height, 1920);
        assert_eq!(p.scaled_width, 240);
        assert_eq!(p.offset_x, 420);
        assert_eq!(*canvas.get_pixel(10, 960), BLACK);
        assert_eq!(*canvas.get_pixel(1070, 960), BLACK);
        assert_eq!(*canvas.get_pixel(540, 960), RED);
    }

    #[test]
    fn test_letterbox_same_size_skips_resample() {
        let image = solid(1080, 1920);
        let (canvas, _) = letterbox(&image, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(canvas, *image.pixels());
    }

    #[test]
    fn test_letterbox_rejects_empty_image() {
        let empty = SourceImage::from_rgb(RgbImage::new(0, 0));
        let err = letterbox(&empty, CANVAS_WIDTH, CANVAS_HEIGHT).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    // --- Decoding ---

    #[test]
    fn test_decode_png() {
        let image = decode_image(&png_bytes(64, 32)).unwrap();
        assert_eq!((image.width(), image.height()), (64, 32));
        assert_eq!(*image.pixels().get_pixel(0, 0), PNG_COLOR);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode_image(&[]), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let bytes = png_bytes(64, 64);
        let err = decode_image(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("/nonexistent/portrait/input.png")).unwrap_err();
        assert!(matches!(err, Error::ImageNotFound { .. }));
    }
}
