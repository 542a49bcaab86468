//! Text watermark for publicly served artwork images.

use std::io::Cursor;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops};
use imageproc::{
    drawing::{draw_text_mut, text_size},
    geometric_transformations::{Interpolation, rotate_about_center},
};
use thiserror::Error;
use tokio::fs;

use crate::config::WatermarkConfig;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("unsupported or corrupt image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("invalid font: {0}")]
    Font(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct WatermarkedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

const INK: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Tiles run bottom-left to top-right.
const TILT: f32 = -std::f32::consts::FRAC_PI_4;

pub struct Watermarker {
    font: FontArc,
    font_data: Vec<u8>,
    text: String,
    opacity: f32,
}

impl Watermarker {
    /// `None` when no font is configured; watermarking is then unavailable.
    pub async fn load(config: &WatermarkConfig) -> Result<Option<Self>, WatermarkError> {
        let Some(path) = &config.font_path else {
            return Ok(None);
        };
        let bytes = fs::read(path).await?;
        Self::from_font_bytes(bytes, config.text.clone(), config.opacity).map(Some)
    }

    pub fn from_font_bytes(
        font: Vec<u8>,
        text: String,
        opacity: f32,
    ) -> Result<Self, WatermarkError> {
        let font_data = font.clone();
        let font = FontArc::try_from_vec(font).map_err(|e| WatermarkError::Font(e.to_string()))?;
        Ok(Self {
            font,
            font_data,
            text,
            opacity: opacity.clamp(0.0, 1.0),
        })
    }

    /// Raw TrueType bytes, shared with certificate rendering.
    pub fn font_data(&self) -> &[u8] {
        &self.font_data
    }

    pub fn apply(&self, original: &[u8]) -> Result<WatermarkedImage, WatermarkError> {
        let (mut image, format) = decode_image(original)?;
        let (width, height) = image.dimensions();

        let scale = PxScale::from((width.min(height) as f32 / 12.0).max(12.0));
        let (text_w, text_h) = text_size(scale, &self.font, &self.text);

        // Tile a square as wide as the diagonal so no corner is bare after rotation.
        let side = (width as f32).hypot(height as f32).ceil() as u32;
        let mut layer = RgbaImage::new(side, side);
        for (x, y) in tile_positions(side, side, text_w, text_h) {
            draw_text_mut(&mut layer, INK, x, y, scale, &self.font, &self.text);
        }
        let mask = tilt_and_crop(&layer, width, height);
        blend_layer(&mut image, &mask, INK, self.opacity);

        encode_like(image, format)
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<(RgbaImage, ImageFormat), WatermarkError> {
    let format = image::guess_format(bytes).map_err(WatermarkError::Decode)?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(WatermarkError::Decode)?
        .to_rgba8();
    Ok((image, format))
}

/// Staggered grid of text origins covering the whole image, each row shifted by half a step.
pub fn tile_positions(width: u32, height: u32, text_w: u32, text_h: u32) -> Vec<(i32, i32)> {
    let step_x = (text_w + text_w / 2).max(1) as i32;
    let step_y = (text_h * 4).max(1) as i32;
    let (width, height) = (width as i32, height as i32);

    let mut positions = Vec::new();
    let mut row = 0;
    let mut y = 0;
    while y < height {
        let shift = if row % 2 == 0 { 0 } else { step_x / 2 };
        let mut x = -shift;
        while x < width {
            positions.push((x, y));
            x += step_x;
        }
        y += step_y;
        row += 1;
    }
    positions
}

/// Rotates the tiled layer diagonally and cuts out a centred `width` x `height` window.
pub fn tilt_and_crop(layer: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let rotated = rotate_about_center(layer, TILT, Interpolation::Bilinear, Rgba([0, 0, 0, 0]));
    let width = width.min(rotated.width());
    let height = height.min(rotated.height());
    let x = (rotated.width() - width) / 2;
    let y = (rotated.height() - height) / 2;
    imageops::crop_imm(&rotated, x, y, width, height).to_image()
}

/// Blends `ink` into `base` wherever `mask` has coverage, its alpha scaled by `opacity`.
pub fn blend_layer(base: &mut RgbaImage, mask: &RgbaImage, ink: Rgba<u8>, opacity: f32) {
    for (x, y, pixel) in base.enumerate_pixels_mut() {
        let coverage = mask.get_pixel(x, y)[3] as f32 / 255.0;
        let alpha = coverage * opacity;
        if alpha <= 0.0 {
            continue;
        }
        for channel in 0..3 {
            let blended = pixel[channel] as f32 * (1.0 - alpha) + ink[channel] as f32 * alpha;
            pixel[channel] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn encode_like(image: RgbaImage, source: ImageFormat) -> Result<WatermarkedImage, WatermarkError> {
    let mut out = Cursor::new(Vec::new());
    let content_type = match source {
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgba8(image)
                .to_rgb8()
                .write_to(&mut out, ImageFormat::Jpeg)
                .map_err(WatermarkError::Encode)?;
            "image/jpeg"
        }
        _ => {
            image
                .write_to(&mut out, ImageFormat::Png)
                .map_err(WatermarkError::Encode)?;
            "image/png"
        }
    };
    Ok(WatermarkedImage {
        bytes: out.into_inner(),
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(WatermarkError::Decode(_))
        ));
    }

    #[test]
    fn png_round_trips_through_decode_and_encode() {
        let image = RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]));
        let (decoded, format) = decode_image(&png_bytes(&image)).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(decoded.dimensions(), (8, 4));

        let encoded = encode_like(decoded, format).unwrap();
        assert_eq!(encoded.content_type, "image/png");
        assert_eq!(decode_image(&encoded.bytes).unwrap().1, ImageFormat::Png);
    }

    #[test]
    fn blend_respects_coverage_and_opacity() {
        let mut base = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        let mut mask = RgbaImage::new(2, 1);
        mask.put_pixel(0, 0, Rgba([255, 255, 255, 255]));

        blend_layer(&mut base, &mask, INK, 0.5);

        assert_eq!(base.get_pixel(0, 0).0, [128, 128, 128, 255]);
        assert_eq!(base.get_pixel(1, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn tiles_cover_the_image_with_staggered_rows() {
        let positions = tile_positions(100, 100, 20, 5);
        assert!(positions.contains(&(0, 0)));
        assert!(positions.contains(&(-15, 20)));
        assert!(positions.iter().all(|&(x, y)| x < 100 && y < 100));

        assert!(!tile_positions(10, 10, 0, 0).is_empty());
    }

    #[test]
    fn tilted_layer_runs_diagonally() {
        let mut layer = RgbaImage::new(21, 21);
        for x in 0..21 {
            layer.put_pixel(x, 10, INK);
        }

        let mask = tilt_and_crop(&layer, 11, 11);

        assert_eq!(mask.dimensions(), (11, 11));
        assert!(mask.get_pixel(5, 5)[3] > 0);
        assert_eq!(mask.get_pixel(5, 0)[3], 0);
        assert_eq!(mask.get_pixel(0, 5)[3], 0);
        assert!(mask.get_pixel(2, 2)[3] > 0 || mask.get_pixel(8, 2)[3] > 0);
    }
}
