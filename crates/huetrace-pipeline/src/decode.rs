//! Image decoding and alpha compositing.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an opaque
//! RGB raster. Transparent and translucent pixels are blended over a
//! fixed background color so the quantizer only ever sees opaque colors.
//!
//! This is the first step in the pipeline: raw bytes in, `RgbImage` out.

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::types::{Color, PipelineError};

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Flatten an image onto an opaque background.
///
/// Images without an alpha channel are returned as RGB unchanged.
/// Otherwise each channel becomes `fg * a + bg * (1 - a)` with
/// `a = alpha / 255`, rounded to the nearest integer.
#[must_use = "returns the composited image"]
pub fn composite_over(image: &DynamicImage, background: Color) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    composite_rgba(&image.to_rgba8(), background)
}

/// Blend every pixel of an RGBA buffer over `background`.
#[must_use = "returns the composited image"]
pub fn composite_rgba(rgba: &RgbaImage, background: Color) -> RgbImage {
    let bg = background.channels();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        image::Rgb([
            blend(r, bg[0], a),
            blend(g, bg[1], a),
            blend(b, bg[2], a),
        ])
    })
}

/// Decode raw bytes and composite over `background` in one step.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_and_composite(bytes: &[u8], background: Color) -> Result<RgbImage, PipelineError> {
    let image = decode(bytes)?;
    Ok(composite_over(&image, background))
}

/// Integer alpha blend of one channel, rounded to nearest.
///
/// 255 is odd, so `x / 255` never lands exactly on a half and the
/// `+ 127` bias rounds correctly.
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let mixed = u32::from(fg) * a + u32::from(bg) * (255 - a);
    // At most 255 * 255 + 127, so the quotient fits in a u8.
    u8::try_from((mixed + 127) / 255).unwrap_or(u8::MAX)
}
