//! JPEG snapshot encoder.
//!
//! Samples a [`FrameSource`] with nearest-neighbour integer downsampling,
//! unpacks each sampled pixel to RGB and compresses the result with the
//! `image` crate's baseline JPEG encoder.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageEncoder};

use gsnap_common::{SnapError, SnapResult};

use crate::framebuffer::FrameSource;

/// Result of encoding a single snapshot.
#[derive(Debug, Default)]
pub struct EncodedImage {
    /// Baseline JPEG stream; empty for degenerate geometry.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Map the unchecked configured quality onto the JPEG range.
///
/// Out-of-range values degrade to the nearest bound instead of failing.
pub fn jpeg_quality(quality: i32) -> u8 {
    quality.clamp(1, 100) as u8
}

/// Output dimensions for a downsample factor: integer division, truncating.
pub fn target_dimensions(width: u32, height: u32, factor: u32) -> (u32, u32) {
    let factor = factor.max(1);
    (width / factor, height / factor)
}

/// Encode the current contents of `source` as a JPEG.
///
/// Output row `y` is read from framebuffer row `y × factor`, stepping
/// `factor` pixels at a time across it.
///
/// The `image` encoder takes the whole picture at once, so sampled rows go
/// into a single `3 × width × height` RGB buffer rather than a per-row one.
pub fn encode_jpeg<S: FrameSource + ?Sized>(
    source: &S,
    quality: i32,
    factor: u32,
) -> SnapResult<EncodedImage> {
    let geometry = source.geometry();
    let (width, height) = target_dimensions(geometry.width, geometry.height, factor);
    if width == 0 || height == 0 {
        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            factor,
            "Degenerate capture geometry, nothing to encode"
        );
        return Ok(EncodedImage::default());
    }

    let rgb = sample_rgb(source, width, height, factor.max(1) as usize);

    let mut jpeg_buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, jpeg_quality(quality));
    encoder
        .write_image(&rgb, width, height, ColorType::Rgb8.into())
        .map_err(|e| SnapError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        data: jpeg_buf.into_inner(),
        width,
        height,
    })
}

/// Nearest-neighbour sample into a packed RGB8 buffer of `width × height`.
fn sample_rgb<S: FrameSource + ?Sized>(source: &S, width: u32, height: u32, step: usize) -> Vec<u8> {
    let geometry = source.geometry();
    let pixels = source.pixels();
    let bpp = geometry.bytes_per_pixel;
    let stride = geometry.row_stride();

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height as usize {
        let line = pixels.get(y * step * stride..).unwrap_or_default();
        for x in 0..width as usize {
            let start = x * step * bpp;
            let pixel = line.get(start..start + bpp).unwrap_or_default();
            let (r, g, b) = geometry.format.unpack(pixel, geometry.offsets);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}
