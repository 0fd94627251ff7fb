//! Image normalisation: raw upload bytes → oriented, width-capped JPEG.
//!
//! Every stored image goes through the same steps so the remote store always
//! receives a predictable buffer:
//!
//! 1. sniff the format from the content (the declared media type is not
//!    trusted) and decode;
//! 2. apply the EXIF orientation, so phone photos are upright;
//! 3. downscale to `max_width`, keeping the aspect ratio; never upscale;
//! 4. flatten any alpha channel onto white and encode as JPEG at the quality
//!    of the image's [`ImageRole`].
//!
//! The output depends only on the input bytes and the configuration.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and resampling a 4000 px scan takes tens of milliseconds of pure
//! CPU. Running it on a Tokio worker thread would stall every other future
//! scheduled there, including sibling uploads, so [`transform`] moves the
//! work onto the blocking pool.

use crate::config::IngestConfig;
use crate::error::TransformError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// What the image is used for. Covers are shown larger and longer than
/// interior pages, so they are configured with their own quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Page,
    Cover,
}

impl ImageRole {
    pub fn quality(self, config: &IngestConfig) -> u8 {
        match self {
            ImageRole::Page => config.page_quality,
            ImageRole::Cover => config.cover_quality,
        }
    }
}

/// Normalise `bytes` for storage. Runs inside `spawn_blocking`.
pub async fn transform(
    bytes: Vec<u8>,
    role: ImageRole,
    config: &IngestConfig,
) -> Result<Vec<u8>, TransformError> {
    let max_width = config.max_width;
    let quality = role.quality(config);

    tokio::task::spawn_blocking(move || transform_blocking(&bytes, max_width, quality))
        .await
        .map_err(|e| TransformError::Task(e.to_string()))?
}

/// Blocking implementation of [`transform`].
pub fn transform_blocking(
    bytes: &[u8],
    max_width: u32,
    quality: u8,
) -> Result<Vec<u8>, TransformError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?
        .into_decoder()
        .map_err(|e| TransformError::Decode(e.to_string()))?;

    // Missing or unreadable metadata means "as stored".
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| TransformError::Decode(e.to_string()))?;
    img.apply_orientation(orientation);

    let (width, height) = (img.width(), img.height());
    if width > max_width {
        let scaled_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        img = img.resize_exact(max_width, scaled_height, FilterType::Lanczos3);
    }

    let rgb = flatten_on_white(&img);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| TransformError::Encode(e.to_string()))?;

    debug!(
        "Normalised {}x{} → {}x{} q{} ({} → {} bytes)",
        width,
        height,
        rgb.width(),
        rgb.height(),
        quality,
        bytes.len(),
        out.len()
    );
    Ok(out)
}

/// JPEG has no alpha; composite transparent pixels over white instead of
/// letting them turn black.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let a = p[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}
