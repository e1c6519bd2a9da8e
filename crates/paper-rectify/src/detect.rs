//! `image`-crate helpers: conversions, file I/O and one-call detection.

use crate::core::{RgbImage, RgbImageView};
use crate::detector::{DetectorParams, SheetDetection, SheetDetector};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the image helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid RGBA image buffer length (expected {expected} bytes, got {got})")]
    InvalidRgbaBuffer { expected: usize, got: usize },

    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

/// Borrow an `image::RgbImage` as a core view.
pub fn rgb_view(img: &::image::RgbImage) -> RgbImageView<'_> {
    RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Convert any decoded image into a core RGB raster, dropping alpha.
pub fn rgb_from_dynamic(img: &::image::DynamicImage) -> Result<RgbImage, DetectError> {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    RgbImage::from_raw(width, height, rgb.into_raw())
        .ok_or(DetectError::InvalidDimensions { width, height })
}

/// Copy a tightly packed RGBA buffer into a core RGB raster.
pub fn rgb_from_rgba(width: usize, height: usize, rgba: &[u8]) -> Result<RgbImage, DetectError> {
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(DetectError::InvalidDimensions { width, height })?;
    RgbImage::from_rgba(width, height, rgba).ok_or(DetectError::InvalidRgbaBuffer {
        expected,
        got: rgba.len(),
    })
}

/// Decode an image file into a core RGB raster.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, DetectError> {
    let img = ::image::open(path)?;
    rgb_from_dynamic(&img)
}

/// Convert a core raster back into an `image::RgbImage`.
pub fn to_image_rgb(img: &RgbImage) -> Result<::image::RgbImage, DetectError> {
    let invalid = DetectError::InvalidDimensions {
        width: img.width,
        height: img.height,
    };
    let (Ok(w), Ok(h)) = (u32::try_from(img.width), u32::try_from(img.height)) else {
        return Err(invalid);
    };
    ::image::RgbImage::from_raw(w, h, img.data.clone()).ok_or(invalid)
}

/// Save a core raster; the format follows the file extension.
pub fn save_rgb(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), DetectError> {
    to_image_rgb(img)?.save(path)?;
    Ok(())
}

/// Run the sheet detector on an `image::RgbImage`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn detect_sheet(img: &::image::RgbImage, params: DetectorParams) -> Option<SheetDetection> {
    SheetDetector::new(params).detect(&rgb_view(img))
}

/// Convenience overload using `DetectorParams::default()`.
pub fn detect_sheet_default(img: &::image::RgbImage) -> Option<SheetDetection> {
    detect_sheet(img, DetectorParams::default())
}
