//! Adaptive foreground segmentation of "paper-like" pixels.
//!
//! The brightness threshold adapts to the image: scanning the luminance
//! histogram from the top, it settles where the brightest `bright_fraction`
//! of pixels begins, but never below `min_threshold`. A pixel also has to be
//! close to grey (low chroma) and not contain a dark channel.

use log::debug;
use paper_rectify_core::RgbImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Fraction of all pixels that the brightest histogram bins must cover.
    pub bright_fraction: f64,
    /// Lower bound for the adaptive threshold.
    pub min_threshold: u8,
    /// Maximal `max(r,g,b) - min(r,g,b)`.
    pub max_chroma: u8,
    /// Minimal value of the darkest channel.
    pub min_channel: u8,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            bright_fraction: 0.12,
            min_threshold: 200,
            max_chroma: 45,
            min_channel: 70,
        }
    }
}

/// Binary foreground mask in the working frame.
#[derive(Clone, Debug)]
pub struct ForegroundMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>, // row-major
    /// Number of foreground pixels.
    pub count: usize,
    /// Luminance threshold that produced the mask.
    pub threshold: u8,
}

/// Perceptual luminance `0.299 R + 0.587 G + 0.114 B`, rounded.
#[inline]
pub fn luminance(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

pub fn luminance_histogram(src: &RgbImageView<'_>) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for px in src.data.chunks_exact(3) {
        hist[luminance([px[0], px[1], px[2]]) as usize] += 1;
    }
    hist
}

/// Adaptive threshold from a luminance histogram.
pub fn brightness_threshold(hist: &[u32; 256], params: &SegmentParams) -> u8 {
    let total: u64 = hist.iter().map(|&h| h as u64).sum();
    if total == 0 {
        return params.min_threshold;
    }
    let target = (total as f64 * params.bright_fraction).ceil().max(1.0) as u64;

    let mut acc = 0u64;
    let mut threshold = 0u8;
    for bin in (0..256).rev() {
        acc += hist[bin] as u64;
        if acc >= target {
            threshold = bin as u8;
            break;
        }
    }
    threshold.max(params.min_threshold)
}

#[inline]
fn is_paper_like(rgb: [u8; 3], threshold: u8, params: &SegmentParams) -> bool {
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    luminance(rgb) >= threshold && max - min <= params.max_chroma && min >= params.min_channel
}

/// Build the foreground mask; `None` if no pixel qualifies.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, params), fields(width = src.width, height = src.height))
)]
pub fn segment_foreground(src: &RgbImageView<'_>, params: &SegmentParams) -> Option<ForegroundMask> {
    let hist = luminance_histogram(src);
    let threshold = brightness_threshold(&hist, params);

    let mut data = Vec::with_capacity(src.width * src.height);
    let mut count = 0usize;
    for px in src.data.chunks_exact(3) {
        let fg = is_paper_like([px[0], px[1], px[2]], threshold, params);
        count += fg as usize;
        data.push(fg);
    }

    debug!("segmentation threshold={threshold} foreground={count}");
    if count == 0 {
        return None;
    }

    Some(ForegroundMask {
        width: src.width,
        height: src.height,
        data,
        count,
        threshold,
    })
}
