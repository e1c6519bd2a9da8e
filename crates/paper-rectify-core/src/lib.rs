//! Core geometry for locating and rectifying a reference sheet.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any image codec: rasters are plain RGB buffers, points are
//! `nalgebra::Point2<f64>`.
//!
//! - [`order_quad`] / [`validate_ordered`]: corner ordering and convexity checks.
//! - [`homography_from_4pt`], [`Homography`]: 4-point DLT with Hartley normalisation.
//! - [`warp_perspective_rgb`], [`sample_bilinear_rgb`]: resampling.
//! - [`WarpBackend`], [`NativeBackend`]: the primitive-library seam used by rectification.

mod backend;
mod homography;
mod image;
mod logger;
mod quad;

pub use backend::{NativeBackend, WarpBackend};
pub use homography::{homography_from_4pt, warp_perspective_rgb, Homography};
pub use image::{sample_bilinear_rgb, RgbImage, RgbImageView};
pub use quad::{order_quad, validate_ordered, Quad, QuadParams};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_env, parse_level, LOG_ENV};
