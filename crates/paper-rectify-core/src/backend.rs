//! Numerical primitives used by rectification.
//!
//! The rectification engine decides *which* transform to compute and how to
//! judge it; the dense solve, the matrix inversion and the pixel resampling
//! go through a [`WarpBackend`]. Backends may need time to load, which they
//! report through [`WarpBackend::poll_ready`].

use crate::{homography_from_4pt, warp_perspective_rgb, Homography, RgbImage, RgbImageView};
use nalgebra::Point2;

/// Opaque provider of projective-geometry primitives.
pub trait WarpBackend {
    /// Check whether the backend can serve requests. Once this returns `true`
    /// it must keep returning `true`.
    fn poll_ready(&self) -> bool;

    /// Solve `dst ~ H * src` from four correspondences.
    fn solve_homography(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Option<Homography>;

    /// Resample `src` into an `out_w x out_h` raster, sampling the source at
    /// `h_img_from_rect * p` for every destination pixel `p`.
    fn warp(
        &self,
        src: &RgbImageView<'_>,
        h_img_from_rect: &Homography,
        out_w: usize,
        out_h: usize,
    ) -> Option<RgbImage>;

    /// Invert a transform, or `None` if it is singular or badly conditioned.
    fn invert(&self, h: &Homography) -> Option<Homography>;
}

/// In-process backend built on this crate's DLT, inversion and bilinear warp.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBackend;

impl WarpBackend for NativeBackend {
    fn poll_ready(&self) -> bool {
        true
    }

    fn solve_homography(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Option<Homography> {
        homography_from_4pt(src, dst)
    }

    fn warp(
        &self,
        src: &RgbImageView<'_>,
        h_img_from_rect: &Homography,
        out_w: usize,
        out_h: usize,
    ) -> Option<RgbImage> {
        if out_w == 0 || out_h == 0 || src.width == 0 || src.height == 0 {
            return None;
        }
        Some(warp_perspective_rgb(src, h_img_from_rect, out_w, out_h))
    }

    fn invert(&self, h: &Homography) -> Option<Homography> {
        h.inverse()
    }
}

impl<B: WarpBackend + ?Sized> WarpBackend for &B {
    fn poll_ready(&self) -> bool {
        (**self).poll_ready()
    }

    fn solve_homography(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Option<Homography> {
        (**self).solve_homography(src, dst)
    }

    fn warp(
        &self,
        src: &RgbImageView<'_>,
        h_img_from_rect: &Homography,
        out_w: usize,
        out_h: usize,
    ) -> Option<RgbImage> {
        (**self).warp(src, h_img_from_rect, out_w, out_h)
    }

    fn invert(&self, h: &Homography) -> Option<Homography> {
        (**self).invert(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_backend_is_ready_and_rejects_empty_output() {
        let backend = NativeBackend;
        assert!(backend.poll_ready());
        let img = RgbImage::new(4, 4);
        assert!(backend
            .warp(&img.view(), &Homography::identity(), 0, 4)
            .is_none());
        assert!(backend
            .warp(&img.view(), &Homography::identity(), 4, 4)
            .is_some());
    }
}
