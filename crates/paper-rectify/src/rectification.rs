//! Homography-based rectification with a single-entry result cache.
//!
//! The engine maps a validated source quad onto an axis-aligned rectangle of
//! `physical_mm * px_per_mm` pixels. Results are cached by a signature of
//! every input that affects them; an identical request returns the same
//! [`WarpState`] instance.

use log::{debug, warn};
use nalgebra::Point2;
use paper_rectify_core::{Homography, Quad, RgbImage, RgbImageView, WarpBackend};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    /// Density used while no calibrated px/mm is available.
    pub default_px_per_mm: f64,
    /// Cap on the longer side of the rectified raster.
    pub max_output_dim: usize,
    /// Mean reprojection error (destination px) above which a warning is attached.
    pub warn_reprojection_px: f64,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self {
            default_px_per_mm: 3.0,
            max_output_dim: 4000,
            warn_reprojection_px: 5.0,
        }
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum RectifyError {
    #[error("invalid sheet size {width_mm} x {height_mm} mm")]
    InvalidGeometry { width_mm: f64, height_mm: f64 },

    #[error("rectified size is not finite")]
    NonFiniteDimensions,

    #[error("source image is empty")]
    EmptySource,

    #[error("geometry backend is still loading")]
    BackendNotReady,

    #[error("could not solve the perspective transform")]
    HomographySolve,

    #[error("perspective warp failed")]
    WarpFailed,
}

/// One rectification result. Replaced wholesale, never updated in place.
#[derive(Clone, Debug)]
pub struct WarpState {
    /// Source image -> rectified raster.
    pub forward: Homography,
    /// Rectified raster -> source image, if the forward transform is invertible.
    pub inverse: Option<Homography>,
    pub width: usize,
    pub height: usize,
    /// Density actually used, after fallback and capping.
    pub px_per_mm: f64,
    /// Mean distance between projected source corners and destination corners.
    pub mean_reprojection_error: f64,
    pub signature: String,
    pub rectified: RgbImage,
    pub warning: Option<String>,
}

impl WarpState {
    /// Map a source-image point into the rectified raster.
    #[inline]
    pub fn to_warped(&self, p: Point2<f64>) -> Point2<f64> {
        self.forward.apply(p)
    }

    /// Map a rectified-raster point back into the source image; `None`
    /// without an inverse.
    #[inline]
    pub fn to_original(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        self.inverse.as_ref().map(|h| h.apply(p))
    }
}

/// Resolved destination size: `(width, height, px_per_mm)`.
pub fn output_size(
    physical_mm: (f64, f64),
    px_per_mm: Option<f64>,
    params: &RectifyParams,
) -> Result<(usize, usize, f64), RectifyError> {
    let (width_mm, height_mm) = physical_mm;
    if !(width_mm.is_finite() && height_mm.is_finite() && width_mm > 0.0 && height_mm > 0.0) {
        return Err(RectifyError::InvalidGeometry {
            width_mm,
            height_mm,
        });
    }

    let mut density = match px_per_mm {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => params.default_px_per_mm,
    };

    let mut w = (width_mm * density).round().max(1.0);
    let mut h = (height_mm * density).round().max(1.0);
    if !(w.is_finite() && h.is_finite()) {
        return Err(RectifyError::NonFiniteDimensions);
    }

    let cap = params.max_output_dim.max(1) as f64;
    let longer = w.max(h);
    if longer > cap {
        let s = cap / longer;
        density *= s;
        w = (w * s).round().clamp(1.0, cap);
        h = (h * s).round().clamp(1.0, cap);
    }

    Ok((w as usize, h as usize, density))
}

/// Cache key over rounded corners, physical size, density and both raster sizes.
pub fn warp_signature(
    quad: &Quad,
    physical_mm: (f64, f64),
    px_per_mm: f64,
    out_size: (usize, usize),
    src_size: (usize, usize),
) -> String {
    let mut sig = String::with_capacity(96);
    for p in quad.corners() {
        let x = (p.x * 1e3).round() as i64;
        let y = (p.y * 1e3).round() as i64;
        sig.push_str(&format!("{x},{y};"));
    }
    sig.push_str(&format!(
        "{}x{}mm;{}ppmm;{}x{};{}x{}",
        (physical_mm.0 * 1e3).round() as i64,
        (physical_mm.1 * 1e3).round() as i64,
        (px_per_mm * 1e6).round() as i64,
        out_size.0,
        out_size.1,
        src_size.0,
        src_size.1,
    ));
    sig
}

/// Mean Euclidean distance between `h * src[i]` and `dst[i]`.
pub fn mean_reprojection_error(
    h: &Homography,
    src: &[Point2<f64>; 4],
    dst: &[Point2<f64>; 4],
) -> f64 {
    let sum: f64 = src
        .iter()
        .zip(dst)
        .map(|(s, d)| (h.apply(*s) - *d).norm())
        .sum();
    sum / 4.0
}

#[derive(Debug)]
pub struct RectificationEngine<B> {
    backend: B,
    params: RectifyParams,
    cache: Option<Rc<WarpState>>,
}

impl<B: WarpBackend> RectificationEngine<B> {
    pub fn new(backend: B, params: RectifyParams) -> Self {
        Self {
            backend,
            params,
            cache: None,
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn params(&self) -> &RectifyParams {
        &self.params
    }

    /// Last successful result, kept across failed requests.
    pub fn current(&self) -> Option<&Rc<WarpState>> {
        self.cache.as_ref()
    }

    /// Drop the cached result.
    pub fn clear(&mut self) {
        self.cache = None;
    }

    /// Rectify `src` so that `quad` becomes a `physical_mm` rectangle.
    ///
    /// `px_per_mm` falls back to [`RectifyParams::default_px_per_mm`] when
    /// absent or invalid. A failed request leaves the cached result untouched.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, quad, src), fields(width = src.width, height = src.height))
    )]
    pub fn rectify(
        &mut self,
        quad: &Quad,
        physical_mm: (f64, f64),
        px_per_mm: Option<f64>,
        src: &RgbImageView<'_>,
    ) -> Result<Rc<WarpState>, RectifyError> {
        if src.width == 0 || src.height == 0 {
            return Err(RectifyError::EmptySource);
        }

        let (w, h, density) = output_size(physical_mm, px_per_mm, &self.params)?;
        let signature = warp_signature(quad, physical_mm, density, (w, h), (src.width, src.height));

        if let Some(prev) = &self.cache {
            if prev.signature == signature {
                debug!("rectification cache hit");
                return Ok(Rc::clone(prev));
            }
        }

        if !self.backend.poll_ready() {
            return Err(RectifyError::BackendNotReady);
        }

        let src_pts = *quad.corners();
        let (wf, hf) = (w as f64, h as f64);
        let dst_pts = [
            Point2::new(0.0, 0.0),
            Point2::new(wf, 0.0),
            Point2::new(wf, hf),
            Point2::new(0.0, hf),
        ];

        let forward = self
            .backend
            .solve_homography(&src_pts, &dst_pts)
            .ok_or(RectifyError::HomographySolve)?;
        let img_from_rect = self
            .backend
            .solve_homography(&dst_pts, &src_pts)
            .ok_or(RectifyError::HomographySolve)?;
        let rectified = self
            .backend
            .warp(src, &img_from_rect, w, h)
            .ok_or(RectifyError::WarpFailed)?;

        let err = mean_reprojection_error(&forward, &src_pts, &dst_pts);
        let mean_reprojection_error = if err.is_finite() { err } else { f64::INFINITY };
        let warning = if mean_reprojection_error > self.params.warn_reprojection_px {
            warn!("high reprojection error: {mean_reprojection_error:.2} px");
            Some(format!(
                "mean reprojection error {:.2} px exceeds {:.1} px",
                mean_reprojection_error, self.params.warn_reprojection_px
            ))
        } else {
            None
        };

        let inverse = self.backend.invert(&forward);
        if inverse.is_none() {
            warn!("forward transform is not invertible; inverse mapping disabled");
        }

        debug!("rectified to {w}x{h} at {density:.4} px/mm, error {mean_reprojection_error:.2e} px");

        let state = Rc::new(WarpState {
            forward,
            inverse,
            width: w,
            height: h,
            px_per_mm: density,
            mean_reprojection_error,
            signature,
            rectified,
            warning,
        });
        self.cache = Some(Rc::clone(&state));
        Ok(state)
    }
}
