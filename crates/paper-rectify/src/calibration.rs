//! Metric calibration from a sheet of known physical size.
//!
//! Given a validated quad, the sheet's edge lengths in pixels are compared
//! with its physical size. The quad is rejected when its aspect ratio or its
//! position in the frame do not look like the expected sheet.

use log::debug;
use paper_rectify_core::Quad;
use serde::{Deserialize, Serialize};

/// Physical size of the reference sheet in millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperSpec {
    pub short_mm: f64,
    pub long_mm: f64,
}

impl PaperSpec {
    /// US Letter, 8.5 x 11 in.
    pub const LETTER: Self = Self {
        short_mm: 215.9,
        long_mm: 279.4,
    };

    /// ISO A4.
    pub const A4: Self = Self {
        short_mm: 210.0,
        long_mm: 297.0,
    };

    /// Custom sheet; the sides may be given in either order.
    pub fn new(a_mm: f64, b_mm: f64) -> Self {
        Self {
            short_mm: a_mm.min(b_mm),
            long_mm: a_mm.max(b_mm),
        }
    }

    /// Long side over short side.
    #[inline]
    pub fn aspect(&self) -> f64 {
        self.long_mm / self.short_mm
    }

    /// `(width_mm, height_mm)` of the sheet seen in `orientation`.
    pub fn size_mm(&self, orientation: Orientation) -> (f64, f64) {
        match orientation {
            Orientation::Landscape => (self.long_mm, self.short_mm),
            Orientation::Portrait => (self.short_mm, self.long_mm),
        }
    }
}

impl Default for PaperSpec {
    fn default() -> Self {
        Self::LETTER
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Maximal `|observed_aspect - target_aspect|`, in ratio units.
    pub aspect_tolerance: f64,
    /// Maximal centroid offset from the image centre, as a fraction of the
    /// image width (x) and height (y).
    pub center_tolerance: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            aspect_tolerance: 0.25,
            center_tolerance: 0.35,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape iff `width_px >= height_px`.
    #[inline]
    pub fn from_extent(width_px: f64, height_px: f64) -> Self {
        if width_px >= height_px {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Orientation of a quad from its averaged opposite edges.
    pub fn of_quad(quad: &Quad) -> Self {
        let (w, h) = quad_extent_px(quad);
        Self::from_extent(w, h)
    }
}

/// Why a quad could not be calibrated. The quad itself stays usable.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum CalibrationRejection {
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: usize, height: usize },

    #[error("quad has degenerate edge lengths ({width_px:.3} x {height_px:.3} px)")]
    DegenerateEdges { width_px: f64, height_px: f64 },

    #[error("aspect ratio {observed:.3} does not match the sheet ({target:.3})")]
    AspectMismatch { observed: f64, target: f64 },

    #[error("quad centre is too far from the image centre (dx={dx_frac:.3}, dy={dy_frac:.3})")]
    OffCentre { dx_frac: f64, dy_frac: f64 },

    #[error("non-finite or non-positive scale ({mm_per_px})")]
    NonFiniteScale { mm_per_px: f64 },
}

/// Metric calibration of the current image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationResult {
    /// Average of the per-axis scales.
    pub mm_per_px: f64,
    pub px_per_mm: f64,
    pub mm_per_px_x: f64,
    pub mm_per_px_y: f64,
    pub orientation: Orientation,
    /// Quad bounding-box area over image area, in percent.
    pub coverage_percent: f64,
    pub quad: Quad,
    pub image_width: usize,
    pub image_height: usize,
    /// Averaged top/bottom edge length.
    pub width_px: f64,
    /// Averaged left/right edge length.
    pub height_px: f64,
    pub physical_width_mm: f64,
    pub physical_height_mm: f64,
}

impl CalibrationResult {
    /// `(width_mm, height_mm)` of the sheet as it appears in the image.
    pub fn physical_size_mm(&self) -> (f64, f64) {
        (self.physical_width_mm, self.physical_height_mm)
    }
}

/// `((e0 + e2) / 2, (e1 + e3) / 2)` over the TL→TR, TR→BR, BR→BL, BL→TL edges.
pub fn quad_extent_px(quad: &Quad) -> (f64, f64) {
    let e = quad.edge_lengths();
    (0.5 * (e[0] + e[2]), 0.5 * (e[1] + e[3]))
}

/// Calibrate `quad` against `paper` in an `image_width x image_height` frame.
pub fn calibrate(
    quad: &Quad,
    image_width: usize,
    image_height: usize,
    paper: &PaperSpec,
    params: &CalibrationParams,
) -> Result<CalibrationResult, CalibrationRejection> {
    if image_width == 0 || image_height == 0 {
        return Err(CalibrationRejection::InvalidImageSize {
            width: image_width,
            height: image_height,
        });
    }
    let (img_w, img_h) = (image_width as f64, image_height as f64);

    let (width_px, height_px) = quad_extent_px(quad);
    if !(width_px.is_finite() && height_px.is_finite() && width_px > 0.0 && height_px > 0.0) {
        return Err(CalibrationRejection::DegenerateEdges {
            width_px,
            height_px,
        });
    }

    let observed = width_px.max(height_px) / width_px.min(height_px);
    let target = paper.aspect();
    if (observed - target).abs() > params.aspect_tolerance {
        debug!("calibration rejected: aspect {observed:.3} vs {target:.3}");
        return Err(CalibrationRejection::AspectMismatch { observed, target });
    }

    let c = quad.centroid();
    let dx_frac = (c.x - 0.5 * img_w).abs() / img_w;
    let dy_frac = (c.y - 0.5 * img_h).abs() / img_h;
    if dx_frac > params.center_tolerance || dy_frac > params.center_tolerance {
        debug!("calibration rejected: centroid offset ({dx_frac:.3}, {dy_frac:.3})");
        return Err(CalibrationRejection::OffCentre { dx_frac, dy_frac });
    }

    let orientation = Orientation::from_extent(width_px, height_px);
    let (physical_width_mm, physical_height_mm) = paper.size_mm(orientation);

    let mm_per_px_x = physical_width_mm / width_px;
    let mm_per_px_y = physical_height_mm / height_px;
    let mm_per_px = 0.5 * (mm_per_px_x + mm_per_px_y);
    if !mm_per_px.is_finite() || mm_per_px <= 0.0 {
        return Err(CalibrationRejection::NonFiniteScale { mm_per_px });
    }

    let (min_x, min_y, max_x, max_y) = quad.bounding_box();
    let coverage_percent = ((max_x - min_x) * (max_y - min_y) / (img_w * img_h) * 100.0)
        .clamp(0.0, 100.0);

    debug!(
        "calibrated: {:.4} mm/px, {:?}, coverage {:.1}%",
        mm_per_px, orientation, coverage_percent
    );

    Ok(CalibrationResult {
        mm_per_px,
        px_per_mm: 1.0 / mm_per_px,
        mm_per_px_x,
        mm_per_px_y,
        orientation,
        coverage_percent,
        quad: *quad,
        image_width,
        image_height,
        width_px,
        height_px,
        physical_width_mm,
        physical_height_mm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use paper_rectify_core::{order_quad, QuadParams};

    fn rect(x0: f64, y0: f64, w: f64, h: f64) -> Quad {
        let pts = [
            Point2::new(x0, y0),
            Point2::new(x0 + w, y0),
            Point2::new(x0 + w, y0 + h),
            Point2::new(x0, y0 + h),
        ];
        order_quad(&pts, &QuadParams::default()).expect("valid rectangle")
    }

    #[test]
    fn letter_portrait_scale_matches_analytic_value() {
        // 850 x 1100 px centred in a 1200 x 1400 frame
        let quad = rect(175.0, 150.0, 850.0, 1100.0);
        let cal = calibrate(
            &quad,
            1200,
            1400,
            &PaperSpec::LETTER,
            &CalibrationParams::default(),
        )
        .expect("calibrated");

        assert_eq!(cal.orientation, Orientation::Portrait);
        let expected = 215.9 / 850.0;
        assert!((cal.mm_per_px - expected).abs() / expected < 0.01);
        assert_relative_eq!(cal.px_per_mm * cal.mm_per_px, 1.0, epsilon = 1e-12);
        assert_eq!(cal.physical_size_mm(), (215.9, 279.4));
        assert_relative_eq!(
            cal.coverage_percent,
            850.0 * 1100.0 / (1200.0 * 1400.0) * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn wrong_aspect_ratio_is_rejected() {
        let quad = rect(300.0, 0.0, 400.0, 1000.0);
        let err = calibrate(
            &quad,
            1000,
            1000,
            &PaperSpec::LETTER,
            &CalibrationParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationRejection::AspectMismatch { observed, .. } if (observed - 2.5).abs() < 1e-9));
    }

    #[test]
    fn centring_window_is_thirty_five_percent() {
        let params = CalibrationParams::default();
        let paper = PaperSpec::LETTER;
        // 100 x 129.4 px sheet in a 1000 x 1000 frame
        let at = |cx: f64| rect(cx - 50.0, 500.0 - 64.7, 100.0, 129.4);

        assert!(calibrate(&at(840.0), 1000, 1000, &paper, &params).is_ok());
        assert!(calibrate(&at(160.0), 1000, 1000, &paper, &params).is_ok());
        let err = calibrate(&at(860.0), 1000, 1000, &paper, &params).unwrap_err();
        assert!(matches!(err, CalibrationRejection::OffCentre { .. }));
        assert!(calibrate(&at(140.0), 1000, 1000, &paper, &params).is_err());
    }

    #[test]
    fn square_extent_counts_as_landscape() {
        assert_eq!(Orientation::from_extent(10.0, 10.0), Orientation::Landscape);
        assert_eq!(Orientation::from_extent(9.999, 10.0), Orientation::Portrait);

        let square = PaperSpec::new(200.0, 200.0);
        let cal = calibrate(
            &rect(400.0, 400.0, 200.0, 200.0),
            1000,
            1000,
            &square,
            &CalibrationParams::default(),
        )
        .expect("calibrated");
        assert_eq!(cal.orientation, Orientation::Landscape);
    }

    #[test]
    fn landscape_sheet_swaps_physical_sides() {
        let quad = rect(100.0, 200.0, 1100.0, 850.0);
        let cal = calibrate(
            &quad,
            1300,
            1250,
            &PaperSpec::LETTER,
            &CalibrationParams::default(),
        )
        .expect("calibrated");
        assert_eq!(cal.orientation, Orientation::Landscape);
        assert_eq!(cal.physical_size_mm(), (279.4, 215.9));
        assert_relative_eq!(cal.mm_per_px_x, 279.4 / 1100.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_image_is_rejected() {
        let quad = rect(0.0, 0.0, 10.0, 13.0);
        assert!(matches!(
            calibrate(&quad, 0, 10, &PaperSpec::LETTER, &CalibrationParams::default()),
            Err(CalibrationRejection::InvalidImageSize { .. })
        ));
    }

    #[test]
    fn presets_have_expected_aspect() {
        assert_relative_eq!(PaperSpec::LETTER.aspect(), 11.0 / 8.5, epsilon = 1e-9);
        assert_relative_eq!(PaperSpec::A4.aspect(), 297.0 / 210.0, epsilon = 1e-12);
        assert_eq!(PaperSpec::new(297.0, 210.0), PaperSpec::A4);
    }
}
