use crate::{
    estimate_oriented_quad, principal_angle, sample_for_detection, segment_foreground,
    OrientedQuadParams, RegionExtractor, RegionParams, SamplerParams, SegmentParams,
};
use log::debug;
use nalgebra::Point2;
use paper_rectify_core::RgbImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for the whole detection pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub sampler: SamplerParams,
    pub segment: SegmentParams,
    pub region: RegionParams,
    pub oriented: OrientedQuadParams,
}

/// Output of a successful detection pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetDetection {
    /// Oriented quad corners in source-image coordinates, unordered.
    pub corners: [Point2<f64>; 4],
    /// Principal angle of the region in radians.
    pub angle: f64,
    /// Region area in working-frame pixels.
    pub region_area: usize,
    /// Luminance threshold chosen by segmentation.
    pub threshold: u8,
    /// Source-to-working scale used for detection.
    pub working_scale: f64,
}

/// Single-sheet detector: downsample, segment, keep the largest region and
/// fit a padded oriented rectangle to it.
#[derive(Debug, Default)]
pub struct SheetDetector {
    params: DetectorParams,
    extractor: RegionExtractor,
}

impl SheetDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            extractor: RegionExtractor::new(),
        }
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Detect the sheet. `None` means no qualifying region, which is a normal outcome.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, src), fields(width = src.width, height = src.height))
    )]
    pub fn detect(&mut self, src: &RgbImageView<'_>) -> Option<SheetDetection> {
        if src.width == 0 || src.height == 0 {
            return None;
        }

        let working = sample_for_detection(src, &self.params.sampler);
        let view = working.image.view();

        let mask = segment_foreground(&view, &self.params.segment)?;
        let region = self.extractor.extract_largest(&mask, &self.params.region)?;

        let corners = estimate_oriented_quad(
            &region,
            view.width,
            view.height,
            working.scale,
            &self.params.oriented,
        );
        let angle = principal_angle(&region, self.params.oriented.isotropy_eps);

        debug!(
            "sheet detected: area={} threshold={} scale={:.4}",
            region.area, mask.threshold, working.scale
        );

        Some(SheetDetection {
            corners,
            angle,
            region_area: region.area,
            threshold: mask.threshold,
            working_scale: working.scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_rectify_core::RgbImage;

    #[test]
    fn detects_bright_sheet_on_dark_background() {
        let mut img = RgbImage::new(1280, 960);
        img.fill_rect(0, 0, 1280, 960, [60, 55, 50]);
        img.fill_rect(400, 200, 880, 760, [235, 235, 230]);

        let mut detector = SheetDetector::new(DetectorParams {
            oriented: OrientedQuadParams {
                padding_frac: 0.0,
                ..OrientedQuadParams::default()
            },
            ..DetectorParams::default()
        });
        let det = detector.detect(&img.view()).expect("sheet");
        assert_eq!(det.working_scale, 0.5);

        let xs: Vec<f64> = det.corners.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = det.corners.iter().map(|p| p.y).collect();
        let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((min_x - 400.0).abs() <= 2.0, "min_x {min_x}");
        assert!((max_x - 880.0).abs() <= 2.0, "max_x {max_x}");
        assert!((min_y - 200.0).abs() <= 2.0, "min_y {min_y}");
        assert!((max_y - 760.0).abs() <= 2.0, "max_y {max_y}");
    }

    #[test]
    fn uniform_dark_frame_has_no_sheet() {
        let mut img = RgbImage::new(320, 240);
        img.fill_rect(0, 0, 320, 240, [30, 30, 30]);
        assert!(SheetDetector::default().detect(&img.view()).is_none());
    }

    #[test]
    fn scattered_specks_are_rejected_as_too_small() {
        let mut img = RgbImage::new(200, 200);
        for k in 0..10 {
            let x = 10 + 18 * k;
            img.fill_rect(x, 100, x + 2, 102, [250, 250, 250]);
        }
        assert!(SheetDetector::default().detect(&img.view()).is_none());
    }
}
