//! Reference-sheet detector built on top of `paper-rectify-core`.
//!
//! ## Quickstart
//!
//! ```
//! use paper_rectify_core::RgbImage;
//! use paper_rectify_detect::{DetectorParams, SheetDetector};
//!
//! let mut img = RgbImage::new(320, 240);
//! img.fill_rect(100, 60, 220, 180, [240, 240, 240]);
//!
//! let mut detector = SheetDetector::new(DetectorParams::default());
//! let detection = detector.detect(&img.view());
//! println!("detected: {}", detection.is_some());
//! ```
//!
//! Algorithm:
//! 1. Downsample to a working frame whose longer side is at most 640 px.
//! 2. Threshold luminance adaptively (brightest 12%, floored at 200) and gate
//!    on chroma and darkest channel.
//! 3. Flood-fill 4-connected components, keep the largest (at least 1% of the frame).
//! 4. Fit a rectangle along the region's principal axis, pad it by 4% and map
//!    its corners back into source coordinates.

mod detector;
mod oriented;
mod region;
mod sampler;
mod segment;

pub use detector::{DetectorParams, SheetDetection, SheetDetector};
pub use oriented::{
    estimate_oriented_quad, oriented_box, principal_angle, OrientedBox, OrientedQuadParams,
};
pub use region::{extract_largest_region, Moments, Region, RegionExtractor, RegionParams};
pub use sampler::{
    downsample, sample_for_detection, sample_for_display, SamplerParams, WorkingRaster,
    DETECTION_MAX_DIM, DISPLAY_MAX_DIM,
};
pub use segment::{
    brightness_threshold, luminance, luminance_histogram, segment_foreground, ForegroundMask,
    SegmentParams,
};
