//! High-level facade crate for the `paper-rectify-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometry core and the sheet detector
//! - metric calibration against a sheet of known size ([`calibrate`])
//! - cached perspective rectification ([`RectificationEngine`])
//! - an event-driven session coordinator ([`PipelineCoordinator`]) that
//!   re-runs calibration and rectification on corner edits
//! - (feature-gated) `image`-crate helpers and the `paper-rectify` CLI
//!
//! ## Quickstart
//!
//! ```no_run
//! use paper_rectify::core::NativeBackend;
//! use paper_rectify::{PipelineConfig, PipelineCoordinator, PipelineState};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = paper_rectify::detect::load_rgb("desk.jpg")?;
//! let mut pipe = PipelineCoordinator::new(PipelineConfig::default(), NativeBackend);
//! pipe.load_image(img);
//!
//! if let Some(cal) = pipe.calibration() {
//!     println!("{:.3} mm/px ({:?})", cal.mm_per_px, cal.orientation);
//! }
//! if pipe.state() == PipelineState::Rectified {
//!     let warp = pipe.warp().expect("rectified state has a warp");
//!     paper_rectify::detect::save_rgb(&warp.rectified, "sheet.png")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `paper_rectify::core`: quads, homographies, RGB rasters, the `WarpBackend` seam.
//! - `paper_rectify::detector`: sampling, segmentation, regions, oriented quads.
//! - `paper_rectify::detect` (feature `image`): helpers for `image::RgbImage` and files.

pub use paper_rectify_core as core;
pub use paper_rectify_detect as detector;

mod calibration;
mod io;
mod pipeline;
mod rectification;

pub use calibration::{
    calibrate, quad_extent_px, CalibrationParams, CalibrationRejection, CalibrationResult,
    Orientation, PaperSpec,
};
pub use io::{ConfigIoError, PipelineConfig, PipelineReport, WarpSummary};
pub use pipeline::{placeholder_quad, PipelineCoordinator, PipelineState, ReadinessGate};
pub use rectification::{
    mean_reprojection_error, output_size, warp_signature, RectificationEngine, RectifyError,
    RectifyParams, WarpState,
};

pub use paper_rectify_core::{order_quad, validate_ordered, Quad, QuadParams};
pub use paper_rectify_detect::{DetectorParams, SheetDetection, SheetDetector};

#[cfg(feature = "image")]
pub mod detect;
