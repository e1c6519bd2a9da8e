//! JSON configuration and report helpers.

use crate::{
    CalibrationParams, CalibrationResult, PaperSpec, PipelineState, RectifyParams, WarpState,
};
use paper_rectify_core::QuadParams;
use paper_rectify_detect::DetectorParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigIoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Every tunable of the pipeline. Missing sections fall back to defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paper: PaperSpec,
    pub detector: DetectorParams,
    pub quad: QuadParams,
    pub calibration: CalibrationParams,
    pub rectify: RectifyParams,
    /// Minimal delay between backend readiness probes.
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paper: PaperSpec::LETTER,
            detector: DetectorParams::default(),
            quad: QuadParams::default(),
            calibration: CalibrationParams::default(),
            rectify: RectifyParams::default(),
            poll_interval_ms: 100,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        write_pretty(self, path.as_ref())
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Serializable view of a [`WarpState`], without the raster.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WarpSummary {
    pub width: usize,
    pub height: usize,
    pub px_per_mm: f64,
    pub mean_reprojection_error: f64,
    /// Source -> rectified, row-major.
    pub forward: [[f64; 3]; 3],
    pub inverse: Option<[[f64; 3]; 3]>,
    pub warning: Option<String>,
}

impl From<&WarpState> for WarpSummary {
    fn from(w: &WarpState) -> Self {
        Self {
            width: w.width,
            height: w.height,
            px_per_mm: w.px_per_mm,
            mean_reprojection_error: w.mean_reprojection_error,
            forward: w.forward.to_array(),
            inverse: w.inverse.map(|h| h.to_array()),
            warning: w.warning.clone(),
        }
    }
}

/// Summary of a pipeline session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    /// States visited since the image was loaded.
    pub history: Vec<PipelineState>,
    pub image_width: usize,
    pub image_height: usize,
    /// `true` while the quad is the centred fallback, not a detection or edit.
    pub placeholder: bool,
    /// TL, TR, BR, BL in source pixels.
    pub corners: Option<[[f64; 2]; 4]>,
    pub calibration: Option<CalibrationResult>,
    pub calibration_rejection: Option<String>,
    pub warp: Option<WarpSummary>,
    pub message: Option<String>,
}

impl PipelineReport {
    /// Write the report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        write_pretty(self, path.as_ref())
    }
}
