use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinator state.
///
/// `Empty -> Detecting -> {Detected, NoRegion} -> Calibrating ->
/// {Calibrated, Uncalibrated} -> Rectifying -> {Rectified, RectifyError}`.
/// Corner edits jump back to `Calibrating`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Empty,
    Detecting,
    Detected,
    NoRegion,
    Calibrating,
    Calibrated,
    Uncalibrated,
    Rectifying,
    Rectified,
    RectifyError,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Empty => "empty",
            PipelineState::Detecting => "detecting",
            PipelineState::Detected => "detected",
            PipelineState::NoRegion => "no_region",
            PipelineState::Calibrating => "calibrating",
            PipelineState::Calibrated => "calibrated",
            PipelineState::Uncalibrated => "uncalibrated",
            PipelineState::Rectifying => "rectifying",
            PipelineState::Rectified => "rectified",
            PipelineState::RectifyError => "rectify_error",
        }
    }

    /// States in which a quad exists and corner edits are accepted.
    pub fn accepts_edits(self) -> bool {
        !matches!(self, PipelineState::Empty | PipelineState::Detecting)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
