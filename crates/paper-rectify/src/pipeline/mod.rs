//! Session coordinator: detection, calibration and rectification of one image.
//!
//! The coordinator is single-threaded and event driven. Callers feed it
//! three kinds of events:
//! - [`PipelineCoordinator::load_image`] runs detection and, on success, the
//!   whole chain synchronously;
//! - [`PipelineCoordinator::edit_corner`] / [`PipelineCoordinator::set_corners`]
//!   stash the edited corners; [`PipelineCoordinator::on_frame`] applies the
//!   latest stash once per display refresh;
//! - [`PipelineCoordinator::poll_backend`] retries a rectification that was
//!   queued while the backend was still loading.
//!
//! Every recompute bumps an epoch counter; a queued result from an older
//! epoch is dropped instead of being committed.

mod gate;
mod state;

pub use gate::ReadinessGate;
pub use state::PipelineState;

use crate::{
    calibrate, CalibrationRejection, CalibrationResult, Orientation, PaperSpec, PipelineConfig,
    PipelineReport, RectificationEngine, RectifyError, WarpState, WarpSummary,
};
use log::{debug, info, warn};
use nalgebra::Point2;
use paper_rectify_core::{order_quad, Quad, QuadParams, RgbImage, WarpBackend};
use paper_rectify_detect::{sample_for_display, SheetDetection, SheetDetector, WorkingRaster};
use std::rc::Rc;
use std::time::Instant;

/// Centred stand-in quad with the sheet's aspect ratio, used when detection
/// finds nothing.
///
/// The quad is portrait when the image is portrait and landscape otherwise,
/// and is the largest such rectangle inside 60% of the image on both axes.
pub fn placeholder_quad(width: usize, height: usize, paper: &PaperSpec) -> Option<Quad> {
    let (w, h) = (width as f64, height as f64);
    let (box_w, box_h) = (0.6 * w, 0.6 * h);
    let ratio = paper.short_mm / paper.long_mm;

    let (qw, qh) = if h > w {
        let qw = box_w.min(box_h * ratio);
        (qw, qw / ratio)
    } else {
        let qh = box_h.min(box_w * ratio);
        (qh / ratio, qh)
    };

    let x0 = 0.5 * (w - qw);
    let y0 = 0.5 * (h - qh);
    let pts = [
        Point2::new(x0, y0),
        Point2::new(x0 + qw, y0),
        Point2::new(x0 + qw, y0 + qh),
        Point2::new(x0, y0 + qh),
    ];
    order_quad(&pts, &QuadParams::default())
}

/// Queued rectification input.
#[derive(Clone, Debug)]
struct RectifyRequest {
    epoch: u64,
    quad: Quad,
    physical_mm: (f64, f64),
    px_per_mm: Option<f64>,
}

#[derive(Debug)]
struct Session {
    image: RgbImage,
    display: WorkingRaster,
    detection: Option<SheetDetection>,
    quad: Option<Quad>,
    placeholder: bool,
    calibration: Option<CalibrationResult>,
    rejection: Option<CalibrationRejection>,
    warp: Option<Rc<WarpState>>,
}

#[derive(Debug)]
pub struct PipelineCoordinator<B> {
    config: PipelineConfig,
    detector: SheetDetector,
    engine: RectificationEngine<B>,
    gate: ReadinessGate<RectifyRequest>,
    session: Option<Session>,
    state: PipelineState,
    history: Vec<PipelineState>,
    epoch: u64,
    pending_edit: Option<[Point2<f64>; 4]>,
    message: Option<String>,
}

impl<B: WarpBackend> PipelineCoordinator<B> {
    pub fn new(config: PipelineConfig, backend: B) -> Self {
        Self {
            detector: SheetDetector::new(config.detector.clone()),
            engine: RectificationEngine::new(backend, config.rectify.clone()),
            gate: ReadinessGate::new(config.poll_interval()),
            config,
            session: None,
            state: PipelineState::Empty,
            history: vec![PipelineState::Empty],
            epoch: 0,
            pending_edit: None,
            message: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        self.engine.backend()
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// States visited since the current image was loaded.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn image(&self) -> Option<&RgbImage> {
        self.session.as_ref().map(|s| &s.image)
    }

    /// Display-scale copy of the loaded image with its scale factor.
    pub fn display_raster(&self) -> Option<&WorkingRaster> {
        self.session.as_ref().map(|s| &s.display)
    }

    pub fn detection(&self) -> Option<&SheetDetection> {
        self.session.as_ref().and_then(|s| s.detection.as_ref())
    }

    pub fn quad(&self) -> Option<&Quad> {
        self.session.as_ref().and_then(|s| s.quad.as_ref())
    }

    pub fn is_placeholder(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.placeholder)
    }

    pub fn calibration(&self) -> Option<&CalibrationResult> {
        self.session.as_ref().and_then(|s| s.calibration.as_ref())
    }

    pub fn calibration_rejection(&self) -> Option<&CalibrationRejection> {
        self.session.as_ref().and_then(|s| s.rejection.as_ref())
    }

    pub fn warp(&self) -> Option<&Rc<WarpState>> {
        self.session.as_ref().and_then(|s| s.warp.as_ref())
    }

    /// User-facing message: rectification error, reprojection warning or
    /// "loading" notice.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// A rectification is queued until the backend becomes ready.
    pub fn is_waiting_for_backend(&self) -> bool {
        self.gate.has_pending()
    }

    pub fn has_pending_edit(&self) -> bool {
        self.pending_edit.is_some()
    }

    fn transition(&mut self, next: PipelineState) {
        info!("pipeline: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.session = None;
        self.engine.clear();
        self.pending_edit = None;
        self.message = None;
        self.history.clear();
        self.transition(PipelineState::Empty);
    }

    /// Drop the session and return to `Empty`.
    pub fn clear(&mut self) {
        self.reset();
    }

    /// Start a new session on `image` and run detection. When a sheet is
    /// found the chain continues through calibration and rectification;
    /// otherwise a placeholder quad is installed and the state is `NoRegion`.
    pub fn load_image(&mut self, image: RgbImage) -> PipelineState {
        self.reset();
        if image.width == 0 || image.height == 0 {
            self.message = Some("image is empty".to_string());
            return self.state;
        }

        let display = sample_for_display(&image.view(), &self.config.detector.sampler);
        self.transition(PipelineState::Detecting);

        let detection = self.detector.detect(&image.view());
        let quad = detection
            .as_ref()
            .and_then(|d| order_quad(&d.corners, &self.config.quad));

        let (width, height) = (image.width, image.height);
        let mut session = Session {
            image,
            display,
            detection,
            quad,
            placeholder: false,
            calibration: None,
            rejection: None,
            warp: None,
        };

        if quad.is_some() {
            self.session = Some(session);
            self.transition(PipelineState::Detected);
            self.recompute();
        } else {
            debug!("no sheet found; installing placeholder quad");
            session.quad = placeholder_quad(width, height, &self.config.paper);
            session.placeholder = session.quad.is_some();
            self.session = Some(session);
            self.transition(PipelineState::NoRegion);
        }
        self.state
    }

    /// Move one corner (`0..4`, in the current TL, TR, BR, BL order). Applied
    /// on the next [`on_frame`](Self::on_frame).
    pub fn edit_corner(&mut self, index: usize, p: Point2<f64>) -> bool {
        if index >= 4 {
            return false;
        }
        let pts = match (self.pending_edit, self.quad()) {
            (Some(mut pts), _) => {
                pts[index] = p;
                pts
            }
            (None, Some(q)) => q.with_corner(index, p),
            (None, None) => return false,
        };
        self.schedule_edit(pts)
    }

    /// Replace all four corners, in any order. Applied on the next
    /// [`on_frame`](Self::on_frame).
    pub fn set_corners(&mut self, corners: [Point2<f64>; 4]) -> bool {
        self.schedule_edit(corners)
    }

    fn schedule_edit(&mut self, pts: [Point2<f64>; 4]) -> bool {
        if self.session.is_none() || !self.state.accepts_edits() {
            return false;
        }
        if self.pending_edit.replace(pts).is_none() {
            debug!("recompute scheduled for next frame");
        }
        true
    }

    /// Display-refresh tick: apply the latest pending edit, if any.
    ///
    /// Returns `true` when a recompute ran. Invalid edited corners are
    /// dropped and the previous quad stays in place.
    pub fn on_frame(&mut self) -> bool {
        let Some(pts) = self.pending_edit.take() else {
            return false;
        };
        let Some(quad) = order_quad(&pts, &self.config.quad) else {
            debug!("edited corners do not form a valid quad; ignored");
            return false;
        };
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.quad = Some(quad);
        session.placeholder = false;
        self.recompute();
        true
    }

    /// Retry a queued rectification. Probes the backend at most once per
    /// poll interval; returns `true` when a released request was run. A
    /// request left over from an earlier recompute is dropped and leaves the
    /// session untouched.
    pub fn poll_backend(&mut self, now: Instant) -> bool {
        let engine = &self.engine;
        let Some(request) = self.gate.poll(now, || engine.backend().poll_ready()) else {
            return false;
        };
        self.run_rectify(request)
    }

    fn recompute(&mut self) {
        let Some((quad, width, height)) = self
            .session
            .as_ref()
            .and_then(|s| s.quad.map(|q| (q, s.image.width, s.image.height)))
        else {
            return;
        };

        self.epoch += 1;
        self.transition(PipelineState::Calibrating);

        let calibration = calibrate(
            &quad,
            width,
            height,
            &self.config.paper,
            &self.config.calibration,
        );
        let (physical_mm, px_per_mm, next) = match &calibration {
            Ok(c) => (c.physical_size_mm(), Some(c.px_per_mm), PipelineState::Calibrated),
            Err(reason) => {
                debug!("uncalibrated: {reason}");
                let orientation = Orientation::of_quad(&quad);
                (
                    self.config.paper.size_mm(orientation),
                    None,
                    PipelineState::Uncalibrated,
                )
            }
        };
        if let Some(s) = self.session.as_mut() {
            match calibration {
                Ok(c) => {
                    s.calibration = Some(c);
                    s.rejection = None;
                }
                Err(e) => {
                    s.calibration = None;
                    s.rejection = Some(e);
                }
            }
        }
        self.transition(next);

        let request = RectifyRequest {
            epoch: self.epoch,
            quad,
            physical_mm,
            px_per_mm,
        };

        let engine = &self.engine;
        if self.gate.check(|| engine.backend().poll_ready()) {
            self.run_rectify(request);
        } else {
            if self.gate.enqueue(request).is_some() {
                debug!("replaced queued rectification");
            }
            self.message = Some(RectifyError::BackendNotReady.to_string());
        }
    }

    fn run_rectify(&mut self, request: RectifyRequest) -> bool {
        if request.epoch != self.epoch {
            debug!(
                "discarding stale rectification (epoch {} != {})",
                request.epoch, self.epoch
            );
            return false;
        }
        if self.session.is_none() {
            return false;
        }

        self.message = None;
        self.transition(PipelineState::Rectifying);
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let result = self.engine.rectify(
            &request.quad,
            request.physical_mm,
            request.px_per_mm,
            &session.image.view(),
        );

        match result {
            Ok(warp) => {
                self.message = warp.warning.clone();
                session.warp = Some(warp);
                self.transition(PipelineState::Rectified);
            }
            Err(e) => {
                warn!("rectification failed: {e}");
                self.message = Some(e.to_string());
                session.warp = self.engine.current().cloned();
                self.transition(PipelineState::RectifyError);
            }
        }
        true
    }

    /// Snapshot of the session for serialization.
    pub fn report(&self) -> PipelineReport {
        let session = self.session.as_ref();
        PipelineReport {
            state: self.state,
            history: self.history.clone(),
            image_width: session.map_or(0, |s| s.image.width),
            image_height: session.map_or(0, |s| s.image.height),
            placeholder: self.is_placeholder(),
            corners: self.quad().map(|q| q.corners().map(|p| [p.x, p.y])),
            calibration: self.calibration().cloned(),
            calibration_rejection: self.calibration_rejection().map(|r| r.to_string()),
            warp: self.warp().map(|w| WarpSummary::from(w.as_ref())),
            message: self.message.clone(),
        }
    }
}
