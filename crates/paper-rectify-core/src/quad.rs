//! Quadrilateral ordering and validation.
//!
//! Detector output and user-edited corners both pass through [`order_quad`]
//! before they are used for calibration or rectification. A [`Quad`] can only
//! be obtained from these checks, so holding one means the corners form a
//! convex, non-degenerate polygon in TL, TR, BR, BL order.
//!
//! "TL" is a convention: the corner with the smallest `x + y` comes first and
//! the rest follow clockwise on screen (y pointing down).

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Thresholds for quad validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadParams {
    /// Minimal polygon area in px².
    pub min_area: f64,
    /// Minimal `|cross| / (|e1| * |e2|)` at every corner (sine of the turn angle).
    pub min_corner_sine: f64,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_area: 1.0,
            min_corner_sine: 1e-3,
        }
    }
}

/// A validated quadrilateral in TL, TR, BR, BL order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Quad {
    corners: [Point2<f64>; 4],
}

impl Quad {
    #[inline]
    pub fn corners(&self) -> &[Point2<f64>; 4] {
        &self.corners
    }

    pub fn tl(&self) -> Point2<f64> {
        self.corners[0]
    }

    pub fn tr(&self) -> Point2<f64> {
        self.corners[1]
    }

    pub fn br(&self) -> Point2<f64> {
        self.corners[2]
    }

    pub fn bl(&self) -> Point2<f64> {
        self.corners[3]
    }

    pub fn centroid(&self) -> Point2<f64> {
        centroid(&self.corners)
    }

    /// Unsigned polygon area in px².
    pub fn area(&self) -> f64 {
        shoelace_area(&self.corners).abs()
    }

    /// Edge lengths `[TL→TR, TR→BR, BR→BL, BL→TL]`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        let c = &self.corners;
        [0, 1, 2, 3].map(|i| (c[(i + 1) % 4] - c[i]).norm())
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let mut b = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.corners {
            b.0 = b.0.min(p.x);
            b.1 = b.1.min(p.y);
            b.2 = b.2.max(p.x);
            b.3 = b.3.max(p.y);
        }
        b
    }

    /// Corners with `index` replaced; the result still has to be re-ordered.
    pub fn with_corner(&self, index: usize, p: Point2<f64>) -> [Point2<f64>; 4] {
        let mut out = self.corners;
        if let Some(slot) = out.get_mut(index) {
            *slot = p;
        }
        out
    }

    /// Uniformly rescale into another coordinate frame.
    pub fn scaled(&self, scale: f64, params: &QuadParams) -> Option<Quad> {
        let pts = self.corners.map(|p| Point2::new(p.x * scale, p.y * scale));
        order_quad(&pts, params)
    }
}

fn centroid(pts: &[Point2<f64>]) -> Point2<f64> {
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2::new(sx / n, sy / n)
}

/// Signed shoelace area; positive for clockwise-on-screen cycles.
fn shoelace_area(pts: &[Point2<f64>; 4]) -> f64 {
    let mut acc = 0.0;
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

#[inline]
fn cross(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Order four points into TL, TR, BR, BL and validate the result.
///
/// Points are sorted by polar angle around their centroid, then rotated so the
/// point with minimal `x + y` comes first (smaller `y`, then smaller `x`, on ties). Returns `None` if there are not
/// exactly four finite points or the ordered cycle fails [`validate_ordered`].
pub fn order_quad(points: &[Point2<f64>], params: &QuadParams) -> Option<Quad> {
    let finite: Vec<Point2<f64>> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    if finite.len() != 4 {
        return None;
    }

    let c = centroid(&finite);
    let mut keyed: Vec<(f64, Point2<f64>)> = finite
        .into_iter()
        .map(|p| ((p.y - c.y).atan2(p.x - c.x), p))
        .collect();
    keyed.sort_by(|(a, pa), (b, pb)| {
        a.total_cmp(b)
            .then(pa.x.total_cmp(&pb.x))
            .then(pa.y.total_cmp(&pb.y))
    });

    // exact `x + y` ties (45° rotations) go to the upper corner, then the left one
    let start = (0..4)
        .min_by(|&i, &j| {
            let (p, q) = (keyed[i].1, keyed[j].1);
            (p.x + p.y)
                .total_cmp(&(q.x + q.y))
                .then(p.y.total_cmp(&q.y))
                .then(p.x.total_cmp(&q.x))
        })
        .unwrap_or(0);

    let ordered = [0, 1, 2, 3].map(|k| keyed[(start + k) % 4].1);
    validate_ordered(&ordered, params)
}

/// Validate a caller-ordered cycle without reordering it.
///
/// Rejects non-finite input, area below `min_area`, near-collinear corners and
/// cycles whose turn direction is not consistent (concave or self-intersecting).
pub fn validate_ordered(points: &[Point2<f64>; 4], params: &QuadParams) -> Option<Quad> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return None;
    }

    if shoelace_area(points).abs() < params.min_area {
        return None;
    }

    let mut sign = 0.0_f64;
    for i in 0..4 {
        let a = points[i];
        let b = points[(i + 1) % 4];
        let c = points[(i + 2) % 4];
        let e1 = b - a;
        let e2 = c - b;
        let norm = e1.norm() * e2.norm();
        if norm <= 0.0 {
            return None;
        }
        let z = cross(e1, e2);
        if (z / norm).abs() < params.min_corner_sine {
            return None;
        }
        if sign == 0.0 {
            sign = z.signum();
        } else if z.signum() != sign {
            return None;
        }
    }

    Some(Quad { corners: *points })
}
