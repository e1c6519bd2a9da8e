use crate::{sample_bilinear_rgb, RgbImage, RgbImageView};
use log::debug;
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Tolerance on `H * H^-1 = I` for an inverse to count as usable.
const INVERSE_ROUND_TRIP_TOL: f64 = 1e-6;

/// Projective 3x3 transform acting on homogeneous image points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    /// Inverse transform, rejecting singular and badly conditioned matrices.
    ///
    /// The inverse is accepted only if it is finite and `H * H^-1` reproduces
    /// the identity.
    pub fn inverse(&self) -> Option<Self> {
        if self.h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let inv = self.h.try_inverse()?;
        if inv.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let residual = (self.h * inv - Matrix3::identity()).abs().max();
        if residual > INVERSE_ROUND_TRIP_TOL {
            debug!("inverse rejected: round-trip residual {residual:.3e}");
            return None;
        }
        let inv = with_unit_h33(inv).unwrap_or(inv);
        Some(Self::new(inv))
    }
}

/// Similarity moving the centroid of `pts` to the origin with mean
/// distance `sqrt(2)` from it.
fn conditioning(pts: &[Point2<f64>; 4]) -> Matrix3<f64> {
    let c = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / 4.0;
    let spread = pts.iter().map(|p| (p.coords - c).norm()).sum::<f64>() / 4.0;
    let s = if spread > 1e-12 { SQRT_2 / spread } else { 1.0 };
    Matrix3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0)
}

fn transform4(t: &Matrix3<f64>, pts: &[Point2<f64>; 4]) -> [Point2<f64>; 4] {
    pts.map(|p| {
        let v = t * p.to_homogeneous();
        Point2::new(v.x, v.y)
    })
}

/// Scale so that `h33 = 1`. `None` for non-finite entries or vanishing `h33`.
fn with_unit_h33(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

/// Solve `dst ~ H * src` from exactly four correspondences.
///
/// Both point sets are conditioned (Hartley) before the 8x8 solve with
/// `h33 = 1`. Returns `None` for non-finite input or a singular system, e.g.
/// three collinear points.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    if src.iter().chain(dst).any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return None;
    }

    let t_src = conditioning(src);
    let t_dst = conditioning(dst);
    let s = transform4(&t_src, src);
    let d = transform4(&t_dst, dst);

    // two rows per correspondence (x, y) -> (u, v), unknowns h11..h32
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (p, q)) in s.iter().zip(&d).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        a.set_row(
            2 * k,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]),
        );
        a.set_row(
            2 * k + 1,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]),
        );
        b[2 * k] = u;
        b[2 * k + 1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    let h = t_dst.try_inverse()? * hn * t_src;
    with_unit_h33(h).map(Homography::new)
}

/// Warp into a rectified raster: for each dst pixel, map to src via `h_img_from_rect` and sample.
pub fn warp_perspective_rgb(
    src: &RgbImageView<'_>,
    h_img_from_rect: &Homography,
    out_w: usize,
    out_h: usize,
) -> RgbImage {
    let mut out = RgbImage::new(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            // destination pixel centre in continuous rect coords
            let pr = Point2::new(x as f64 + 0.5, y as f64 + 0.5);
            let pi = h_img_from_rect.apply(pr);
            if !pi.x.is_finite() || !pi.y.is_finite() {
                continue;
            }
            // continuous source coords -> pixel-centre sampling grid
            let v = sample_bilinear_rgb(src, (pi.x - 0.5) as f32, (pi.y - 0.5) as f32);
            out.put_pixel(x, y, v);
        }
    }

    out
}
