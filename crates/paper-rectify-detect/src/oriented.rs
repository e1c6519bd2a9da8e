//! Principal-axis bounding quadrilateral of a region.

use crate::Region;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientedQuadParams {
    /// Padding added to each axis, as a fraction of the extent along it.
    /// Half of it goes to each side.
    pub padding_frac: f64,
    /// Below this, `|cov_xy|` and `|cov_xx - cov_yy|` count as isotropic.
    pub isotropy_eps: f64,
}

impl Default for OrientedQuadParams {
    fn default() -> Self {
        Self {
            padding_frac: 0.04,
            isotropy_eps: 1e-3,
        }
    }
}

/// Oriented bounding rectangle in the working frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    /// Principal angle in radians.
    pub angle: f64,
    /// Corners, unordered, clamped to the working frame.
    pub corners: [Point2<f64>; 4],
}

/// Principal-axis angle `½·atan2(2·cov_xy, cov_xx − cov_yy)`; 0 for isotropic regions.
pub fn principal_angle(region: &Region, isotropy_eps: f64) -> f64 {
    let (cxx, cyy, cxy) = region.covariance();
    if cxy.abs() < isotropy_eps && (cxx - cyy).abs() < isotropy_eps {
        return 0.0;
    }
    0.5 * (2.0 * cxy).atan2(cxx - cyy)
}

/// Padded oriented bounding rectangle of `region` in the working frame.
pub fn oriented_box(
    region: &Region,
    working_width: usize,
    working_height: usize,
    params: &OrientedQuadParams,
) -> OrientedBox {
    let angle = principal_angle(region, params.isotropy_eps);
    let (s, c) = angle.sin_cos();

    let mut u_min = f64::INFINITY;
    let mut u_max = f64::NEG_INFINITY;
    let mut v_min = f64::INFINITY;
    let mut v_max = f64::NEG_INFINITY;
    for &[x, y] in &region.pixels {
        let px = x as f64 + 0.5;
        let py = y as f64 + 0.5;
        let u = px * c + py * s;
        let v = -px * s + py * c;
        u_min = u_min.min(u);
        u_max = u_max.max(u);
        v_min = v_min.min(v);
        v_max = v_max.max(v);
    }

    // pixel centres -> pixel edges
    u_min -= 0.5;
    u_max += 0.5;
    v_min -= 0.5;
    v_max += 0.5;

    let pad_u = 0.5 * params.padding_frac * (u_max - u_min);
    let pad_v = 0.5 * params.padding_frac * (v_max - v_min);
    u_min -= pad_u;
    u_max += pad_u;
    v_min -= pad_v;
    v_max += pad_v;

    let w = working_width as f64;
    let h = working_height as f64;
    let corners = [(u_min, v_min), (u_max, v_min), (u_max, v_max), (u_min, v_max)].map(|(u, v)| {
        let x = u * c - v * s;
        let y = u * s + v * c;
        Point2::new(x.clamp(0.0, w), y.clamp(0.0, h))
    });

    debug!(
        "oriented box angle={:.2}deg extent=({:.1}, {:.1})",
        angle.to_degrees(),
        u_max - u_min,
        v_max - v_min
    );

    OrientedBox { angle, corners }
}

/// Oriented quad of `region` mapped into source coordinates (`working / scale`).
pub fn estimate_oriented_quad(
    region: &Region,
    working_width: usize,
    working_height: usize,
    scale: f64,
    params: &OrientedQuadParams,
) -> [Point2<f64>; 4] {
    let b = oriented_box(region, working_width, working_height, params);
    b.corners.map(|p| Point2::new(p.x / scale, p.y / scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extract_largest_region, ForegroundMask, RegionParams};

    fn mask_with<F: Fn(usize, usize) -> bool>(w: usize, h: usize, f: F) -> ForegroundMask {
        let mut data = vec![false; w * h];
        for y in 0..h {
            for x in 0..w {
                data[y * w + x] = f(x, y);
            }
        }
        let count = data.iter().filter(|&&v| v).count();
        ForegroundMask {
            width: w,
            height: h,
            data,
            count,
            threshold: 200,
        }
    }

    fn sorted(mut pts: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
        pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        pts
    }

    fn assert_same_corners(got: [Point2<f64>; 4], want: [(f64, f64); 4], tol: f64) {
        let got = sorted(got.iter().map(|p| (p.x, p.y)).collect());
        let want = sorted(want.to_vec());
        for (g, w) in got.iter().zip(&want) {
            assert!(
                (g.0 - w.0).abs() < tol && (g.1 - w.1).abs() < tol,
                "got {got:?}, want {want:?}"
            );
        }
    }

    #[test]
    fn axis_aligned_rectangle_without_padding() {
        let mask = mask_with(100, 80, |x, y| (20..70).contains(&x) && (10..40).contains(&y));
        let region = extract_largest_region(&mask, &RegionParams::default()).expect("region");
        let params = OrientedQuadParams {
            padding_frac: 0.0,
            ..OrientedQuadParams::default()
        };
        let b = oriented_box(&region, 100, 80, &params);
        assert!(b.angle.abs() < 1e-9);
        assert_same_corners(
            b.corners,
            [(20.0, 10.0), (70.0, 10.0), (70.0, 40.0), (20.0, 40.0)],
            1e-9,
        );
    }

    #[test]
    fn tall_rectangle_has_vertical_principal_axis() {
        let mask = mask_with(100, 100, |x, y| (40..60).contains(&x) && (10..90).contains(&y));
        let region = extract_largest_region(&mask, &RegionParams::default()).expect("region");
        let angle = principal_angle(&region, 1e-3);
        assert!((angle.abs() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let b = oriented_box(
            &region,
            100,
            100,
            &OrientedQuadParams {
                padding_frac: 0.0,
                ..OrientedQuadParams::default()
            },
        );
        assert_same_corners(
            b.corners,
            [(40.0, 10.0), (60.0, 10.0), (60.0, 90.0), (40.0, 90.0)],
            1e-6,
        );
    }

    #[test]
    fn square_is_isotropic() {
        let mask = mask_with(50, 50, |x, y| (10..30).contains(&x) && (10..30).contains(&y));
        let region = extract_largest_region(&mask, &RegionParams::default()).expect("region");
        assert_eq!(principal_angle(&region, 1e-3), 0.0);
    }

    #[test]
    fn rotated_rectangle_angle_is_recovered() {
        let theta = 30f64.to_radians();
        let (s, c) = theta.sin_cos();
        let mask = mask_with(200, 200, |x, y| {
            let dx = x as f64 + 0.5 - 100.0;
            let dy = y as f64 + 0.5 - 100.0;
            let u = dx * c + dy * s;
            let v = -dx * s + dy * c;
            u.abs() <= 60.0 && v.abs() <= 25.0
        });
        let region = extract_largest_region(&mask, &RegionParams::default()).expect("region");
        let angle = principal_angle(&region, 1e-3);
        assert!((angle - theta).abs() < 1e-2, "angle {}", angle.to_degrees());
    }

    #[test]
    fn padding_grows_extent_and_scale_maps_to_source() {
        let mask = mask_with(100, 80, |x, y| (20..70).contains(&x) && (10..40).contains(&y));
        let region = extract_largest_region(&mask, &RegionParams::default()).expect("region");
        let quad = estimate_oriented_quad(&region, 100, 80, 0.5, &OrientedQuadParams::default());
        // 50x30 px padded by 4% per axis: 52x31.2, then doubled
        assert_same_corners(
            quad,
            [(38.0, 18.8), (142.0, 18.8), (142.0, 81.2), (38.0, 81.2)],
            1e-9,
        );
    }

    #[test]
    fn corners_are_clamped_to_frame() {
        let mask = mask_with(40, 40, |_, _| true);
        let region = extract_largest_region(&mask, &RegionParams::default()).expect("region");
        let b = oriented_box(&region, 40, 40, &OrientedQuadParams::default());
        for p in b.corners {
            assert!((0.0..=40.0).contains(&p.x) && (0.0..=40.0).contains(&p.y));
        }
    }
}
