//! Connected-component extraction over the foreground mask.

use crate::ForegroundMask;
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionParams {
    /// Minimal area of the largest component, as a fraction of all pixels.
    pub min_area_fraction: f64,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            min_area_fraction: 0.01,
        }
    }
}

/// Raw first and second moment sums over integer pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub sum_x: f64,
    pub sum_y: f64,
    pub sum_xx: f64,
    pub sum_yy: f64,
    pub sum_xy: f64,
}

impl Moments {
    #[inline]
    fn add(&mut self, x: f64, y: f64) {
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }
}

/// A 4-connected set of mask pixels in the working frame.
#[derive(Clone, Debug)]
pub struct Region {
    pub area: usize,
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,
    pub moments: Moments,
    /// Member pixels as `[x, y]`.
    pub pixels: Vec<[u32; 2]>,
}

impl Region {
    /// Mean `(x̄, ȳ)` of member pixel coordinates.
    pub fn mean(&self) -> (f64, f64) {
        let n = self.area as f64;
        (self.moments.sum_x / n, self.moments.sum_y / n)
    }

    /// Population covariance `(cov_xx, cov_yy, cov_xy)`.
    pub fn covariance(&self) -> (f64, f64, f64) {
        let n = self.area as f64;
        let (mx, my) = self.mean();
        let m = &self.moments;
        (
            m.sum_xx / n - mx * mx,
            m.sum_yy / n - my * my,
            m.sum_xy / n - mx * my,
        )
    }
}

#[derive(Clone, Copy)]
struct Bounds {
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

/// Flood-fill component extractor with reusable scratch buffers.
///
/// Uses an explicit stack, so component size is bounded only by memory.
#[derive(Debug, Default)]
pub struct RegionExtractor {
    visited: Vec<bool>,
    stack: Vec<usize>,
    component: Vec<usize>,
    best: Vec<usize>,
}

impl RegionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest 4-connected component of `mask`, or `None` if it covers less
    /// than `min_area_fraction` of the mask.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, mask, params), fields(width = mask.width, height = mask.height))
    )]
    pub fn extract_largest(
        &mut self,
        mask: &ForegroundMask,
        params: &RegionParams,
    ) -> Option<Region> {
        let (w, h) = (mask.width, mask.height);
        let total = w * h;
        if total == 0 || mask.data.len() != total {
            return None;
        }

        self.visited.clear();
        self.visited.resize(total, false);
        self.best.clear();

        let mut best_stats: Option<(Moments, Bounds)> = None;
        let mut components = 0usize;

        for seed in 0..total {
            if !mask.data[seed] || self.visited[seed] {
                continue;
            }
            components += 1;

            self.component.clear();
            self.stack.clear();
            self.stack.push(seed);
            self.visited[seed] = true;

            let mut moments = Moments::default();
            let mut bounds = Bounds {
                min_x: usize::MAX,
                max_x: 0,
                min_y: usize::MAX,
                max_y: 0,
            };

            while let Some(idx) = self.stack.pop() {
                self.component.push(idx);
                let x = idx % w;
                let y = idx / w;
                moments.add(x as f64, y as f64);
                bounds.min_x = bounds.min_x.min(x);
                bounds.max_x = bounds.max_x.max(x);
                bounds.min_y = bounds.min_y.min(y);
                bounds.max_y = bounds.max_y.max(y);

                let mut visit = |n: usize| {
                    if mask.data[n] && !self.visited[n] {
                        self.visited[n] = true;
                        self.stack.push(n);
                    }
                };
                if x > 0 {
                    visit(idx - 1);
                }
                if x + 1 < w {
                    visit(idx + 1);
                }
                if y > 0 {
                    visit(idx - w);
                }
                if y + 1 < h {
                    visit(idx + w);
                }
            }

            if self.component.len() > self.best.len() {
                std::mem::swap(&mut self.component, &mut self.best);
                best_stats = Some((moments, bounds));
            }
        }

        let (moments, bounds) = best_stats?;
        let area = self.best.len();
        debug!("components={components} largest_area={area} of {total}");

        if (area as f64) < params.min_area_fraction * total as f64 {
            return None;
        }

        let pixels = self
            .best
            .iter()
            .map(|&idx| [(idx % w) as u32, (idx / w) as u32])
            .collect();

        Some(Region {
            area,
            min_x: bounds.min_x,
            max_x: bounds.max_x,
            min_y: bounds.min_y,
            max_y: bounds.max_y,
            moments,
            pixels,
        })
    }
}

/// One-shot convenience over [`RegionExtractor::extract_largest`].
pub fn extract_largest_region(mask: &ForegroundMask, params: &RegionParams) -> Option<Region> {
    RegionExtractor::new().extract_largest(mask, params)
}
