//! Bounded-resolution copies of the source raster.

use paper_rectify_core::{RgbImage, RgbImageView};
use serde::{Deserialize, Serialize};

/// Longer-side cap used for detection.
pub const DETECTION_MAX_DIM: usize = 640;
/// Longer-side cap used for display-scale copies.
pub const DISPLAY_MAX_DIM: usize = 1280;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    pub detection_max_dim: usize,
    pub display_max_dim: usize,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            detection_max_dim: DETECTION_MAX_DIM,
            display_max_dim: DISPLAY_MAX_DIM,
        }
    }
}

/// A working-frame copy of a source raster.
///
/// `scale` maps source coordinates into the working frame
/// (`working = source * scale`) and always lies in `(0, 1]`.
#[derive(Clone, Debug)]
pub struct WorkingRaster {
    pub image: RgbImage,
    pub scale: f64,
    pub source_width: usize,
    pub source_height: usize,
}

/// Downsample `src` so its longer side does not exceed `max_dim`.
///
/// Uses an area-average (box) filter. Sources already within the cap are
/// copied unchanged with `scale = 1`.
pub fn downsample(src: &RgbImageView<'_>, max_dim: usize) -> WorkingRaster {
    let max_dim = max_dim.max(1);
    let longer = src.width.max(src.height);
    if longer <= max_dim || src.width == 0 || src.height == 0 {
        return WorkingRaster {
            image: src.to_image(),
            scale: 1.0,
            source_width: src.width,
            source_height: src.height,
        };
    }

    let scale = max_dim as f64 / longer as f64;
    let out_w = ((src.width as f64 * scale).round() as usize).clamp(1, max_dim);
    let out_h = ((src.height as f64 * scale).round() as usize).clamp(1, max_dim);
    let sx = src.width as f64 / out_w as f64;
    let sy = src.height as f64 / out_h as f64;

    let mut out = RgbImage::new(out_w, out_h);
    for oy in 0..out_h {
        let y0 = ((oy as f64 * sy).floor() as usize).min(src.height - 1);
        let y1 = (((oy + 1) as f64 * sy).floor() as usize).clamp(y0 + 1, src.height);
        for ox in 0..out_w {
            let x0 = ((ox as f64 * sx).floor() as usize).min(src.width - 1);
            let x1 = (((ox + 1) as f64 * sx).floor() as usize).clamp(x0 + 1, src.width);

            let mut acc = [0u32; 3];
            for y in y0..y1 {
                for x in x0..x1 {
                    let p = src.pixel(x, y);
                    acc[0] += p[0] as u32;
                    acc[1] += p[1] as u32;
                    acc[2] += p[2] as u32;
                }
            }
            let n = ((y1 - y0) * (x1 - x0)) as u32;
            out.put_pixel(ox, oy, acc.map(|c| ((c + n / 2) / n) as u8));
        }
    }

    WorkingRaster {
        image: out,
        scale,
        source_width: src.width,
        source_height: src.height,
    }
}

pub fn sample_for_detection(src: &RgbImageView<'_>, params: &SamplerParams) -> WorkingRaster {
    downsample(src, params.detection_max_dim)
}

pub fn sample_for_display(src: &RgbImageView<'_>, params: &SamplerParams) -> WorkingRaster {
    downsample(src, params.display_max_dim)
}
