// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thermal enhancement: sharpen then boost contrast so thin strokes survive
// the head's single-bit dithering.

use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::map::map_colors;
use posprint_core::error::{PosPrintError, Result};
use tracing::{debug, instrument};

/// 3×3 sharpening kernel, row-major. Sums to 1 so flat regions are unchanged.
const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// Sharpen + linear contrast remap for page rasters.
///
/// Pure: the input is never modified and the output has the same
/// dimensions. Alpha is passed through untouched by both stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalEnhancer {
    /// Multiplier applied to each colour channel after sharpening.
    pub contrast: f32,
    /// Offset added after the multiplier.
    pub offset: f32,
}

impl Default for ThermalEnhancer {
    fn default() -> Self {
        Self {
            contrast: 1.5,
            offset: -20.0,
        }
    }
}

impl ThermalEnhancer {
    /// Run both stages.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn enhance(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        let needed = width as usize * height as usize * 4;
        if image.as_raw().len() < needed {
            return Err(PosPrintError::Enhancement(format!(
                "pixel buffer holds {} bytes, {}x{} needs {}",
                image.as_raw().len(),
                width,
                height,
                needed
            )));
        }
        if width == 0 || height == 0 {
            return Ok(image.clone());
        }

        let sharpened = sharpen(image);
        let result = self.adjust_contrast(&sharpened);
        debug!("page enhanced");
        Ok(result)
    }

    /// `v' = clamp(contrast·v + offset, 0, 255)` per colour channel.
    pub fn adjust_contrast(&self, image: &RgbaImage) -> RgbaImage {
        let (contrast, offset) = (self.contrast, self.offset);
        let remap = |v: u8| (v as f32 * contrast + offset).round().clamp(0.0, 255.0) as u8;
        map_colors(image, |Rgba([r, g, b, a])| Rgba([remap(r), remap(g), remap(b), a]))
    }
}

/// Apply the 3×3 sharpening kernel to R, G and B. Out-of-bounds neighbours
/// take the value of the nearest edge pixel. Alpha is copied from the source
/// pixel unfiltered, which `imageproc::filter::filter3x3` cannot do.
pub fn sharpen(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = [0i32; 3];
        for (k, weight) in SHARPEN_KERNEL.iter().enumerate() {
            let nx = (x as i64 + (k % 3) as i64 - 1).clamp(0, max_x) as u32;
            let ny = (y as i64 + (k / 3) as i64 - 1).clamp(0, max_y) as u32;
            let neighbour = image.get_pixel(nx, ny);
            for (channel, sum) in acc.iter_mut().enumerate() {
                *sum += weight * neighbour[channel] as i32;
            }
        }
        let alpha = image.get_pixel(x, y)[3];
        Rgba([
            acc[0].clamp(0, 255) as u8,
            acc[1].clamp(0, 255) as u8,
            acc[2].clamp(0, 255) as u8,
            alpha,
        ])
    })
}
