// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer and pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PosPrintError, Result};

/// Vendor head settings applied after every per-page init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadSettings {
    /// Print darkness, 1 (light) to 7 (dark).
    pub gray: i32,
    pub speed: i32,
    pub mode: i32,
    /// 0 left, 1 centre, 2 right.
    pub alignment: i32,
}

impl Default for HeadSettings {
    fn default() -> Self {
        Self {
            gray: 7,
            speed: 0,
            mode: 0,
            alignment: 0,
        }
    }
}

/// Persistent settings for the thermal print pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Print head width in pixels. Every page is scaled to this width.
    pub head_width: u32,
    /// Maximum tile height in pixels pushed to the head in one call.
    pub tile_height: u32,
    /// Nominal head resolution, used for reporting page dimensions.
    pub pdf_dpi: u32,
    /// Run sharpen and contrast over each page before tiling.
    pub enhance_images: bool,
    /// Paper advance units issued between consecutive tiles.
    pub step_between_tiles: i32,
    pub head: HeadSettings,
    /// Number of newest entries kept in the print history.
    pub history_limit: usize,
    /// Slots in the progress channel before events are dropped.
    pub progress_capacity: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            head_width: 384,
            tile_height: 984,
            pdf_dpi: 203,
            enhance_images: true,
            step_between_tiles: 1,
            head: HeadSettings::default(),
            history_limit: 50,
            progress_capacity: 64,
        }
    }
}

impl PrinterConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.head_width == 0 {
            return Err(PosPrintError::InvalidArgument(
                "head_width must be greater than zero".into(),
            ));
        }
        if self.tile_height == 0 {
            return Err(PosPrintError::InvalidArgument(
                "tile_height must be greater than zero".into(),
            ));
        }
        if !(1..=7).contains(&self.head.gray) {
            return Err(PosPrintError::InvalidArgument(format!(
                "gray level {} outside 1..=7",
                self.head.gray
            )));
        }
        if self.progress_capacity == 0 {
            return Err(PosPrintError::InvalidArgument(
                "progress_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Width of one printed page in millimetres at the configured resolution.
    pub fn paper_width_mm(&self) -> f32 {
        self.head_width as f32 / self.pdf_dpi.max(1) as f32 * 25.4
    }
}
