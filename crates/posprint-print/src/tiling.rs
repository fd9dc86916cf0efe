// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tile scheduler — splits one page raster into head-sized bands and drives
// the per-page hardware protocol:
//
//   init → apply_settings → (push_tile → advance_step)* → start
//
// Tiles go out strictly top-to-bottom, one at a time. Cancellation is polled
// before every tile; a push failure abandons the rest of the page without
// rolling back what the head already holds.

use std::sync::atomic::{AtomicBool, Ordering};

use image::imageops;
use image::{Rgba, RgbaImage};
use posprint_core::error::PosPrintError;
use posprint_core::{ErrorClass, HeadSettings, PrinterConfig, StatusCode};
use posprint_document::PageRaster;
use posprint_driver::{DeviceDriver, DriverOp};
use tracing::{debug, instrument, warn};

use crate::progress::ProgressReporter;

/// One horizontal band of a page, in raster rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub y: u32,
    pub height: u32,
}

/// The bands covering a raster of a given height.
///
/// `ceil(height / tile_height)` tiles, each `tile_height` rows except
/// possibly the last, contiguous and summing to `height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    tiles: Vec<Tile>,
}

impl TilePlan {
    pub fn new(height: u32, tile_height: u32) -> Self {
        let tile_height = tile_height.max(1);
        let mut tiles = Vec::with_capacity(height.div_ceil(tile_height) as usize);
        let mut y = 0;
        while y < height {
            let band = tile_height.min(height - y);
            tiles.push(Tile { y, height: band });
            y += band;
        }
        Self { tiles }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }
}

/// Why a page did not print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFailure {
    /// The head returned a non-zero status.
    Driver { operation: DriverOp, code: StatusCode },
    /// Rendering or enhancement failed before the head was touched.
    Pipeline(String),
}

impl PageFailure {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Driver { .. } => ErrorClass::Hardware,
            Self::Pipeline(_) => ErrorClass::Resource,
        }
    }

    /// The crate error for a head failure; `None` for render and
    /// enhancement failures.
    pub fn hardware_error(&self) -> Option<PosPrintError> {
        match self {
            Self::Driver { operation, code } => Some(hardware(*operation, *code)),
            Self::Pipeline(_) => None,
        }
    }
}

fn hardware(operation: DriverOp, code: StatusCode) -> PosPrintError {
    PosPrintError::Hardware {
        operation: operation.as_str(),
        code: code.0,
    }
}

impl std::fmt::Display for PageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver { operation, code } => write!(f, "{}", hardware(*operation, *code)),
            Self::Pipeline(reason) => f.write_str(reason),
        }
    }
}

/// Result of driving one page through the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Printed,
    Failed(PageFailure),
    /// Cancellation was observed between tiles. Earlier tiles may already be
    /// on paper.
    Cancelled,
}

impl PageOutcome {
    pub fn is_printed(&self) -> bool {
        matches!(self, Self::Printed)
    }
}

/// Per-page inputs that are not part of the raster.
pub struct PageContext<'a> {
    /// Zero-based page index.
    pub page: usize,
    pub total_pages: usize,
    pub cancel: &'a AtomicBool,
    pub reporter: &'a ProgressReporter,
}

/// Drives the head for one page at a time.
#[derive(Debug, Clone)]
pub struct TileScheduler {
    head_width: u32,
    tile_height: u32,
    step_units: i32,
    head: HeadSettings,
}

impl TileScheduler {
    pub fn new(head_width: u32, tile_height: u32, step_units: i32, head: HeadSettings) -> Self {
        Self {
            head_width,
            tile_height: tile_height.max(1),
            step_units,
            head,
        }
    }

    pub fn from_config(config: &PrinterConfig) -> Self {
        Self::new(
            config.head_width,
            config.tile_height,
            config.step_between_tiles,
            config.head,
        )
    }

    pub fn head_width(&self) -> u32 {
        self.head_width
    }

    /// Print one page and report it.
    ///
    /// A processing event is emitted for every call regardless of outcome;
    /// a printing event only when the head fired the page.
    #[instrument(skip_all, fields(page = ctx.page, height = raster.height()))]
    pub fn print_page<D: DeviceDriver + ?Sized>(
        &self,
        driver: &mut D,
        raster: &PageRaster,
        ctx: PageContext<'_>,
    ) -> PageOutcome {
        let outcome = self.run_protocol(driver, raster, ctx.cancel);

        let current = ctx.page + 1;
        ctx.reporter.processing(current, ctx.total_pages);
        if outcome.is_printed() {
            ctx.reporter.printing(current, ctx.total_pages);
        }
        outcome
    }

    fn run_protocol<D: DeviceDriver + ?Sized>(
        &self,
        driver: &mut D,
        raster: &PageRaster,
        cancel: &AtomicBool,
    ) -> PageOutcome {
        let status = driver.init();
        if !status.is_ok() {
            return PageOutcome::Failed(PageFailure::Driver {
                operation: DriverOp::Init,
                code: status,
            });
        }

        let status = driver.apply_settings(&self.head);
        if !status.is_ok() {
            warn!(code = %status, "head settings rejected, printing with device defaults");
        }

        let plan = TilePlan::new(raster.height(), self.tile_height);
        let count = plan.len();
        for (index, tile) in plan.iter().enumerate() {
            if cancel.load(Ordering::Acquire) {
                debug!(tile = index, "cancelled between tiles");
                return PageOutcome::Cancelled;
            }

            let band = self.crop(raster, tile);
            let status = driver.push_tile(&band);
            if !status.is_ok() {
                return PageOutcome::Failed(PageFailure::Driver {
                    operation: DriverOp::PushTile,
                    code: status,
                });
            }

            if index + 1 < count {
                let status = driver.advance_step(self.step_units);
                if !status.is_ok() {
                    warn!(tile = index, code = %status, "paper advance failed");
                }
            }
        }

        let status = driver.start();
        if !status.is_ok() {
            // Tiles are queued on the head but were never fired.
            return PageOutcome::Failed(PageFailure::Driver {
                operation: DriverOp::Start,
                code: status,
            });
        }

        debug!(tiles = count, "page fired");
        PageOutcome::Printed
    }

    /// Cut a band out of the raster at exactly the head width. Narrower
    /// rasters are padded with white on the right; wider ones are clipped.
    fn crop(&self, raster: &PageRaster, tile: &Tile) -> RgbaImage {
        let source = raster.image();
        if source.width() == self.head_width {
            return imageops::crop_imm(source, 0, tile.y, self.head_width, tile.height).to_image();
        }

        let visible = source.width().min(self.head_width);
        let mut band = RgbaImage::from_pixel(self.head_width, tile.height, Rgba([255, 255, 255, 255]));
        let part = imageops::crop_imm(source, 0, tile.y, visible, tile.height).to_image();
        imageops::replace(&mut band, &part, 0, 0);
        band
    }
}
