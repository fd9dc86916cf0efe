// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop print head simulator.
//
// Stacks every pushed tile (plus one white row per advance step) into a
// paper strip and writes it out as a PNG when the page is fired. Faults can
// be scheduled per operation to exercise the failure paths without hardware.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage, imageops};
use posprint_core::StatusCode;
use posprint_core::error::Result;
use tracing::{debug, error, info};

use crate::traits::{DeviceDriver, DriverOp, STATUS_BRIDGE_ERROR};

const PAPER_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A one-shot fault: the `at_call`-th call (1-based, counted per operation
/// over the driver's lifetime) returns `code` instead of success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePlan {
    pub operation: DriverOp,
    pub at_call: usize,
    pub code: i32,
}

/// Simulated head that renders fired pages to PNG files.
pub struct ImageSinkDriver {
    output_dir: PathBuf,
    strip: Vec<RgbaImage>,
    pages_written: usize,
    calls: HashMap<DriverOp, usize>,
    failures: Vec<FailurePlan>,
}

impl ImageSinkDriver {
    /// Create a simulator writing into `output_dir`, creating it if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        info!(dir = %output_dir.display(), "image sink driver ready");
        Ok(Self {
            output_dir,
            strip: Vec::new(),
            pages_written: 0,
            calls: HashMap::new(),
            failures: Vec::new(),
        })
    }

    /// Schedule a fault.
    pub fn with_failure(mut self, plan: FailurePlan) -> Self {
        self.failures.push(plan);
        self
    }

    /// Number of PNG pages written so far.
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Count the call and consume a matching fault, if any.
    fn tick(&mut self, op: DriverOp) -> StatusCode {
        let count = self.calls.entry(op).or_insert(0);
        *count += 1;
        let count = *count;

        if let Some(pos) = self
            .failures
            .iter()
            .position(|f| f.operation == op && f.at_call == count)
        {
            let plan = self.failures.remove(pos);
            debug!(op = %op, call = count, code = plan.code, "injected head fault");
            return StatusCode(plan.code);
        }
        StatusCode::OK
    }

    fn compose_page(&self) -> RgbaImage {
        let width = self.strip.iter().map(|t| t.width()).max().unwrap_or(0);
        let height: u32 = self.strip.iter().map(|t| t.height()).sum();
        let mut page = RgbaImage::from_pixel(width, height, PAPER_WHITE);

        let mut y = 0;
        for band in &self.strip {
            imageops::replace(&mut page, band, 0, i64::from(y));
            y += band.height();
        }
        page
    }
}

impl DeviceDriver for ImageSinkDriver {
    fn name(&self) -> &str {
        "image-sink"
    }

    fn init(&mut self) -> StatusCode {
        self.strip.clear();
        self.tick(DriverOp::Init)
    }

    fn push_tile(&mut self, tile: &RgbaImage) -> StatusCode {
        let status = self.tick(DriverOp::PushTile);
        if status.is_ok() {
            self.strip.push(tile.clone());
        }
        status
    }

    fn advance_step(&mut self, units: i32) -> StatusCode {
        let status = self.tick(DriverOp::AdvanceStep);
        if status.is_ok() && units > 0 {
            let width = self.strip.last().map(|t| t.width()).unwrap_or(1);
            self.strip
                .push(RgbaImage::from_pixel(width, units as u32, PAPER_WHITE));
        }
        status
    }

    fn start(&mut self) -> StatusCode {
        let status = self.tick(DriverOp::Start);
        if !status.is_ok() {
            return status;
        }

        let page = self.compose_page();
        self.strip.clear();
        if page.width() == 0 || page.height() == 0 {
            debug!("start with empty buffer, nothing written");
            return StatusCode::OK;
        }

        let path = self
            .output_dir
            .join(format!("page-{:04}.png", self.pages_written + 1));
        match page.save(&path) {
            Ok(()) => {
                self.pages_written += 1;
                info!(path = %path.display(), height = page.height(), "page fired");
                StatusCode::OK
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to write page image");
                STATUS_BRIDGE_ERROR
            }
        }
    }

    fn check_status(&mut self) -> StatusCode {
        self.tick(DriverOp::CheckStatus)
    }
}
