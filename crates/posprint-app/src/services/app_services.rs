// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — builds the rasterizer, head driver, history and
// progress channel, and hands back a ready controller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use posprint_core::error::Result;
use posprint_core::ProgressEvent;
use posprint_document::PdfiumRasterizer;
use posprint_driver::{DeviceDriver, ImageSinkDriver, platform_driver};
use posprint_print::{ChannelSink, PrintHistory, PrintJobController, ProgressReporter};
use tokio::sync::mpsc;
use tracing::info;

use super::config_store::{CONFIG_FILE, load_config};
use super::data_dir;

/// The controller type used by the binary.
pub type Controller = PrintJobController<PdfiumRasterizer, Box<dyn DeviceDriver>>;

/// Which head to print on.
#[derive(Debug, Clone)]
pub enum HeadChoice {
    /// The terminal's own head (stub off-device).
    Platform,
    /// Write each printed page as a PNG into a directory.
    Images(PathBuf),
}

/// Everything a command needs.
pub struct AppServices {
    pub controller: Arc<Controller>,
    pub progress: mpsc::Receiver<ProgressEvent>,
}

impl AppServices {
    /// Initialise all services. Call once per command.
    pub fn init(config_path: Option<&Path>, head: HeadChoice, pdfium_dir: Option<&Path>) -> Result<Self> {
        let dir = data_dir::data_dir()?;
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.join(CONFIG_FILE));
        let config = load_config(&config_path)?;
        info!(data_dir = %dir.display(), config = %config_path.display(), "initialising services");

        let driver: Box<dyn DeviceDriver> = match head {
            HeadChoice::Platform => platform_driver()?,
            HeadChoice::Images(out) => Box::new(ImageSinkDriver::new(out)?),
        };
        let rasterizer = PdfiumRasterizer::new(pdfium_dir)?;
        let history = open_history(config.history_limit)?;
        let (sink, progress) = ChannelSink::channel(config.progress_capacity);

        let controller = PrintJobController::builder(rasterizer, driver)
            .config(config)
            .progress(ProgressReporter::new(Arc::new(sink)))
            .history(history)
            .build()?;

        Ok(Self {
            controller: Arc::new(controller),
            progress,
        })
    }
}

/// Open the history without touching the head or PDFium.
pub fn open_history(limit: usize) -> Result<PrintHistory> {
    PrintHistory::open(data_dir::data_subdir("history")?, limit)
}
