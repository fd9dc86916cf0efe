// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted test doubles for the rasterizer, the head and the progress sink.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use image::{Rgba, RgbaImage};
use posprint_core::error::{PosPrintError, Result};
use posprint_core::{HeadSettings, ProgressEvent, ProgressStage, StatusCode};
use posprint_document::{PageRaster, RasterDocument, Rasterizer};
use posprint_driver::{DeviceDriver, DriverOp};
use tokio::sync::mpsc as async_mpsc;

use crate::controller::CancelHandle;
use crate::progress::ProgressSink;

// ---------------------------------------------------------------------------
// Rasterizer
// ---------------------------------------------------------------------------

/// Rasterizer serving blank pages of fixed heights.
#[derive(Default)]
pub struct FakeRasterizer {
    heights: Vec<u32>,
    fail_open: Option<String>,
    fail_render: Mutex<HashSet<usize>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    rendered: Mutex<Vec<usize>>,
}

impl FakeRasterizer {
    pub fn with_pages(heights: &[u32]) -> Self {
        Self {
            heights: heights.to_vec(),
            ..Self::default()
        }
    }

    /// Every `open` fails as if the decoder rejected the file.
    pub fn rejecting(reason: &str) -> Self {
        Self {
            fail_open: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn fail_render(self, page: usize) -> Self {
        self.fail_render
            .lock()
            .expect("render failures")
            .insert(page);
        self
    }

    /// Let a page that failed to render succeed from now on.
    pub fn heal_render(&self, page: usize) {
        self.fail_render
            .lock()
            .expect("render failures")
            .remove(&page);
    }

    pub fn rendered(&self) -> Vec<usize> {
        self.rendered.lock().expect("rendered").clone()
    }
}

impl Rasterizer for FakeRasterizer {
    type Document<'a> = FakeDocument<'a>;

    fn open<'a>(&'a self, path: &Path) -> Result<FakeDocument<'a>> {
        if !path.is_file() {
            return Err(PosPrintError::FileNotFound(path.to_path_buf()));
        }
        if let Some(reason) = &self.fail_open {
            return Err(PosPrintError::RenderInit(reason.clone()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeDocument {
            owner: self,
            closed: false,
        })
    }
}

pub struct FakeDocument<'a> {
    owner: &'a FakeRasterizer,
    closed: bool,
}

impl RasterDocument for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        if self.closed { 0 } else { self.owner.heights.len() }
    }

    fn render_page(&mut self, index: usize, width: u32) -> Result<PageRaster> {
        let page_count = self.page_count();
        if index >= page_count {
            return Err(PosPrintError::PageIndexOutOfRange { index, page_count });
        }
        self.owner.rendered.lock().expect("rendered").push(index);
        if self
            .owner
            .fail_render
            .lock()
            .expect("render failures")
            .contains(&index)
        {
            return Err(PosPrintError::Render(format!("page {} is corrupt", index)));
        }
        Ok(PageRaster::new(RgbaImage::from_pixel(
            width,
            self.owner.heights[index],
            Rgba([255, 255, 255, 255]),
        )))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.owner.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Init,
    ApplySettings,
    PushTile { height: u32 },
    AdvanceStep(i32),
    Start,
    CheckStatus,
}

/// Shared view of everything a `ScriptedDriver` was asked to do.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
    widths: Arc<Mutex<Vec<u32>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn pushes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::PushTile { .. }))
            .count()
    }

    pub fn starts(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Start).count()
    }

    pub fn tile_widths(&self) -> Vec<u32> {
        self.widths.lock().expect("widths").clone()
    }

    fn push(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }
}

/// Head double that succeeds unless told otherwise.
pub struct ScriptedDriver {
    log: CallLog,
    counts: HashMap<DriverOp, usize>,
    failures: HashMap<(DriverOp, usize), i32>,
    cancel_at_push: Option<(usize, CancelHandle)>,
    pause_at_push: Option<PausePoint>,
}

/// Holds the worker inside a tile push until the test lets it go.
struct PausePoint {
    nth: usize,
    entered: async_mpsc::UnboundedSender<()>,
    release: mpsc::Receiver<()>,
}

impl ScriptedDriver {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let driver = Self {
            log: log.clone(),
            counts: HashMap::new(),
            failures: HashMap::new(),
            cancel_at_push: None,
            pause_at_push: None,
        };
        (driver, log)
    }

    /// Make the `nth` call (1-based, lifetime count) to `op` return `code`.
    pub fn fail(&mut self, op: DriverOp, nth: usize, code: i32) {
        self.failures.insert((op, nth), code);
    }

    /// Request cancellation from inside the `nth` tile push.
    pub fn cancel_at_push(&mut self, nth: usize, handle: CancelHandle) {
        self.cancel_at_push = Some((nth, handle));
    }

    /// Block inside the `nth` tile push. The returned receiver yields once
    /// the push is reached; sending on the returned sender (or dropping it)
    /// resumes the worker.
    pub fn pause_at_push(&mut self, nth: usize) -> (async_mpsc::UnboundedReceiver<()>, mpsc::Sender<()>) {
        let (entered, entered_rx) = async_mpsc::unbounded_channel();
        let (release_tx, release) = mpsc::channel();
        self.pause_at_push = Some(PausePoint {
            nth,
            entered,
            release,
        });
        (entered_rx, release_tx)
    }

    fn tick(&mut self, op: DriverOp) -> StatusCode {
        let count = self.counts.entry(op).or_insert(0);
        *count += 1;
        match self.failures.get(&(op, *count)) {
            Some(code) => StatusCode(*code),
            None => StatusCode::OK,
        }
    }
}

impl DeviceDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn init(&mut self) -> StatusCode {
        self.log.push(Call::Init);
        self.tick(DriverOp::Init)
    }

    fn apply_settings(&mut self, _settings: &HeadSettings) -> StatusCode {
        self.log.push(Call::ApplySettings);
        self.tick(DriverOp::ApplySettings)
    }

    fn push_tile(&mut self, tile: &RgbaImage) -> StatusCode {
        self.log.push(Call::PushTile {
            height: tile.height(),
        });
        self.log.widths.lock().expect("widths").push(tile.width());
        let status = self.tick(DriverOp::PushTile);
        if let Some((nth, handle)) = &self.cancel_at_push {
            if self.counts.get(&DriverOp::PushTile) == Some(nth) {
                handle.cancel();
            }
        }
        if let Some(pause) = &self.pause_at_push {
            if self.counts.get(&DriverOp::PushTile) == Some(&pause.nth) {
                let _ = pause.entered.send(());
                let _ = pause.release.recv();
            }
        }
        status
    }

    fn advance_step(&mut self, units: i32) -> StatusCode {
        self.log.push(Call::AdvanceStep(units));
        self.tick(DriverOp::AdvanceStep)
    }

    fn start(&mut self) -> StatusCode {
        self.log.push(Call::Start);
        self.tick(DriverOp::Start)
    }

    fn check_status(&mut self) -> StatusCode {
        self.log.push(Call::CheckStatus);
        self.tick(DriverOp::CheckStatus)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("events").clone()
    }

    /// 1-based page numbers of the events at `stage`.
    pub fn pages(&self, stage: ProgressStage) -> Vec<usize> {
        self.events()
            .iter()
            .filter(|e| e.stage == stage)
            .map(|e| e.current_page)
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn deliver(&self, event: ProgressEvent) {
        self.events.lock().expect("events").push(event);
    }
}
