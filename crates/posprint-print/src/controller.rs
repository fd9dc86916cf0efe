// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job controller — runs whole-document print jobs on a blocking worker.
//
// One controller owns one print head. A job renders, enhances and tiles
// each page in ascending order; a page that fails is recorded and the job
// moves on. Failed pages can later be retried on their own. Cancellation is
// cooperative and polled at page and tile boundaries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use posprint_core::error::{PosPrintError, Result};
use posprint_core::{FailedPages, JobReport, JobStatus, PrintJobState, PrinterConfig, StatusCode};
use posprint_document::{DocumentGuard, PageRaster, RasterDocument, Rasterizer, ThermalEnhancer};
use posprint_driver::DeviceDriver;
use tracing::{debug, error, info, info_span, instrument, warn};

use crate::history::{HistoryEntry, HistoryStatus, PrintHistory};
use crate::progress::ProgressReporter;
use crate::tiling::{PageContext, PageFailure, PageOutcome, TileScheduler};

// ---------------------------------------------------------------------------
// Cancellation and exclusivity
// ---------------------------------------------------------------------------

/// Requests cancellation of the running job from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Idempotent. Takes effect at the next tile or page boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Marks the head as owned by one job; released on drop, including when the
/// worker panics.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PosPrintError::JobInProgress)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn worker_error(err: tokio::task::JoinError) -> PosPrintError {
    PosPrintError::Worker(format!("print worker did not finish: {}", err))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures a [`PrintJobController`].
pub struct ControllerBuilder<R, D> {
    rasterizer: R,
    driver: D,
    config: PrinterConfig,
    reporter: ProgressReporter,
    history: Option<PrintHistory>,
}

impl<R, D> ControllerBuilder<R, D>
where
    R: Rasterizer + 'static,
    D: DeviceDriver + 'static,
{
    pub fn config(mut self, config: PrinterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn progress(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Archive every printed document and update it after retries.
    pub fn history(mut self, history: PrintHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> Result<PrintJobController<R, D>> {
        self.config.validate()?;
        let enhancer = self.config.enhance_images.then(ThermalEnhancer::default);
        let scheduler = TileScheduler::from_config(&self.config);

        info!(
            driver = self.driver.name(),
            head_width = self.config.head_width,
            tile_height = self.config.tile_height,
            enhance = self.config.enhance_images,
            "print controller ready"
        );

        Ok(PrintJobController {
            inner: Arc::new(Inner {
                rasterizer: self.rasterizer,
                driver: Mutex::new(self.driver),
                head_width: self.config.head_width,
                scheduler,
                enhancer,
                reporter: self.reporter,
                history: self.history,
                cancel: Arc::new(AtomicBool::new(false)),
                last_job: Mutex::new(None),
            }),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Terminal state of the most recent job, kept for retries.
#[derive(Debug, Clone)]
struct LastJob {
    state: PrintJobState,
    document_id: Option<String>,
}

/// State shared with the blocking worker.
struct Inner<R, D> {
    rasterizer: R,
    /// Held for the whole of a job.
    driver: Mutex<D>,
    head_width: u32,
    scheduler: TileScheduler,
    enhancer: Option<ThermalEnhancer>,
    reporter: ProgressReporter,
    history: Option<PrintHistory>,
    cancel: Arc<AtomicBool>,
    last_job: Mutex<Option<LastJob>>,
}

/// Drives print jobs for a single thermal head.
///
/// At most one job (print, retry or status query) holds the head at a time;
/// a second request while one is running fails with `JobInProgress`.
pub struct PrintJobController<R, D> {
    inner: Arc<Inner<R, D>>,
    busy: Arc<AtomicBool>,
}

impl<R, D> PrintJobController<R, D>
where
    R: Rasterizer + 'static,
    D: DeviceDriver + 'static,
{
    pub fn builder(rasterizer: R, driver: D) -> ControllerBuilder<R, D> {
        ControllerBuilder {
            rasterizer,
            driver,
            config: PrinterConfig::default(),
            reporter: ProgressReporter::disabled(),
            history: None,
        }
    }

    // -- Jobs -----------------------------------------------------------------

    /// Print every page of the PDF at `path`.
    ///
    /// Returns `Err` only for requests that never start (missing file, head
    /// busy) or a crashed worker. A document that cannot be opened yields a
    /// `FAILED` report.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn print_document(&self, path: impl AsRef<Path>) -> Result<JobReport> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(PosPrintError::FileNotFound(path));
        }
        let guard = BusyGuard::acquire(&self.busy)?;
        self.inner.cancel.store(false, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            inner.run_print(path)
        })
        .await
        .map_err(worker_error)
    }

    /// Re-attempt only the pages that failed in the last job.
    #[instrument(skip_all)]
    pub async fn retry_failed_pages(&self) -> Result<JobReport> {
        // The last job is only read while holding the head.
        let guard = BusyGuard::acquire(&self.busy)?;
        let Some(last) = self.inner.last_job_snapshot() else {
            debug!("retry requested with no previous job");
            return Ok(JobReport::no_retry_needed());
        };
        if last.state.failed_pages.is_empty() {
            let mut report = JobReport::no_retry_needed();
            report.job_id = Some(last.state.job_id);
            report.total_pages = last.state.total_pages;
            report.printed_pages = last.state.printed_pages();
            report.document_id = last.document_id;
            return Ok(report);
        }
        if !last.state.document_path.is_file() {
            return Err(PosPrintError::FileNotFound(last.state.document_path));
        }
        self.inner.cancel.store(false, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            inner.run_retry(last)
        })
        .await
        .map_err(worker_error)
    }

    /// Print the archived copy of a document from history.
    #[instrument(skip(self))]
    pub async fn reprint_document(&self, document_id: &str) -> Result<JobReport> {
        let history = self.history()?;
        let entry = history
            .find(document_id)?
            .ok_or_else(|| PosPrintError::DocumentNotFound(document_id.to_string()))?;
        info!(id = document_id, path = %entry.saved_path, "reprinting archived document");
        self.print_document(&entry.saved_path).await
    }

    /// Ask the head for its status.
    pub async fn printer_status(&self) -> Result<StatusCode> {
        let guard = BusyGuard::acquire(&self.busy)?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            inner.lock_driver().check_status()
        })
        .await
        .map_err(worker_error)
    }

    // -- Control and inspection -------------------------------------------

    /// Request cancellation of the running job.
    pub fn cancel(&self) {
        info!("cancellation requested");
        self.inner.cancel.store(true, Ordering::Release);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.inner.cancel))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Terminal state of the most recent print or retry.
    pub fn last_job(&self) -> Option<PrintJobState> {
        self.inner.last_job_snapshot().map(|last| last.state)
    }

    /// Print history, newest first.
    pub fn history_entries(&self) -> Result<Vec<HistoryEntry>> {
        self.history()?.entries()
    }

    fn history(&self) -> Result<&PrintHistory> {
        self.inner
            .history
            .as_ref()
            .ok_or_else(|| PosPrintError::InvalidArgument("print history is disabled".into()))
    }
}

// ---------------------------------------------------------------------------
// Worker side
// ---------------------------------------------------------------------------

impl<R, D> Inner<R, D>
where
    R: Rasterizer,
    D: DeviceDriver,
{
    fn run_print(&self, path: PathBuf) -> JobReport {
        let mut state = PrintJobState::new(&path);
        let span = info_span!("print_job", job_id = %state.job_id);
        let _enter = span.enter();
        info!(path = %path.display(), "print job accepted");

        let mut document = match self.rasterizer.open(&path) {
            Ok(document) => DocumentGuard::new(document),
            Err(err) => return self.fail(state, None, err),
        };
        state.total_pages = document.page_count();
        info!(pages = state.total_pages, "document opened");

        let mut cancelled = false;
        {
            let mut driver = self.lock_driver();
            for page in 0..state.total_pages {
                if self.cancel_requested() {
                    info!(page, "cancelled at page boundary");
                    cancelled = true;
                    break;
                }
                state.begin_page(page);
                match self.attempt_page(&mut *document, &mut *driver, page, state.total_pages) {
                    PageOutcome::Printed => {}
                    PageOutcome::Failed(failure) => {
                        warn!(page, %failure, class = ?failure.class(), "page failed, continuing with next page");
                        state.record_failure(page);
                    }
                    PageOutcome::Cancelled => {
                        info!(page, "cancelled mid-page");
                        state.record_failure(page);
                        cancelled = true;
                        break;
                    }
                }
            }
        }
        drop(document);

        let status = if cancelled {
            JobStatus::Cancelled
        } else if state.failed_pages.is_empty() {
            JobStatus::Success
        } else {
            JobStatus::PartialSuccess
        };
        state.finish(status);
        info!(
            status = ?status,
            printed = state.printed_pages(),
            failed = ?state.failed_pages.as_slice(),
            "print job finished"
        );

        let document_id = self.archive(&state);
        let mut report = JobReport::from_state(&state, status.describe(state.failed_pages.as_slice()));
        report.document_id = document_id.clone();
        self.store_last(state, document_id);
        report
    }

    fn run_retry(&self, last: LastJob) -> JobReport {
        let LastJob {
            mut state,
            document_id,
        } = last;
        let span = info_span!("retry_job", job_id = %state.job_id);
        let _enter = span.enter();

        let pending = state.failed_pages.ascending();
        state.status = JobStatus::Running;
        state.finished_at = None;
        info!(pages = ?pending, "retrying failed pages");

        let mut document = match self.rasterizer.open(&state.document_path) {
            Ok(document) => DocumentGuard::new(document),
            Err(err) => return self.fail(state, document_id, err),
        };

        let count = pending.len();
        let mut remaining = FailedPages::new();
        let mut cancelled = false;
        {
            let mut driver = self.lock_driver();
            for (n, &page) in pending.iter().enumerate() {
                if self.cancel_requested() {
                    info!(page, "retry cancelled at page boundary");
                    for &rest in &pending[n..] {
                        remaining.insert(rest);
                    }
                    cancelled = true;
                    break;
                }
                state.current_page = page;
                match self.attempt_page(&mut *document, &mut *driver, page, state.total_pages) {
                    PageOutcome::Printed => {}
                    PageOutcome::Failed(failure) => {
                        warn!(page, %failure, class = ?failure.class(), "page failed again on retry");
                        remaining.insert(page);
                    }
                    PageOutcome::Cancelled => {
                        for &rest in &pending[n..] {
                            remaining.insert(rest);
                        }
                        cancelled = true;
                    }
                }
                self.reporter.retry(n + 1, count);
                if cancelled {
                    info!(page, "retry cancelled mid-page");
                    break;
                }
            }
        }
        drop(document);

        state.failed_pages = remaining;
        let status = if cancelled {
            JobStatus::Cancelled
        } else if state.failed_pages.is_empty() {
            JobStatus::RetrySuccess
        } else {
            JobStatus::PartialRetrySuccess
        };
        state.finish(status);
        info!(status = ?status, still_failed = ?state.failed_pages.as_slice(), "retry finished");

        if let (Some(history), Some(id)) = (&self.history, &document_id) {
            if let Err(err) = history.update_failed_pages(id, state.failed_pages.as_slice()) {
                warn!(id = %id, error = %err, "could not update print history");
            }
        }

        let mut report = JobReport::from_state(&state, status.describe(state.failed_pages.as_slice()));
        report.document_id = document_id.clone();
        self.store_last(state, document_id);
        report
    }

    /// Render, enhance and print one page.
    fn attempt_page<Doc>(&self, document: &mut Doc, driver: &mut D, page: usize, total: usize) -> PageOutcome
    where
        Doc: RasterDocument + ?Sized,
    {
        let raster = match document
            .render_page(page, self.head_width)
            .and_then(|raster| self.enhance(raster))
        {
            Ok(raster) => raster,
            Err(err) => {
                self.reporter.processing(page + 1, total);
                return PageOutcome::Failed(PageFailure::Pipeline(err.to_string()));
            }
        };

        self.scheduler.print_page(
            driver,
            &raster,
            PageContext {
                page,
                total_pages: total,
                cancel: self.cancel.as_ref(),
                reporter: &self.reporter,
            },
        )
    }

    fn enhance(&self, raster: PageRaster) -> Result<PageRaster> {
        match &self.enhancer {
            Some(enhancer) => enhancer.enhance(raster.image()).map(PageRaster::new),
            None => Ok(raster),
        }
    }

    /// End a job whose document could not be opened. The failed set is
    /// left as it was.
    fn fail(&self, mut state: PrintJobState, document_id: Option<String>, err: PosPrintError) -> JobReport {
        error!(error = %err, class = ?err.class(), "document could not be opened");
        state.finish(JobStatus::Failed);
        let mut report = JobReport::from_state(&state, err.to_string());
        report.document_id = document_id.clone();
        self.store_last(state, document_id);
        report
    }

    /// Record the job in history. Failures here never fail the job.
    fn archive(&self, state: &PrintJobState) -> Option<String> {
        let history = self.history.as_ref()?;
        let status = HistoryStatus::from_job(state.status, state.failed_pages.as_slice())?;
        match history.record(
            &state.document_path,
            state.total_pages,
            state.printed_pages(),
            state.failed_pages.as_slice(),
            status,
        ) {
            Ok(entry) => Some(entry.id),
            Err(err) => {
                warn!(error = %err, "could not record print history");
                None
            }
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn lock_driver(&self) -> std::sync::MutexGuard<'_, D> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_last(&self, state: PrintJobState, document_id: Option<String>) {
        *self.last_job.lock().unwrap_or_else(PoisonError::into_inner) = Some(LastJob { state, document_id });
    }

    fn last_job_snapshot(&self) -> Option<LastJob> {
        self.last_job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use posprint_core::ProgressStage;
    use posprint_driver::DriverOp;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{FakeRasterizer, RecordingSink, ScriptedDriver};

    fn document() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("receipt.pdf");
        std::fs::write(&path, b"%PDF-1.4 fixture").expect("write fixture");
        (dir, path)
    }

    fn config() -> PrinterConfig {
        PrinterConfig {
            tile_height: 100,
            ..PrinterConfig::default()
        }
    }

    fn controller(
        rasterizer: &Arc<FakeRasterizer>,
        driver: ScriptedDriver,
        sink: &Arc<RecordingSink>,
    ) -> PrintJobController<Arc<FakeRasterizer>, ScriptedDriver> {
        PrintJobController::builder(Arc::clone(rasterizer), driver)
            .config(config())
            .progress(ProgressReporter::new(sink.clone()))
            .build()
            .expect("controller")
    }

    #[tokio::test]
    async fn third_page_failing_on_second_tile_is_partial_success() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[150, 150, 150]));
        let (mut driver, _log) = ScriptedDriver::new();
        // Pages have two tiles each: pushes 5 and 6 belong to page index 2.
        driver.fail(DriverOp::PushTile, 6, -4);
        let sink = Arc::new(RecordingSink::default());

        let report = controller(&rasterizer, driver, &sink)
            .print_document(&path)
            .await
            .expect("print");

        assert_eq!(report.status, JobStatus::PartialSuccess);
        assert_eq!(report.failed_pages, vec![2]);
        assert_eq!(report.printed_pages, 2);
        assert_eq!(sink.pages(ProgressStage::Processing), vec![1, 2, 3]);
        assert_eq!(sink.pages(ProgressStage::Printing), vec![1, 2]);
    }

    #[tokio::test]
    async fn failing_middle_page_does_not_stop_its_neighbours() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[150, 150, 150]));
        let (mut driver, log) = ScriptedDriver::new();
        driver.fail(DriverOp::PushTile, 4, -4);
        let sink = Arc::new(RecordingSink::default());

        let report = controller(&rasterizer, driver, &sink)
            .print_document(&path)
            .await
            .expect("print");

        assert_eq!(report.failed_pages, vec![1]);
        assert_eq!(sink.pages(ProgressStage::Printing), vec![1, 3]);
        assert_eq!(log.starts(), 2);
        assert_eq!(rasterizer.rendered(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn render_failure_is_isolated_to_its_page() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50, 50, 50]).fail_render(1));
        let (driver, log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());

        let report = controller(&rasterizer, driver, &sink)
            .print_document(&path)
            .await
            .expect("print");

        assert_eq!(report.status, JobStatus::PartialSuccess);
        assert_eq!(report.failed_pages, vec![1]);
        assert_eq!(log.starts(), 2);
        assert_eq!(sink.pages(ProgressStage::Processing), vec![1, 2, 3]);
        assert_eq!(rasterizer.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_document_succeeds_without_touching_the_head() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[]));
        let (driver, log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());

        let report = controller(&rasterizer, driver, &sink)
            .print_document(&path)
            .await
            .expect("print");

        assert_eq!(report.status, JobStatus::Success);
        assert!(report.failed_pages.is_empty());
        assert!(sink.events().is_empty());
        assert!(log.calls().is_empty());
        assert_eq!(rasterizer.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_file_fails_before_any_work() {
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50]));
        let (driver, log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        let err = controller
            .print_document("/no/such/receipt.pdf")
            .await
            .expect_err("missing file");

        assert!(matches!(err, PosPrintError::FileNotFound(_)));
        assert_eq!(rasterizer.opens.load(Ordering::SeqCst), 0);
        assert!(sink.events().is_empty());
        assert!(log.calls().is_empty());
        assert!(!controller.is_busy());
        assert!(controller.last_job().is_none());
    }

    #[tokio::test]
    async fn undecodable_document_reports_failed() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::rejecting("bad xref table"));
        let (driver, log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());

        let report = controller(&rasterizer, driver, &sink)
            .print_document(&path)
            .await
            .expect("report");

        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.message.contains("bad xref table"));
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn retry_reprints_only_failed_pages_and_narrows_the_set() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50, 50, 50, 50]));
        let (mut driver, log) = ScriptedDriver::new();
        // First pass: pages 1 and 3 fail to fire (starts 2 and 4).
        driver.fail(DriverOp::Start, 2, -9);
        driver.fail(DriverOp::Start, 4, -9);
        // Retry: page 1 fires (start 5), page 3 fails again (start 6).
        driver.fail(DriverOp::Start, 6, -9);
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        let first = controller.print_document(&path).await.expect("print");
        assert_eq!(first.failed_pages, vec![1, 3]);

        let retry = controller.retry_failed_pages().await.expect("retry");
        assert_eq!(retry.status, JobStatus::PartialRetrySuccess);
        assert_eq!(retry.failed_pages, vec![3]);
        assert_eq!(retry.printed_pages, 3);
        assert_eq!(log.starts(), 6);
        assert_eq!(rasterizer.rendered(), vec![0, 1, 2, 3, 1, 3]);

        let retries: Vec<(usize, usize)> = sink
            .events()
            .iter()
            .filter(|e| e.stage == ProgressStage::Retry)
            .map(|e| (e.current_page, e.total_pages))
            .collect();
        assert_eq!(retries, vec![(1, 2), (2, 2)]);

        let again = controller.retry_failed_pages().await.expect("retry");
        assert_eq!(again.status, JobStatus::RetrySuccess);
        assert!(again.failed_pages.is_empty());
        assert_eq!(controller.last_job().expect("last job").printed_pages(), 4);
    }

    #[tokio::test]
    async fn healed_render_failure_recovers_on_retry() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50, 50]).fail_render(0));
        let (driver, _log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        controller.print_document(&path).await.expect("print");
        rasterizer.heal_render(0);
        let retry = controller.retry_failed_pages().await.expect("retry");

        assert_eq!(retry.status, JobStatus::RetrySuccess);
        assert_eq!(rasterizer.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_with_nothing_failed_does_no_work() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50, 50]));
        let (driver, log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        let fresh = controller.retry_failed_pages().await.expect("retry");
        assert_eq!(fresh.status, JobStatus::NoRetryNeeded);

        controller.print_document(&path).await.expect("print");
        let calls_before = log.calls().len();
        let events_before = sink.events().len();

        for _ in 0..2 {
            let report = controller.retry_failed_pages().await.expect("retry");
            assert_eq!(report.status, JobStatus::NoRetryNeeded);
        }
        assert_eq!(log.calls().len(), calls_before);
        assert_eq!(sink.events().len(), events_before);
        assert_eq!(rasterizer.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_mid_page_stops_the_job_and_fails_that_page() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[150, 150, 150]));
        let (placeholder, _) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, placeholder, &sink);

        // The head asks for cancellation while its third tile is in flight.
        let (mut wired, wired_log) = ScriptedDriver::new();
        wired.cancel_at_push(3, controller.cancel_handle());
        *controller.inner.lock_driver() = wired;

        let report = controller.print_document(&path).await.expect("print");

        assert_eq!(report.status, JobStatus::Cancelled);
        assert_eq!(report.failed_pages, vec![1]);
        assert_eq!(report.printed_pages, 1);
        // Page 1 got its first tile only; page 2 was never rendered.
        assert_eq!(wired_log.pushes(), 3);
        assert_eq!(wired_log.starts(), 1);
        assert_eq!(rasterizer.rendered(), vec![0, 1]);
        assert_eq!(rasterizer.closes.load(Ordering::SeqCst), 1);
        assert_eq!(sink.pages(ProgressStage::Printing), vec![1]);

        let state = controller.last_job().expect("last job");
        assert_eq!(state.attempted_pages, 2);
        assert_eq!(state.total_pages, 3);
    }

    #[tokio::test]
    async fn cancel_flag_resets_for_the_next_job() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50]));
        let (driver, _log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        controller.cancel();
        controller.cancel();
        let report = controller.print_document(&path).await.expect("print");
        assert_eq!(report.status, JobStatus::Success);
    }

    #[tokio::test]
    async fn cancelled_retry_keeps_interrupted_and_unattempted_pages() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(
            FakeRasterizer::with_pages(&[150, 150, 150])
                .fail_render(0)
                .fail_render(1)
                .fail_render(2),
        );
        let (placeholder, _) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, placeholder, &sink);

        let first = controller.print_document(&path).await.expect("print");
        assert_eq!(first.failed_pages, vec![0, 1, 2]);

        for page in 0..3 {
            rasterizer.heal_render(page);
        }
        // Page 0 uses pushes 1 and 2; cancel while page 1's first tile is out.
        let (mut wired, wired_log) = ScriptedDriver::new();
        wired.cancel_at_push(3, controller.cancel_handle());
        *controller.inner.lock_driver() = wired;

        let retry = controller.retry_failed_pages().await.expect("retry");

        assert_eq!(retry.status, JobStatus::Cancelled);
        assert_eq!(retry.failed_pages, vec![1, 2]);
        assert_eq!(retry.printed_pages, 1);
        assert_eq!(wired_log.starts(), 1);
        assert_eq!(rasterizer.rendered(), vec![0, 1, 2, 0, 1]);
        assert_eq!(sink.pages(ProgressStage::Retry), vec![1, 2]);
        assert_eq!(rasterizer.closes.load(Ordering::SeqCst), 2);

        let state = controller.last_job().expect("last job");
        assert_eq!(state.status, JobStatus::Cancelled);
        assert_eq!(state.failed_pages.as_slice(), &[1, 2]);
    }

    #[tokio::test]
    async fn requests_during_a_running_job_are_busy() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50, 50]));
        let (mut driver, _log) = ScriptedDriver::new();
        let (mut entered, release) = driver.pause_at_push(1);
        let sink = Arc::new(RecordingSink::default());
        let controller = Arc::new(controller(&rasterizer, driver, &sink));

        let running = tokio::spawn({
            let controller = Arc::clone(&controller);
            let path = path.clone();
            async move { controller.print_document(&path).await }
        });
        entered.recv().await.expect("worker reached the head");
        assert!(controller.is_busy());

        let second = controller.print_document(&path).await;
        assert!(matches!(second, Err(PosPrintError::JobInProgress)));
        let retry = controller.retry_failed_pages().await;
        assert!(matches!(retry, Err(PosPrintError::JobInProgress)));
        let status = controller.printer_status().await;
        assert!(matches!(status, Err(PosPrintError::JobInProgress)));

        release.send(()).expect("release worker");
        let report = running.await.expect("join").expect("print");
        assert_eq!(report.status, JobStatus::Success);
        assert!(!controller.is_busy());
        assert_eq!(rasterizer.opens.load(Ordering::SeqCst), 1);
        assert!(controller.printer_status().await.expect("status").is_ok());
    }

    #[test]
    fn busy_guard_is_exclusive_until_dropped() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = BusyGuard::acquire(&flag).expect("first");
        assert!(matches!(
            BusyGuard::acquire(&flag),
            Err(PosPrintError::JobInProgress)
        ));
        drop(first);
        assert!(BusyGuard::acquire(&flag).is_ok());
    }

    #[tokio::test]
    async fn printer_status_forwards_driver_code() {
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[]));
        let (mut driver, _log) = ScriptedDriver::new();
        driver.fail(DriverOp::CheckStatus, 1, 3);
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        assert_eq!(controller.printer_status().await.expect("status"), StatusCode(3));
        assert!(controller.printer_status().await.expect("status").is_ok());
    }

    #[tokio::test]
    async fn history_tracks_print_retry_and_reprint() {
        let (dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50, 50]).fail_render(1));
        let (driver, _log) = ScriptedDriver::new();
        let history = PrintHistory::open(dir.path().join("history"), 50).expect("history");
        let controller = PrintJobController::builder(Arc::clone(&rasterizer), driver)
            .config(config())
            .history(history)
            .build()
            .expect("controller");

        let first = controller.print_document(&path).await.expect("print");
        assert_eq!(first.document_id.as_deref(), Some("1"));
        let entry = &controller.history_entries().expect("entries")[0];
        assert_eq!(entry.status, HistoryStatus::PartialSuccess);
        assert_eq!(entry.failed_pages, vec![1]);

        rasterizer.heal_render(1);
        controller.retry_failed_pages().await.expect("retry");
        let entry = &controller.history_entries().expect("entries")[0];
        assert_eq!(entry.status, HistoryStatus::Completed);
        assert_eq!(entry.printed_pages, 2);

        let reprint = controller.reprint_document("1").await.expect("reprint");
        assert_eq!(reprint.status, JobStatus::Success);
        assert_eq!(reprint.document_id.as_deref(), Some("2"));

        let err = controller.reprint_document("99").await.expect_err("unknown id");
        assert!(matches!(err, PosPrintError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn retry_after_document_removed_is_not_found() {
        let (_dir, path) = document();
        let rasterizer = Arc::new(FakeRasterizer::with_pages(&[50]).fail_render(0));
        let (driver, _log) = ScriptedDriver::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&rasterizer, driver, &sink);

        controller.print_document(&path).await.expect("print");
        std::fs::remove_file(&path).expect("remove");

        let err = controller.retry_failed_pages().await.expect_err("gone");
        assert!(matches!(err, PosPrintError::FileNotFound(_)));
        assert_eq!(controller.last_job().expect("last").failed_pages.as_slice(), &[0]);
    }
}
