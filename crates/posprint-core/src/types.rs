// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the thermal print pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a print job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer status returned by every vendor driver call. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a print job invocation.
///
/// Everything except `Running` is terminal for the invocation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Pages are being rasterized and pushed to the head.
    Running,
    /// Every page printed.
    Success,
    /// At least one page failed; the rest of the document was still attempted.
    PartialSuccess,
    /// The document could not be opened or its page count read.
    Failed,
    /// Cancellation was observed before the job completed.
    Cancelled,
    /// A retry was requested but the failed set was empty.
    NoRetryNeeded,
    /// Every previously failed page printed on retry.
    RetrySuccess,
    /// Some previously failed pages still fail.
    PartialRetrySuccess,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }

    /// Caller-facing summary line for this status.
    pub fn describe(self, failed_pages: &[usize]) -> String {
        match self {
            Self::Running => "Print job is running".into(),
            Self::Success => "PDF processed and printed successfully".into(),
            Self::PartialSuccess => format!("Some pages failed to print: {failed_pages:?}"),
            Self::Failed => "Print job failed before any page was printed".into(),
            Self::Cancelled => "Print job was cancelled".into(),
            Self::NoRetryNeeded => "No failed pages to retry".into(),
            Self::RetrySuccess => "All failed pages printed successfully on retry".into(),
            Self::PartialRetrySuccess => {
                format!("Some pages still failed after retry: {failed_pages:?}")
            }
        }
    }
}

/// Classification of errors, driving how far a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Bad request: reported immediately, no background work, never retried.
    Input,
    /// Non-zero driver status: the page fails, the job continues.
    Hardware,
    /// Decoder or enhancement failure: handled exactly like a hardware error.
    Resource,
    /// The document cannot be opened at all: the job ends `Failed`.
    Structural,
    /// The single print head is owned by another job.
    Busy,
}

/// Page indices that failed, unique, in the order they were recorded.
///
/// Pages are processed in ascending order, so insertion order is also
/// ascending for a job produced by a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailedPages(Vec<usize>);

impl FailedPages {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a page. Returns `false` if it was already present.
    pub fn insert(&mut self, page: usize) -> bool {
        if self.0.contains(&page) {
            return false;
        }
        self.0.push(page);
        true
    }

    pub fn contains(&self, page: usize) -> bool {
        self.0.contains(&page)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Indices sorted ascending, the order retries walk them in.
    pub fn ascending(&self) -> Vec<usize> {
        let mut pages = self.0.clone();
        pages.sort_unstable();
        pages
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.clone()
    }
}

impl FromIterator<usize> for FailedPages {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut pages = Self::new();
        for page in iter {
            pages.insert(page);
        }
        pages
    }
}

/// Durable state of one print job invocation.
///
/// Owned by the controller between jobs and moved into the worker while a
/// job runs. The cancellation flag lives outside this struct because it is
/// the only thing written from another thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJobState {
    pub job_id: JobId,
    pub document_path: PathBuf,
    pub total_pages: usize,
    /// Zero-based index of the page currently (or last) being processed.
    pub current_page: usize,
    /// Pages the loop actually started. Pages past this point were never
    /// attempted, which is different from having failed.
    pub attempted_pages: usize,
    pub failed_pages: FailedPages,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PrintJobState {
    pub fn new(document_path: impl AsRef<Path>) -> Self {
        Self {
            job_id: JobId::new(),
            document_path: document_path.as_ref().to_path_buf(),
            total_pages: 0,
            current_page: 0,
            attempted_pages: 0,
            failed_pages: FailedPages::new(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark a page as started.
    pub fn begin_page(&mut self, page: usize) {
        self.current_page = page;
        self.attempted_pages = self.attempted_pages.max(page + 1);
    }

    pub fn record_failure(&mut self, page: usize) {
        debug_assert!(page < self.total_pages, "failed page outside document");
        self.failed_pages.insert(page);
    }

    /// Pages that were attempted and are not in the failed set.
    pub fn printed_pages(&self) -> usize {
        self.attempted_pages.saturating_sub(self.failed_pages.len())
    }

    /// Move into a terminal status.
    pub fn finish(&mut self, status: JobStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Terminal result handed back to the caller for a print or retry request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    pub total_pages: usize,
    pub printed_pages: usize,
    pub failed_pages: Vec<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl JobReport {
    /// Build a report from a terminal job state.
    pub fn from_state(state: &PrintJobState, message: impl Into<String>) -> Self {
        Self {
            job_id: Some(state.job_id),
            status: state.status,
            total_pages: state.total_pages,
            printed_pages: state.printed_pages(),
            failed_pages: state.failed_pages.to_vec(),
            message: message.into(),
            document_id: None,
        }
    }

    /// Report for a retry request that found nothing to do.
    pub fn no_retry_needed() -> Self {
        Self {
            job_id: None,
            status: JobStatus::NoRetryNeeded,
            total_pages: 0,
            printed_pages: 0,
            failed_pages: Vec::new(),
            message: JobStatus::NoRetryNeeded.describe(&[]),
            document_id: None,
        }
    }
}

/// Which part of the pipeline a progress notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStage {
    /// A page was rasterized, enhanced and pushed (whatever the outcome).
    #[serde(rename = "processingProgress")]
    Processing,
    /// A page was fired by the print head.
    #[serde(rename = "printingProgress")]
    Printing,
    /// A previously failed page was re-attempted.
    #[serde(rename = "retryProgress")]
    Retry,
}

impl ProgressStage {
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Processing => "processingProgress",
            Self::Printing => "printingProgress",
            Self::Retry => "retryProgress",
        }
    }
}

/// Out-of-band progress notification. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "method")]
    pub stage: ProgressStage,
    pub current_page: usize,
    pub total_pages: usize,
}
