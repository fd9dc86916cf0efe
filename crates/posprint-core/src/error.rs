// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for posprint.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all posprint operations.
#[derive(Debug, Error)]
pub enum PosPrintError {
    // -- Input errors --
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("page index {index} out of range (document has {page_count} pages)")]
    PageIndexOutOfRange { index: usize, page_count: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no printed document with id {0}")]
    DocumentNotFound(String),

    // -- Document errors --
    #[error("document could not be opened: {0}")]
    RenderInit(String),

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("image enhancement failed: {0}")]
    Enhancement(String),

    #[error("PDF inspection failed: {0}")]
    PdfError(String),

    // -- Printer errors --
    #[error("printer {operation} failed with status {code}")]
    Hardware { operation: &'static str, code: i32 },

    #[error("a print job is already running")]
    JobInProgress,

    #[error("print worker failed: {0}")]
    Worker(String),

    // -- Platform bridge --
    #[error("driver bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Storage / persistence --
    #[error("print history error: {0}")]
    History(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PosPrintError {
    /// Where this error sits in the failure taxonomy.
    ///
    /// Per-page handling keys off this: hardware and resource errors degrade
    /// to a failed page, structural errors end the job, input errors never
    /// reach a worker.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::FileNotFound(_)
            | Self::PageIndexOutOfRange { .. }
            | Self::InvalidArgument(_)
            | Self::DocumentNotFound(_) => ErrorClass::Input,

            Self::Hardware { .. } | Self::Bridge(_) | Self::PlatformUnavailable => {
                ErrorClass::Hardware
            }

            Self::Render(_)
            | Self::Enhancement(_)
            | Self::Io(_)
            | Self::History(_)
            | Self::Serialization(_) => ErrorClass::Resource,

            Self::RenderInit(_) | Self::PdfError(_) | Self::Worker(_) => ErrorClass::Structural,

            Self::JobInProgress => ErrorClass::Busy,
        }
    }

    /// Error code reported over the command channel.
    pub fn channel_code(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) | Self::DocumentNotFound(_) => "NOT_FOUND",
            Self::PageIndexOutOfRange { .. } | Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Hardware { .. } | Self::Bridge(_) => "HARDWARE_ERROR",
            Self::PlatformUnavailable => "NOT_SUPPORTED",
            Self::JobInProgress => "RESOURCE_BUSY",
            Self::Io(_) | Self::History(_) => "IO_ERROR",
            Self::RenderInit(_)
            | Self::Render(_)
            | Self::Enhancement(_)
            | Self::PdfError(_)
            | Self::Worker(_)
            | Self::Serialization(_) => "UNEXPECTED_ERROR",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PosPrintError>;
