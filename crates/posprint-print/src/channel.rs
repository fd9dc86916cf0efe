// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command channel — the request/response boundary towards the host app.
//
// Requests arrive as JSON objects tagged by `method`; every request gets
// exactly one `Reply`. Errors never escape as Rust errors here: they are
// folded into `Reply::Error` with a stable string code.

use posprint_core::error::PosPrintError;
use posprint_core::{JobReport, StatusCode};
use posprint_document::Rasterizer;
use posprint_driver::{DeviceDriver, STATUS_UNAVAILABLE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::controller::PrintJobController;
use crate::history::HistoryEntry;

/// A request from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Command {
    PrintPdf {
        #[serde(rename = "pdfPath")]
        pdf_path: String,
    },
    RetryFailedPages,
    CancelJob,
    GetPrintHistory,
    ReprintDocument {
        #[serde(rename = "documentId")]
        document_id: String,
    },
    CheckPrinterStatus,
}

impl Command {
    pub fn method(&self) -> &'static str {
        match self {
            Self::PrintPdf { .. } => "printPdf",
            Self::RetryFailedPages => "retryFailedPages",
            Self::CancelJob => "cancelJob",
            Self::GetPrintHistory => "getPrintHistory",
            Self::ReprintDocument { .. } => "reprintDocument",
            Self::CheckPrinterStatus => "checkPrinterStatus",
        }
    }
}

/// The single response to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "camelCase")]
pub enum Reply {
    Job(JobReport),
    Ack { message: String },
    History { entries: Vec<HistoryEntry> },
    Status { code: StatusCode, ready: bool },
    Error { code: String, message: String },
}

impl Reply {
    pub fn error(err: &PosPrintError) -> Self {
        Self::Error {
            code: err.channel_code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Routes commands to a controller.
pub struct CommandChannel<R, D> {
    controller: PrintJobController<R, D>,
}

impl<R, D> CommandChannel<R, D>
where
    R: Rasterizer + 'static,
    D: DeviceDriver + 'static,
{
    pub fn new(controller: PrintJobController<R, D>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &PrintJobController<R, D> {
        &self.controller
    }

    pub async fn dispatch(&self, command: Command) -> Reply {
        let method = command.method();
        debug!(method, "dispatching command");

        let result = match command {
            Command::PrintPdf { pdf_path } if pdf_path.trim().is_empty() => Err(
                PosPrintError::InvalidArgument("PDF path is required".into()),
            ),
            Command::PrintPdf { pdf_path } => self.controller.print_document(&pdf_path).await.map(Reply::Job),
            Command::RetryFailedPages => self.controller.retry_failed_pages().await.map(Reply::Job),
            Command::CancelJob => {
                self.controller.cancel();
                Ok(Reply::Ack {
                    message: "Cancellation requested".into(),
                })
            }
            Command::GetPrintHistory => self
                .controller
                .history_entries()
                .map(|entries| Reply::History { entries }),
            Command::ReprintDocument { document_id } if document_id.trim().is_empty() => Err(
                PosPrintError::InvalidArgument("document id is required".into()),
            ),
            Command::ReprintDocument { document_id } => self
                .controller
                .reprint_document(&document_id)
                .await
                .map(Reply::Job),
            Command::CheckPrinterStatus => match self.controller.printer_status().await {
                Ok(code) if code == STATUS_UNAVAILABLE => Err(PosPrintError::PlatformUnavailable),
                Ok(code) => Ok(Reply::Status {
                    code,
                    ready: code.is_ok(),
                }),
                Err(err) => Err(err),
            },
        };

        result.unwrap_or_else(|err| {
            warn!(method, code = err.channel_code(), error = %err, "command failed");
            Reply::error(&err)
        })
    }

    /// Decode a JSON request, dispatch it and encode the reply.
    pub async fn dispatch_json(&self, request: &str) -> String {
        let reply = match serde_json::from_str::<Command>(request) {
            Ok(command) => self.dispatch(command).await,
            Err(err) => Reply::Error {
                code: "INVALID_ARGUMENT".into(),
                message: format!("malformed command: {}", err),
            },
        };
        serde_json::to_string(&reply).unwrap_or_else(|err| {
            format!(
                r#"{{"reply":"error","code":"UNEXPECTED_ERROR","message":"{}"}}"#,
                err.to_string().replace('"', "'")
            )
        })
    }
}
