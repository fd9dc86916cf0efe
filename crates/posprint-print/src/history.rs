// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print history — a bounded JSON log of printed documents.
//
// Each printed document is copied next to the log as `<id>.pdf` so it can be
// reprinted after the original is gone. The log keeps the newest
// `limit` entries; evicted entries take their saved copy with them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Local;
use posprint_core::JobStatus;
use posprint_core::error::{PosPrintError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// File name of the history log inside the history directory.
pub const HISTORY_FILE: &str = "print_history.json";

/// Outcome recorded for a printed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryStatus {
    Completed,
    PartialSuccess,
    Cancelled,
}

impl HistoryStatus {
    /// History status for a terminal job status. `None` for jobs that never
    /// opened the document.
    pub fn from_job(status: JobStatus, failed_pages: &[usize]) -> Option<Self> {
        match status {
            JobStatus::Cancelled => Some(Self::Cancelled),
            JobStatus::Failed | JobStatus::Running => None,
            _ if failed_pages.is_empty() => Some(Self::Completed),
            _ => Some(Self::PartialSuccess),
        }
    }
}

/// One printed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub original_path: String,
    pub saved_path: String,
    /// Local time, `yyyyMMdd_HHmmss`.
    pub timestamp: String,
    pub total_pages: usize,
    pub printed_pages: usize,
    #[serde(with = "page_list")]
    pub failed_pages: Vec<usize>,
    pub status: HistoryStatus,
}

/// Stored as a comma separated string, e.g. `"2,5"`.
mod page_list {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pages: &[usize], serializer: S) -> Result<S::Ok, S::Error> {
        let joined = pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<usize>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>().map_err(D::Error::custom))
            .collect()
    }
}

/// Bounded, file-backed print history.
pub struct PrintHistory {
    dir: PathBuf,
    limit: usize,
    /// Serialises read-modify-write cycles on the log file.
    lock: Mutex<()>,
}

impl PrintHistory {
    /// Open (or create) the history stored in `dir`.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>, limit: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| {
            PosPrintError::History(format!("cannot create {}: {}", dir.display(), err))
        })?;
        debug!(limit, "print history opened");
        Ok(Self {
            dir,
            limit: limit.max(1),
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All entries, newest first. The log itself is oldest first.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        entries.reverse();
        Ok(entries)
    }

    /// Look up one entry.
    pub fn find(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.entries()?.into_iter().find(|entry| entry.id == id))
    }

    /// Archive a printed document and log it.
    #[instrument(skip(self, failed_pages), fields(document = %document.display()))]
    pub fn record(
        &self,
        document: &Path,
        total_pages: usize,
        printed_pages: usize,
        failed_pages: &[usize],
        status: HistoryStatus,
    ) -> Result<HistoryEntry> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;

        let next_id = entries
            .iter()
            .filter_map(|entry| entry.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = next_id.to_string();

        let saved_path = self.dir.join(format!("{}.pdf", id));
        fs::copy(document, &saved_path).map_err(|err| {
            PosPrintError::History(format!(
                "cannot archive {} to {}: {}",
                document.display(),
                saved_path.display(),
                err
            ))
        })?;

        let entry = HistoryEntry {
            id,
            original_path: document.display().to_string(),
            saved_path: saved_path.display().to_string(),
            timestamp: Local::now().format("%Y%m%d_%H%M%S").to_string(),
            total_pages,
            printed_pages,
            failed_pages: failed_pages.to_vec(),
            status,
        };

        entries.push(entry.clone());
        let excess = entries.len().saturating_sub(self.limit);
        for evicted in entries.drain(..excess) {
            if let Err(err) = fs::remove_file(&evicted.saved_path) {
                warn!(id = %evicted.id, error = %err, "could not remove evicted document copy");
            }
        }
        self.save(&entries)?;

        info!(id = %entry.id, status = ?entry.status, "document recorded in history");
        Ok(entry)
    }

    /// Rewrite an entry's failed pages after a retry.
    #[instrument(skip(self, failed_pages))]
    pub fn update_failed_pages(&self, id: &str, failed_pages: &[usize]) -> Result<HistoryEntry> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;

        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| PosPrintError::DocumentNotFound(id.to_string()))?;
        let recovered = entry.failed_pages.len().saturating_sub(failed_pages.len());
        entry.printed_pages = (entry.printed_pages + recovered).min(entry.total_pages);
        entry.failed_pages = failed_pages.to_vec();
        // A cancelled print still has pages that were never attempted.
        if entry.status != HistoryStatus::Cancelled {
            entry.status = if failed_pages.is_empty() {
                HistoryStatus::Completed
            } else {
                HistoryStatus::PartialSuccess
            };
        }
        let updated = entry.clone();

        self.save(&entries)?;
        debug!(id, failed = failed_pages.len(), "history entry updated");
        Ok(updated)
    }

    // -- Helpers --------------------------------------------------------------

    fn log_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Missing log means empty history; an unreadable one is logged and
    /// treated as empty so printing never depends on it.
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "print history unreadable, starting fresh");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.dir.join(format!("{}.tmp", HISTORY_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.log_path())?;
        Ok(())
    }
}
