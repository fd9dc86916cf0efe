// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

use posprint_core::error::{PosPrintError, Result};

/// Return the application data directory, creating it if needed.
///
/// `POSPRINT_DATA_DIR` wins over the XDG location; on the terminal the host
/// app passes its files directory through that variable.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POSPRINT_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => base_dir().join("posprint"),
    };
    ensure(&dir)?;
    Ok(dir)
}

/// Return a subdirectory inside the data dir (e.g. "history").
pub fn data_subdir(name: &str) -> Result<PathBuf> {
    let dir = data_dir()?.join(name);
    ensure(&dir)?;
    Ok(dir)
}

fn ensure(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| {
        PosPrintError::InvalidArgument(format!("cannot create {}: {}", dir.display(), err))
    })
}

fn base_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}
