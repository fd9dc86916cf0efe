// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer configuration on disk.

use std::path::Path;

use posprint_core::PrinterConfig;
use posprint_core::error::Result;
use tracing::{debug, warn};

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Load the config at `path`, falling back to defaults when the file is
/// missing or unreadable. The result is validated either way.
pub fn load_config(path: &Path) -> Result<PrinterConfig> {
    let config = match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "config unreadable, using defaults");
            PrinterConfig::default()
        }),
        Err(_) => {
            debug!(path = %path.display(), "no config file, using defaults");
            PrinterConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

pub fn persist_config(path: &Path, config: &PrinterConfig) -> Result<()> {
    config.validate()?;
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
