// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// posprint — Core types, errors and configuration shared across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{HeadSettings, PrinterConfig};
pub use error::{PosPrintError, Result};
pub use types::*;
