// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Posprint Print — job control for the thermal head.  Pages are rendered
// and enhanced by `posprint-document`, cut into bands by the tile scheduler
// and pushed through a `posprint-driver` device, with progress and history
// reported on the side.

pub mod channel;
pub mod controller;
pub mod history;
pub mod progress;
pub mod tiling;

#[cfg(test)]
mod testing;

pub use channel::{Command, CommandChannel, Reply};
pub use controller::{CancelHandle, ControllerBuilder, PrintJobController};
pub use history::{HistoryEntry, HistoryStatus, PrintHistory};
pub use progress::{ChannelSink, NullSink, ProgressReporter, ProgressSink};
pub use tiling::{PageOutcome, TilePlan, TileScheduler};
