// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting — fire-and-forget notifications from the print worker.
//
// The worker never blocks on a listener: events go into an injected sink,
// and the stock sink is a bounded channel that drops events when full.
// Delivery is therefore at-most-once.

use std::sync::Arc;

use posprint_core::{ProgressEvent, ProgressStage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Destination for progress events. Must never block.
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, event: ProgressEvent);
}

/// Sink that discards everything.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn deliver(&self, _event: ProgressEvent) {}
}

/// Sink backed by a bounded `tokio` channel. The receiver is consumed on the
/// caller's own task.
pub struct ChannelSink {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn deliver(&self, event: ProgressEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(
                    method = event.stage.method_name(),
                    page = event.current_page,
                    "progress channel full, event dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                trace!("progress receiver gone");
            }
        }
    }
}

/// Emits the three kinds of progress event. Cheap to clone.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }

    /// Reporter that emits nothing.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// A page went through render, enhance and print, whatever the outcome.
    pub fn processing(&self, current: usize, total: usize) {
        self.emit(ProgressStage::Processing, current, total);
    }

    /// A page was fired by the head.
    pub fn printing(&self, current: usize, total: usize) {
        self.emit(ProgressStage::Printing, current, total);
    }

    /// The `current`-th of `total` failed pages was re-attempted.
    pub fn retry(&self, current: usize, total: usize) {
        self.emit(ProgressStage::Retry, current, total);
    }

    fn emit(&self, stage: ProgressStage, current_page: usize, total_pages: usize) {
        self.sink.deliver(ProgressEvent {
            stage,
            current_page,
            total_pages,
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}
