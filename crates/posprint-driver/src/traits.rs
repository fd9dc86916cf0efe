// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device driver trait for the thermal print head.

use image::RgbaImage;
use posprint_core::{HeadSettings, StatusCode};

/// Returned by drivers that have no head behind them.
pub const STATUS_UNAVAILABLE: StatusCode = StatusCode(-255);

/// Returned when the bridge itself (not the head) failed to make the call.
pub const STATUS_BRIDGE_ERROR: StatusCode = StatusCode(-254);

/// The primitive operations of the per-page print protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Init,
    ApplySettings,
    PushTile,
    AdvanceStep,
    Start,
    CheckStatus,
}

impl DriverOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ApplySettings => "apply_settings",
            Self::PushTile => "push_tile",
            Self::AdvanceStep => "advance_step",
            Self::Start => "start",
            Self::CheckStatus => "check_status",
        }
    }
}

impl std::fmt::Display for DriverOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous facade over the vendor print head.
///
/// Every call blocks until the head answers and returns its raw status;
/// `StatusCode::OK` is success, anything else is a hardware-specific failure.
/// A page is printed by the sequence
/// `init → apply_settings → (push_tile → advance_step)* → start`.
///
/// Implementations are driven from one worker thread at a time.
pub trait DeviceDriver: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Reset the head and its buffer for a new page.
    fn init(&mut self) -> StatusCode;

    /// Apply darkness, speed, mode and alignment after `init`.
    fn apply_settings(&mut self, _settings: &HeadSettings) -> StatusCode {
        StatusCode::OK
    }

    /// Queue one raster strip. The image carries width and height.
    fn push_tile(&mut self, tile: &RgbaImage) -> StatusCode;

    /// Feed the paper by `units` steps.
    fn advance_step(&mut self, units: i32) -> StatusCode;

    /// Fire everything queued since `init`.
    fn start(&mut self) -> StatusCode;

    /// Query head readiness without printing.
    fn check_status(&mut self) -> StatusCode;
}

impl<D: DeviceDriver + ?Sized> DeviceDriver for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn init(&mut self) -> StatusCode {
        (**self).init()
    }

    fn apply_settings(&mut self, settings: &HeadSettings) -> StatusCode {
        (**self).apply_settings(settings)
    }

    fn push_tile(&mut self, tile: &RgbaImage) -> StatusCode {
        (**self).push_tile(tile)
    }

    fn advance_step(&mut self, units: i32) -> StatusCode {
        (**self).advance_step(units)
    }

    fn start(&mut self) -> StatusCode {
        (**self).start()
    }

    fn check_status(&mut self) -> StatusCode {
        (**self).check_status()
    }
}
