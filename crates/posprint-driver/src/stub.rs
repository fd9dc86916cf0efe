// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub driver for desktop/CI builds where the vendor head is unavailable.
//
// Every call returns `STATUS_UNAVAILABLE`. The real implementation lives in
// the `android` module.

use image::RgbaImage;
use posprint_core::StatusCode;

use crate::traits::{DeviceDriver, STATUS_UNAVAILABLE};

/// No-op driver returned on platforms without a built-in head.
pub struct StubDriver;

impl DeviceDriver for StubDriver {
    fn name(&self) -> &str {
        "stub"
    }

    fn init(&mut self) -> StatusCode {
        tracing::warn!("DeviceDriver::init called on stub driver");
        STATUS_UNAVAILABLE
    }

    fn push_tile(&mut self, _tile: &RgbaImage) -> StatusCode {
        tracing::warn!("DeviceDriver::push_tile called on stub driver");
        STATUS_UNAVAILABLE
    }

    fn advance_step(&mut self, _units: i32) -> StatusCode {
        STATUS_UNAVAILABLE
    }

    fn start(&mut self) -> StatusCode {
        tracing::warn!("DeviceDriver::start called on stub driver");
        STATUS_UNAVAILABLE
    }

    fn check_status(&mut self) -> StatusCode {
        tracing::warn!("DeviceDriver::check_status called on stub driver");
        STATUS_UNAVAILABLE
    }
}
