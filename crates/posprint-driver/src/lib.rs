// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// posprint — Thermal print head driver facade.
//
// The pipeline talks to the head only through `DeviceDriver`. On the terminal
// that trait is backed by the vendor SDK over JNI; elsewhere a stub or the
// PNG simulator stands in.

pub mod image_sink;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

pub mod stub;

pub use image_sink::{FailurePlan, ImageSinkDriver};
pub use stub::StubDriver;
pub use traits::{DeviceDriver, DriverOp, STATUS_BRIDGE_ERROR, STATUS_UNAVAILABLE};

use posprint_core::error::Result;

/// Driver for the head built into this platform.
///
/// On Android this binds the vendor `PosApiHelper`; everywhere else it
/// returns the stub, whose every call reports `STATUS_UNAVAILABLE`.
pub fn platform_driver() -> Result<Box<dyn DeviceDriver>> {
    #[cfg(target_os = "android")]
    {
        Ok(Box::new(android::PosApiDriver::connect()?))
    }
    #[cfg(not(target_os = "android"))]
    {
        Ok(Box::new(StubDriver))
    }
}
