// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android print head driver via JNI.
//
// Requires the Android NDK and the terminal vendor SDK on the app classpath.
// Each trait method invokes the matching `com.ctk.sdk.PosApiHelper` method
// through JNI and hands its integer result straight back as the status.
//
// A failure inside the bridge itself (class not found, bad signature,
// pending exception) is logged and reported as `STATUS_BRIDGE_ERROR` so the
// pipeline treats it exactly like a head fault on that page.

#![cfg(target_os = "android")]

use image::RgbaImage;
use jni::objects::{GlobalRef, JObject, JValue};
use jni::sys::{jint, jsize};
use jni::{JNIEnv, JavaVM};

use posprint_core::error::{PosPrintError, Result};
use posprint_core::{HeadSettings, StatusCode};

use crate::traits::{DeviceDriver, STATUS_BRIDGE_ERROR};

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

const HELPER_CLASS: &str = "com/ctk/sdk/PosApiHelper";
const BITMAP_CLASS: &str = "android/graphics/Bitmap";
const BITMAP_CONFIG_CLASS: &str = "android/graphics/Bitmap$Config";

/// Obtain the process `JavaVM` from the global Android context.
///
/// The pointer is the one set by `android_main` or
/// `ANativeActivity_onCreate`.
fn java_vm() -> Result<JavaVM> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| PosPrintError::Bridge(format!("failed to obtain JavaVM: {e}")))
}

/// Convenience: map any `jni::errors::Error` into `PosPrintError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> PosPrintError {
    PosPrintError::Bridge(format!("{context}: {e}"))
}

/// Convert RGBA pixels to the packed ARGB ints `Bitmap.createBitmap` takes.
fn argb_pixels(tile: &RgbaImage) -> Vec<jint> {
    tile.pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            (u32::from(a) << 24 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b)) as jint
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Driver struct
// ---------------------------------------------------------------------------

/// Print head driver backed by the vendor `PosApiHelper` singleton.
pub struct PosApiDriver {
    vm: JavaVM,
    helper: GlobalRef,
}

impl PosApiDriver {
    /// Bind to `PosApiHelper.getInstance()`.
    ///
    /// Fails with `PosPrintError::Bridge` if the SDK class is not on the
    /// classpath or the singleton cannot be obtained.
    pub fn connect() -> Result<Self> {
        let vm = java_vm()?;
        let helper = {
            let mut env = vm
                .attach_current_thread_permanently()
                .map_err(|e| jni_err("attach_current_thread", e))?;
            let instance: JObject = env
                .call_static_method(
                    HELPER_CLASS,
                    "getInstance",
                    "()Lcom/ctk/sdk/PosApiHelper;",
                    &[],
                )
                .map_err(|e| jni_err("PosApiHelper.getInstance", e))?
                .l()
                .map_err(|e| jni_err("getInstance->l", e))?;
            if instance.is_null() {
                return Err(PosPrintError::Bridge(
                    "PosApiHelper.getInstance returned null".into(),
                ));
            }
            env.new_global_ref(&instance)
                .map_err(|e| jni_err("new_global_ref(PosApiHelper)", e))?
        };

        tracing::info!("Android: bound vendor PosApiHelper");
        Ok(Self { vm, helper })
    }

    fn env(&self) -> std::result::Result<JNIEnv<'_>, jni::errors::Error> {
        self.vm.attach_current_thread_permanently()
    }

    /// Call an `int`-returning helper method and map its result to a status.
    fn call_int(&self, method: &'static str, sig: &str, args: &[JValue]) -> StatusCode {
        let result = self.env().and_then(|mut env| {
            env.call_method(&self.helper, method, sig, args)
                .and_then(|value| value.i())
        });
        match result {
            Ok(code) => StatusCode(code),
            Err(err) => {
                tracing::error!(method, error = %err, "Android: PosApiHelper call failed");
                STATUS_BRIDGE_ERROR
            }
        }
    }

    /// Build an ARGB_8888 `android.graphics.Bitmap` holding the tile.
    fn tile_bitmap<'local>(
        env: &mut JNIEnv<'local>,
        tile: &RgbaImage,
    ) -> Result<JObject<'local>> {
        let pixels = argb_pixels(tile);
        let array = env
            .new_int_array(pixels.len() as jsize)
            .map_err(|e| jni_err("new_int_array(tile)", e))?;
        env.set_int_array_region(&array, 0, &pixels)
            .map_err(|e| jni_err("set_int_array_region(tile)", e))?;

        let config: JObject = env
            .get_static_field(
                BITMAP_CONFIG_CLASS,
                "ARGB_8888",
                "Landroid/graphics/Bitmap$Config;",
            )
            .map_err(|e| jni_err("Bitmap.Config.ARGB_8888", e))?
            .l()
            .map_err(|e| jni_err("ARGB_8888->l", e))?;

        env.call_static_method(
            BITMAP_CLASS,
            "createBitmap",
            "([IIILandroid/graphics/Bitmap$Config;)Landroid/graphics/Bitmap;",
            &[
                JValue::Object(&array),
                JValue::Int(tile.width() as jint),
                JValue::Int(tile.height() as jint),
                JValue::Object(&config),
            ],
        )
        .map_err(|e| jni_err("Bitmap.createBitmap", e))?
        .l()
        .map_err(|e| jni_err("createBitmap->l", e))
    }
}

impl DeviceDriver for PosApiDriver {
    fn name(&self) -> &str {
        "pos-api"
    }

    fn init(&mut self) -> StatusCode {
        self.call_int("PrintInit", "()I", &[])
    }

    /// Apply each head setting; the first non-zero status is returned.
    fn apply_settings(&mut self, settings: &HeadSettings) -> StatusCode {
        let calls = [
            ("PrintSetGray", settings.gray),
            ("PrintSetMode", settings.mode),
            ("PrintSetSpeed", settings.speed),
            ("PrintSetAlign", settings.alignment),
        ];
        let mut first_failure = StatusCode::OK;
        for (method, value) in calls {
            let status = self.call_int(method, "(I)I", &[JValue::Int(value)]);
            if !status.is_ok() && first_failure.is_ok() {
                first_failure = status;
            }
        }
        first_failure
    }

    fn push_tile(&mut self, tile: &RgbaImage) -> StatusCode {
        let mut env = match self.env() {
            Ok(env) => env,
            Err(err) => {
                tracing::error!(error = %err, "Android: cannot attach JNI thread");
                return STATUS_BRIDGE_ERROR;
            }
        };

        let pushed = Self::tile_bitmap(&mut env, tile).and_then(|bitmap| {
            env.call_method(
                &self.helper,
                "PrintBmp",
                "(Landroid/graphics/Bitmap;)I",
                &[JValue::Object(&bitmap)],
            )
            .and_then(|value| value.i())
            .map_err(|e| jni_err("PosApiHelper.PrintBmp", e))
        });

        match pushed {
            Ok(code) => StatusCode(code),
            Err(err) => {
                tracing::error!(error = %err, "Android: tile push failed in bridge");
                STATUS_BRIDGE_ERROR
            }
        }
    }

    fn advance_step(&mut self, units: i32) -> StatusCode {
        self.call_int("PrintStep", "(I)I", &[JValue::Int(units)])
    }

    fn start(&mut self) -> StatusCode {
        self.call_int("PrintStart", "()I", &[])
    }

    fn check_status(&mut self) -> StatusCode {
        self.call_int("PrintCheckStatus", "()I", &[])
    }
}
