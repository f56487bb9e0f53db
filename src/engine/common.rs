// src/engine/common.rs
//
// Helpers shared across engine modules.

use crate::error::{IiifError, Result};
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, turning a panic inside a codec or raster routine into
/// `InternalPanic` so that one bad source cannot take down the worker.
///
/// `stage` names the step in the error message (`decode:jpeg`,
/// `encode:png`, ...).
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::warn!(target: "iiif_image::engine", stage, %detail, "panic captured");
            Err(IiifError::internal_panic(format!(
                "{stage}: panic captured: {detail}"
            )))
        }
    }
}
