// src/engine.rs
//
// Raster side of the crate: decoding sources, running an operation list
// over the pixels and encoding the result. Everything here is synchronous
// and runs on the caller's thread (resampling fans rows out over rayon).

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum accepted image dimension (width or height), for sources and
/// outputs alike.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum accepted source pixel count. 100 megapixels is 400MB of RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULES
// =============================================================================

mod color;
mod common;
mod config;
mod decoder;
mod encoder;
mod io;
mod overlay;
mod pipeline;
mod processor;
mod resample;
mod text;
mod transform;

pub use color::{
    bitonal, cmyk_to_rgb, flatten, grayscale, linear_to_srgb, otsu_threshold, srgb_to_linear,
    ycck_to_cmyk,
};
pub use common::run_with_panic_policy;
pub use config::{ProcessorConfig, ENV_DOWNSCALE_FILTER, ENV_SHARPEN, ENV_UPSCALE_FILTER};
pub use decoder::{
    check_dimensions, DecodedImage, SourceDecoder, SourceFormat, StandardDecoder,
};
pub use encoder::{ImageEncoder, StandardEncoder};
pub use io::{extract_icc_profile, Source};
pub use overlay::{apply_overlays, draw_image, load_overlay_image, redact};
pub use pipeline::{apply, map_through, RenderContext};
pub use processor::Processor;
pub use resample::{resample, unsharp_mask, MIN_RESAMPLE_DIMENSION};
pub use text::{draw_string, layout, load_font, FontMeasure, TextBlock, TextMeasure};
pub use transform::{auto_orient, crop, crop_box, rotate, scale, select_filter, transpose};
