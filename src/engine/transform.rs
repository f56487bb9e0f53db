// src/engine/transform.rs
//
// Geometric raster operations: crop, scale, transpose, rotate and EXIF
// auto-orientation.

use super::config::ProcessorConfig;
use super::resample::resample;
use crate::error::{IiifError, Result};
use crate::geometry::{ReductionFactor, ScaleConstraint, Size};
use crate::info::Orientation;
use crate::ops::{Crop, Rotate, Scale, ScaleFilter, Transpose};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use std::borrow::Cow;

/// Integer crop box `(x, y, width, height)` inside a `raster` of the given
/// pixel size, which has been reduced by `rf` from the full image.
///
/// Rounding may push the right or bottom edge exactly one pixel past the
/// raster; that pixel is dropped.
pub fn crop_box(
    raster: (u32, u32),
    crop: &Crop,
    rf: ReductionFactor,
    sc: ScaleConstraint,
) -> (u32, u32, u32, u32) {
    let (rw, rh) = (raster.0 as i64, raster.1 as i64);
    let rect = crop.raster_rectangle(Size::from(raster), rf, sc);
    let (x, y, mut w, mut h) = rect.to_int_tuple();
    if x + w == rw + 1 {
        w -= 1;
    }
    if y + h == rh + 1 {
        h -= 1;
    }
    let x = x.clamp(0, rw);
    let y = y.clamp(0, rh);
    let w = w.clamp(0, rw - x);
    let h = h.clamp(0, rh - y);
    (x as u32, y as u32, w as u32, h as u32)
}

/// Crops `img`. A box covering the whole raster borrows the input.
pub fn crop<'a>(
    img: Cow<'a, DynamicImage>,
    crop: &Crop,
    rf: ReductionFactor,
    sc: ScaleConstraint,
) -> Result<Cow<'a, DynamicImage>> {
    let (x, y, w, h) = crop_box((img.width(), img.height()), crop, rf, sc);
    if w == 0 || h == 0 {
        return Err(IiifError::empty_region(
            (x as i64, y as i64, w as i64, h as i64),
            (img.width() as u64, img.height() as u64),
        ));
    }
    if (x, y, w, h) == (0, 0, img.width(), img.height()) {
        return Ok(img);
    }
    Ok(Cow::Owned(img.crop_imm(x, y, w, h)))
}

/// Kernel for a resize from `source` to `target` pixels: the one the
/// operation names, else the configured one for the direction, else Box
/// for downscaling and Bicubic for upscaling.
pub fn select_filter(
    requested: Option<ScaleFilter>,
    config: &ProcessorConfig,
    source: (u32, u32),
    target: (u32, u32),
) -> ScaleFilter {
    let downscaling = target.0 <= source.0 && target.1 <= source.1;
    requested.unwrap_or_else(|| {
        if downscaling {
            config.downscale_filter.unwrap_or(ScaleFilter::Box)
        } else {
            config.upscale_filter.unwrap_or(ScaleFilter::Bicubic)
        }
    })
}

/// Pixel size `scale` produces for a full-resolution region of
/// `region_size`.
pub fn scale_target(scale: &Scale, region_size: Size, sc: ScaleConstraint) -> (u32, u32) {
    scale.resulting_size(region_size, sc).to_pixels()
}

/// Resizes the (already cropped) raster to what `scale` asks of the
/// full-resolution region. Returns the input when it already has the
/// target size.
pub fn scale<'a>(
    img: Cow<'a, DynamicImage>,
    scale: &Scale,
    region_size: Size,
    sc: ScaleConstraint,
    config: &ProcessorConfig,
) -> Result<Cow<'a, DynamicImage>> {
    let target = scale_target(scale, region_size, sc);
    let source = (img.width(), img.height());
    if target == source {
        return Ok(img);
    }
    let filter = select_filter(scale.filter(), config, source, target);
    tracing::trace!(
        target: "iiif_image::transform",
        ?source,
        ?target,
        %filter,
        "scale"
    );
    resample(&img, target.0, target.1, filter, config.linear_scaling).map(Cow::Owned)
}

pub fn transpose(img: &DynamicImage, axis: Transpose) -> DynamicImage {
    match axis {
        Transpose::Horizontal => img.fliph(),
        Transpose::Vertical => img.flipv(),
    }
}

/// Clockwise rotation onto a canvas just large enough for the result.
///
/// Multiples of 90 are exact. Other angles are warped with bilinear
/// interpolation and the uncovered corners become transparent.
pub fn rotate<'a>(img: Cow<'a, DynamicImage>, rotate: &Rotate) -> Cow<'a, DynamicImage> {
    match rotate.quarter_turns() {
        Some(0) => return img,
        Some(1) => return Cow::Owned(img.rotate90()),
        Some(2) => return Cow::Owned(img.rotate180()),
        Some(3) => return Cow::Owned(img.rotate270()),
        _ => {}
    }
    let (w, h) = (img.width() as f32, img.height() as f32);
    let (cw, ch) = rotate
        .resulting_size(Size::from((img.width(), img.height())))
        .to_pixels();
    let theta = rotate.normalized().to_radians() as f32;
    let projection = Projection::translate(cw as f32 / 2.0, ch as f32 / 2.0)
        * Projection::rotate(theta)
        * Projection::translate(-w / 2.0, -h / 2.0);
    let source = img.to_rgba8();
    let mut canvas = RgbaImage::new(cw, ch);
    warp_into(
        &source,
        &projection,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
        &mut canvas,
    );
    Cow::Owned(DynamicImage::ImageRgba8(canvas))
}

/// Turns a decoded raster upright.
pub fn auto_orient<'a>(img: Cow<'a, DynamicImage>, orientation: Orientation) -> Cow<'a, DynamicImage> {
    match orientation {
        Orientation::Rotate0 => img,
        Orientation::Rotate90 => Cow::Owned(img.rotate90()),
        Orientation::Rotate180 => Cow::Owned(img.rotate180()),
        Orientation::Rotate270 => Cow::Owned(img.rotate270()),
    }
}
