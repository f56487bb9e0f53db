// src/engine/pipeline.rs
//
// Runs an operation list over a decoded raster, in fixed order:
// orient, crop, scale, transpose, rotate, color, sharpen, redact, overlay.
// Steps without an effect are skipped and leave the raster borrowed.

use super::color::{bitonal, grayscale};
use super::config::ProcessorConfig;
use super::overlay::{apply_overlays, redact};
use super::resample::unsharp_mask;
use super::transform::{auto_orient, crop, rotate, scale, transpose};
use crate::error::Result;
use crate::geometry::{Rectangle, ReductionFactor, Size};
use crate::info::Orientation;
use crate::ops::{ColorTransform, OperationList, Rotate, Transpose};
use image::DynamicImage;
use std::borrow::Cow;

/// What the pipeline needs to know about the raster it is given.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    /// Full-resolution size, already adjusted for `orientation`.
    pub full_size: Size,
    /// Rotation still to be applied to the raster to make it upright.
    pub orientation: Orientation,
    /// Reduction factor the raster was decoded at.
    pub reduction_factor: ReductionFactor,
    pub config: &'a ProcessorConfig,
}

macro_rules! skipped {
    ($step:expr) => {
        tracing::trace!(target: "iiif_image::pipeline", step = $step, "no effect; skipped")
    };
}

pub fn apply<'a>(
    img: &'a DynamicImage,
    ops: &OperationList,
    ctx: &RenderContext<'_>,
) -> Result<Cow<'a, DynamicImage>> {
    let sc = ops.scale_constraint();
    let rf = ctx.reduction_factor;

    let mut img = auto_orient(Cow::Borrowed(img), ctx.orientation);

    if let Some(c) = ops.crop() {
        img = crop(img, c, rf, sc)?;
    }

    let region = ops.region(ctx.full_size);
    let mut scaled = false;
    match ops.scale() {
        Some(s) if s.has_effect(region.size(), sc) || rf.0 > 0 => {
            let before = (img.width(), img.height());
            img = scale(img, s, region.size(), sc, ctx.config)?;
            scaled = before != (img.width(), img.height());
        }
        Some(_) => skipped!("scale"),
        None => {}
    }
    let scaled_dims = (img.width(), img.height());

    let transposes: Vec<Transpose> = ops.transposes().copied().collect();
    for axis in &transposes {
        img = Cow::Owned(transpose(&img, *axis));
    }

    let rotation = ops.rotate().filter(|r| r.has_effect());
    if let Some(r) = rotation {
        img = rotate(img, r);
    }

    match ops.color_transform() {
        Some(ColorTransform::Gray) => img = Cow::Owned(grayscale(&img)),
        Some(ColorTransform::Bitonal) => img = Cow::Owned(bitonal(&img)),
        None => {}
    }

    let sharpen = ops
        .sharpen()
        .copied()
        .or(if scaled { ctx.config.sharpen } else { None });
    match sharpen {
        Some(s) if s.has_effect() => img = Cow::Owned(unsharp_mask(&img, &s)),
        Some(_) => skipped!("sharpen"),
        None => {}
    }

    let scales = (
        scaled_dims.0 as f64 / region.width(),
        scaled_dims.1 as f64 / region.height(),
    );
    for redaction in ops.redactions() {
        let rect = redaction.resulting_region(region, scales);
        if rect.is_empty() {
            skipped!("redaction");
            continue;
        }
        let rect = map_through(
            rect,
            scaled_dims,
            &transposes,
            rotation,
            (img.width(), img.height()),
        );
        if !redact(img.to_mut(), rect, redaction.color()) {
            skipped!("redaction");
        }
    }

    let overlays: Vec<_> = ops.overlays().filter(|o| o.has_effect()).collect();
    if !overlays.is_empty() {
        img = Cow::Owned(apply_overlays(&img, overlays, ctx.config)?);
    }

    Ok(img)
}

/// Maps a rectangle on the scaled raster (`before`) through the mirrors
/// and rotation that followed, onto the final raster (`after`). Rotated
/// rectangles become their axis-aligned bounding box.
pub fn map_through(
    rect: Rectangle,
    before: (u32, u32),
    transposes: &[Transpose],
    rotation: Option<&Rotate>,
    after: (u32, u32),
) -> Rectangle {
    let (w, h) = (before.0 as f64, before.1 as f64);
    let mut rect = rect;
    for axis in transposes {
        rect = match axis {
            Transpose::Horizontal => Rectangle::new(w - rect.right(), rect.y(), rect.width(), rect.height()),
            Transpose::Vertical => Rectangle::new(rect.x(), h - rect.bottom(), rect.width(), rect.height()),
        };
    }
    let Some(rotation) = rotation else {
        return rect;
    };

    let theta = rotation.normalized().to_radians();
    let (sin, cos) = theta.sin_cos();
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ox, oy) = (after.0 as f64 / 2.0, after.1 as f64 / 2.0);
    let corners = [
        (rect.x(), rect.y()),
        (rect.right(), rect.y()),
        (rect.x(), rect.bottom()),
        (rect.right(), rect.bottom()),
    ]
    .map(|(x, y)| {
        let (dx, dy) = (x - cx, y - cy);
        (dx * cos - dy * sin + ox, dx * sin + dy * cos + oy)
    });
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
    Rectangle::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScaleConstraint;
    use crate::ops::{
        Color, Crop, MetaIdentifier, Operation, Redaction, Scale, ScaleMode, Sharpen,
    };
    use image::{GenericImageView, Rgb, RgbImage};

    fn list(ops: Vec<Operation>) -> OperationList {
        let mut list = OperationList::new(MetaIdentifier::new("img"));
        for op in ops {
            list.add(op).unwrap();
        }
        list
    }

    fn raster(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 10) as u8, (y * 10) as u8, 100])
        }))
    }

    fn run<'a>(img: &'a DynamicImage, ops: &OperationList) -> Cow<'a, DynamicImage> {
        let config = ProcessorConfig::default();
        let ctx = RenderContext {
            full_size: Size::from((img.width(), img.height())),
            orientation: Orientation::Rotate0,
            reduction_factor: ReductionFactor(0),
            config: &config,
        };
        apply(img, ops, &ctx).unwrap()
    }

    #[test]
    fn test_noop_list_borrows_input() {
        let img = raster(20, 10);
        let ops = list(vec![
            Operation::Crop(Crop::by_percent(0.0, 0.0, 1.0, 1.0).unwrap()),
            Operation::Scale(Scale::by_percent(1.0).unwrap()),
            Operation::Rotate(Rotate::new(0.0).unwrap()),
            Operation::Sharpen(Sharpen::default()),
        ]);
        let out = run(&img, &ops);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert!(std::ptr::eq(out.as_ref(), &img));
    }

    #[test]
    fn test_crop_scale_rotate_gray() {
        let img = raster(20, 10);
        let ops = list(vec![
            Operation::Crop(Crop::by_pixels(0.0, 0.0, 10.0, 10.0).unwrap()),
            Operation::Scale(Scale::by_pixels(Some(5), None, ScaleMode::AspectFitWidth).unwrap()),
            Operation::Rotate(Rotate::new(90.0).unwrap()),
            Operation::ColorTransform(ColorTransform::Gray),
        ]);
        let out = run(&img, &ops);
        assert_eq!(out.dimensions(), (5, 5));
        let px = out.to_rgb8().get_pixel(2, 2).0;
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn test_orientation_applied_before_crop() {
        // stored 10x20, displayed 20x10
        let stored = raster(10, 20);
        let config = ProcessorConfig::default();
        let ctx = RenderContext {
            full_size: Size::new(20.0, 10.0),
            orientation: Orientation::Rotate90,
            reduction_factor: ReductionFactor(0),
            config: &config,
        };
        let ops = list(vec![Operation::Crop(
            Crop::by_pixels(0.0, 0.0, 20.0, 5.0).unwrap(),
        )]);
        let out = apply(&stored, &ops, &ctx).unwrap();
        assert_eq!(out.dimensions(), (20, 5));
    }

    #[test]
    fn test_redaction_follows_crop_and_scale() {
        let img = raster(100, 100);
        let ops = list(vec![
            Operation::Crop(Crop::by_pixels(50.0, 50.0, 50.0, 50.0).unwrap()),
            Operation::Scale(Scale::by_percent(0.5).unwrap()),
            Operation::Redaction(
                Redaction::new(Rectangle::new(60.0, 60.0, 20.0, 20.0), Color::rgb(255, 0, 0))
                    .unwrap(),
            ),
        ]);
        let out = run(&img, &ops).to_rgb8();
        assert_eq!(out.dimensions(), (25, 25));
        // (60,60)-(80,80) full → (5,5)-(15,15) output
        assert_eq!(out.get_pixel(5, 5).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(14, 14).0, [255, 0, 0]);
        assert_ne!(out.get_pixel(16, 16).0, [255, 0, 0]);
        assert_ne!(out.get_pixel(4, 4).0, [255, 0, 0]);
    }

    #[test]
    fn test_redaction_outside_crop_is_skipped() {
        let img = raster(20, 20);
        let ops = list(vec![
            Operation::Crop(Crop::by_pixels(0.0, 0.0, 10.0, 10.0).unwrap()),
            Operation::Redaction(
                Redaction::new(Rectangle::new(15.0, 15.0, 2.0, 2.0), Color::WHITE).unwrap(),
            ),
        ]);
        let out = run(&img, &ops);
        assert_eq!(out.to_rgb8(), img.crop_imm(0, 0, 10, 10).to_rgb8());
    }

    #[test]
    fn test_redaction_mapped_through_mirror_and_rotation() {
        let rect = Rectangle::new(0.0, 0.0, 2.0, 1.0);
        let mirrored = map_through(rect, (10, 4), &[Transpose::Horizontal], None, (10, 4));
        assert_eq!(mirrored.to_int_tuple(), (8, 0, 2, 1));

        let rotation = Rotate::new(90.0).unwrap();
        let turned = map_through(rect, (10, 4), &[], Some(&rotation), (4, 10));
        assert_eq!(turned.to_int_tuple(), (3, 0, 1, 2));
    }

    #[test]
    fn test_scale_constraint_halves_output() {
        let img = raster(40, 20);
        let mut ops = OperationList::new(
            MetaIdentifier::new("img").with_scale_constraint(ScaleConstraint::new(1, 2).unwrap()),
        );
        ops.apply_non_endpoint_mutations(Size::new(40.0, 20.0))
            .unwrap();
        let out = run(&img, &ops);
        assert_eq!(out.dimensions(), (20, 10));
    }
}
