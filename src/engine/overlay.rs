// src/engine/overlay.rs
//
// Compositing after the geometric steps: redaction fills, image overlays
// and string overlays.

use super::config::ProcessorConfig;
use super::resample::resample;
use super::text::{draw_string, fill_rect, load_font};
use crate::error::{IiifError, Result};
use crate::geometry::{Rectangle, Size};
use crate::ops::{Color, ImageOverlay, Overlay, OverlaySource, Position, ScaleFilter};
use image::{imageops, DynamicImage, RgbaImage};

/// Loads an overlay asset as RGBA.
pub fn load_overlay_image(source: &OverlaySource) -> Result<RgbaImage> {
    let bytes = match source {
        OverlaySource::Path(path) => std::fs::read(path)
            .map_err(|e| IiifError::source_read_failed(path.display().to_string(), e))?,
        OverlaySource::Bytes(bytes) => bytes.to_vec(),
    };
    image::load_from_memory(&bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| IiifError::decode_failed(format!("overlay {source}: {e}")))
}

/// Alpha-composites `asset` onto `canvas` as `overlay` positions it.
pub fn draw_image(canvas: &mut RgbaImage, overlay: &ImageOverlay, asset: &RgbaImage) -> Result<()> {
    let (cw, ch) = canvas.dimensions();
    let (aw, ah) = asset.dimensions();
    if aw == 0 || ah == 0 {
        return Ok(());
    }
    match overlay.position {
        Position::Repeat => {
            for y in (0..ch).step_by(ah as usize) {
                for x in (0..cw).step_by(aw as usize) {
                    imageops::overlay(canvas, asset, x as i64, y as i64);
                }
            }
        }
        Position::Scaled => {
            let inset = overlay.inset.saturating_mul(2);
            let (bw, bh) = (cw.saturating_sub(inset), ch.saturating_sub(inset));
            if bw == 0 || bh == 0 {
                return Ok(());
            }
            let factor = (bw as f64 / aw as f64).min(bh as f64 / ah as f64);
            let w = ((aw as f64 * factor).round() as u32).max(1);
            let h = ((ah as f64 * factor).round() as u32).max(1);
            let scaled = resample(
                &DynamicImage::ImageRgba8(asset.clone()),
                w,
                h,
                ScaleFilter::Triangle,
                false,
            )?
            .to_rgba8();
            let (x, y) = Position::Center.origin((cw, ch), (w, h), 0);
            imageops::overlay(canvas, &scaled, x, y);
        }
        anchored => {
            let (x, y) = anchored.origin((cw, ch), (aw, ah), overlay.inset);
            imageops::overlay(canvas, asset, x, y);
        }
    }
    Ok(())
}

/// Draws every overlay onto `img`. Assets or fonts that cannot be loaded
/// fail the request under `strict_overlays`, else they are skipped.
pub fn apply_overlays<'o>(
    img: &DynamicImage,
    overlays: impl IntoIterator<Item = &'o Overlay>,
    config: &ProcessorConfig,
) -> Result<DynamicImage> {
    let had_alpha = img.color().has_alpha();
    let mut canvas = img.to_rgba8();
    for overlay in overlays {
        let outcome = match overlay {
            Overlay::Image(image_overlay) => load_overlay_image(&image_overlay.source)
                .and_then(|asset| draw_image(&mut canvas, image_overlay, &asset)),
            Overlay::String(string_overlay) => config
                .fonts
                .get(&string_overlay.font_family)
                .ok_or_else(|| {
                    IiifError::invalid_argument(
                        "font family",
                        string_overlay.font_family.clone(),
                        "no font registered under this name",
                    )
                })
                .and_then(|path| load_font(path))
                .map(|font| {
                    draw_string(&mut canvas, string_overlay, &font);
                }),
        };
        if let Err(e) = outcome {
            if config.strict_overlays {
                return Err(e);
            }
            tracing::warn!(
                target: "iiif_image::overlay",
                %overlay,
                error = %e,
                "overlay skipped"
            );
        }
    }
    Ok(restore_layout(canvas, had_alpha))
}

/// Opaque fill of `rect` (output pixels), clipped to the image. Returns
/// false when nothing of it lies inside.
pub fn redact(img: &mut DynamicImage, rect: Rectangle, color: Color) -> bool {
    let (x, y, w, h) = rect.to_int_tuple();
    let clipped = Rectangle::new(x as f64, y as f64, w as f64, h as f64)
        .clipped_to(Size::from((img.width(), img.height())));
    if clipped.int_width() <= 0 || clipped.int_height() <= 0 {
        return false;
    }
    let had_alpha = img.color().has_alpha();
    let mut canvas = img.to_rgba8();
    fill_rect(
        &mut canvas,
        (clipped.int_x(), clipped.int_y()),
        (clipped.int_width() as u32, clipped.int_height() as u32),
        Color { a: 255, ..color },
    );
    *img = restore_layout(canvas, had_alpha);
    true
}

fn restore_layout(canvas: RgbaImage, alpha: bool) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(canvas);
    if alpha {
        img
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}
