// src/engine/text.rs
//
// String overlay layout and rendering.

use crate::error::{IiifError, Result};
use crate::ops::{Color, StringOverlay, TextLayout};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::RgbaImage;
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;

/// Text metrics, separated from rasterization so layout can be computed
/// (and tested) without a font file.
pub trait TextMeasure {
    /// Pixel width of `text` on one line at `size`.
    fn width(&self, text: &str, size: f32) -> u32;
    /// Distance between baselines at `size`.
    fn line_height(&self, size: f32) -> u32;
}

/// Metrics of a loaded font.
pub struct FontMeasure<'a> {
    font: &'a FontVec,
}

impl<'a> FontMeasure<'a> {
    pub fn new(font: &'a FontVec) -> Self {
        Self { font }
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn width(&self, text: &str, size: f32) -> u32 {
        text_size(PxScale::from(size), self.font, text).0
    }

    fn line_height(&self, size: f32) -> u32 {
        self.font.as_scaled(PxScale::from(size)).height().ceil() as u32
    }
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .map_err(|e| IiifError::source_read_failed(path.display().to_string(), e))?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| IiifError::decode_failed(format!("{}: {e}", path.display())))
}

/// Lines of a string overlay and the font size they were laid out at.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub font_size: f32,
    pub width: u32,
    pub height: u32,
}

/// Lays out `overlay.text` inside `bounds`.
///
/// Word wrap keeps the configured size and breaks at spaces; the block
/// grows as tall as the wrapped lines need and is clipped when drawn.
/// Auto-shrink keeps the explicit line breaks and steps the size down by
/// one until the text fits, giving `None` once the minimum size is passed.
pub fn layout(
    overlay: &StringOverlay,
    bounds: (u32, u32),
    measure: &dyn TextMeasure,
) -> Option<TextBlock> {
    match overlay.layout {
        TextLayout::WordWrap => {
            let lines = wrap(&overlay.text, overlay.font_size, bounds.0, measure);
            let block = measure_block(lines, overlay.font_size, measure);
            (block.width > 0).then_some(block)
        }
        TextLayout::AutoShrink => {
            let lines: Vec<String> = overlay.text.lines().map(str::to_string).collect();
            let mut size = overlay.font_size;
            while size >= overlay.min_font_size && size >= 1.0 {
                let block = measure_block(lines.clone(), size, measure);
                if block.width > 0 && block.width <= bounds.0 && block.height <= bounds.1 {
                    return Some(block);
                }
                size -= 1.0;
            }
            None
        }
    }
}

fn measure_block(lines: Vec<String>, size: f32, measure: &dyn TextMeasure) -> TextBlock {
    let width = lines
        .iter()
        .map(|l| measure.width(l, size))
        .max()
        .unwrap_or(0);
    let height = measure.line_height(size) * lines.len() as u32;
    TextBlock {
        lines,
        font_size: size,
        width,
        height,
    }
}

fn wrap(text: &str, size: f32, max_width: u32, measure: &dyn TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if current.is_empty() || measure.width(&candidate, size) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }
    lines
}

/// Draws `overlay` onto `canvas`, clipped at its edges. Returns false,
/// leaving the canvas untouched, when auto-shrunk text does not fit.
pub fn draw_string(canvas: &mut RgbaImage, overlay: &StringOverlay, font: &FontVec) -> bool {
    let measure = FontMeasure::new(font);
    let inset = overlay.inset.saturating_mul(2);
    let bounds = (
        canvas.width().saturating_sub(inset),
        canvas.height().saturating_sub(inset),
    );
    let Some(block) = layout(overlay, bounds, &measure) else {
        tracing::debug!(
            target: "iiif_image::overlay",
            text = %overlay.text,
            ?bounds,
            "string overlay does not fit; skipped"
        );
        return false;
    };

    let (x, y) = overlay.position.origin(
        (canvas.width(), canvas.height()),
        (block.width, block.height),
        overlay.inset,
    );
    if let Some(background) = overlay.background {
        fill_rect(canvas, (x, y), (block.width, block.height), background);
    }

    let scale = PxScale::from(block.font_size);
    let line_height = measure.line_height(block.font_size) as i64;
    for (i, line) in block.lines.iter().enumerate() {
        // center each line inside the block
        let line_x = x + (block.width as i64 - measure.width(line, block.font_size) as i64) / 2;
        let line_y = y + i as i64 * line_height;
        if let Some(stroke) = overlay.stroke_color {
            let r = overlay.stroke_width as i64;
            for (dx, dy) in [(-r, 0), (r, 0), (0, -r), (0, r), (-r, -r), (r, r), (-r, r), (r, -r)] {
                draw_text_mut(
                    canvas,
                    stroke.to_rgba(),
                    (line_x + dx) as i32,
                    (line_y + dy) as i32,
                    scale,
                    font,
                    line,
                );
            }
        }
        draw_text_mut(
            canvas,
            overlay.color.to_rgba(),
            line_x as i32,
            line_y as i32,
            scale,
            font,
            line,
        );
    }
    true
}

/// Alpha-blends a solid rectangle, clipped to the canvas.
pub(crate) fn fill_rect(canvas: &mut RgbaImage, origin: (i64, i64), size: (u32, u32), color: Color) {
    let x0 = origin.0.max(0) as u32;
    let y0 = origin.1.max(0) as u32;
    let x1 = ((origin.0 + size.0 as i64).max(0) as u32).min(canvas.width());
    let y1 = ((origin.1 + size.1 as i64).max(0) as u32).min(canvas.height());
    let a = color.a as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = canvas.get_pixel_mut(x, y);
            if a == 255 {
                p.0 = [color.r, color.g, color.b, 255];
                continue;
            }
            let mix = |src: u8, dst: u8| ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8;
            p.0 = [
                mix(color.r, p[0]),
                mix(color.g, p[1]),
                mix(color.b, p[2]),
                (a + p[3] as u32 * (255 - a) / 255) as u8,
            ];
        }
    }
}
