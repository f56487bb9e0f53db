// src/ops/overlay.rs
//
// Overlays and redactions composited after all geometric operations.

use super::color::Color;
use crate::error::{IiifError, Result};
use crate::geometry::{Rectangle, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Anchor of an overlay inside the output image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    LeftCenter,
    Center,
    RightCenter,
    BottomLeft,
    BottomCenter,
    BottomRight,
    /// Tile across the whole image.
    Repeat,
    /// Fit inside the image minus the inset, keeping aspect ratio.
    Scaled,
}

impl Position {
    /// Top-left corner of an `item` placed in `canvas` with `inset` margin.
    /// `Repeat` and `Scaled` fall back to the center.
    pub fn origin(&self, canvas: (u32, u32), item: (u32, u32), inset: u32) -> (i64, i64) {
        let (cw, ch) = (canvas.0 as i64, canvas.1 as i64);
        let (iw, ih) = (item.0 as i64, item.1 as i64);
        let inset = inset as i64;
        let left = inset;
        let right = cw - iw - inset;
        let hcenter = (cw - iw) / 2;
        let top = inset;
        let bottom = ch - ih - inset;
        let vcenter = (ch - ih) / 2;
        match self {
            Position::TopLeft => (left, top),
            Position::TopCenter => (hcenter, top),
            Position::TopRight => (right, top),
            Position::LeftCenter => (left, vcenter),
            Position::Center | Position::Repeat | Position::Scaled => (hcenter, vcenter),
            Position::RightCenter => (right, vcenter),
            Position::BottomLeft => (left, bottom),
            Position::BottomCenter => (hcenter, bottom),
            Position::BottomRight => (right, bottom),
        }
    }
}

impl FromStr for Position {
    type Err = IiifError;

    /// Accepts `top left`, `top-left`, `TOP_LEFT`, `center`, `repeat`,
    /// `scaled`, etc.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let position = match words.as_slice() {
            ["top", "left"] => Position::TopLeft,
            ["top", "center"] | ["top"] => Position::TopCenter,
            ["top", "right"] => Position::TopRight,
            ["left", "center"] | ["left"] => Position::LeftCenter,
            ["center"] => Position::Center,
            ["right", "center"] | ["right"] => Position::RightCenter,
            ["bottom", "left"] => Position::BottomLeft,
            ["bottom", "center"] | ["bottom"] => Position::BottomCenter,
            ["bottom", "right"] => Position::BottomRight,
            ["repeat"] => Position::Repeat,
            ["scaled"] => Position::Scaled,
            _ => {
                return Err(IiifError::invalid_argument(
                    "overlay position",
                    s.to_string(),
                    "expected e.g. 'top left', 'center', 'repeat' or 'scaled'",
                ))
            }
        };
        Ok(position)
    }
}

/// Where an image overlay's PNG bytes come from.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlaySource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl fmt::Display for OverlaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlaySource::Path(p) => write!(f, "{}", p.display()),
            OverlaySource::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageOverlay {
    pub source: OverlaySource,
    pub position: Position,
    pub inset: u32,
}

/// Strategy used when a string does not fit the available width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextLayout {
    /// Keep the font size and break lines at word boundaries.
    WordWrap,
    /// Shrink the font one point at a time until the text fits.
    AutoShrink,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StringOverlay {
    pub text: String,
    pub position: Position,
    pub inset: u32,
    /// Key into the processor's font registry.
    pub font_family: String,
    pub font_size: f32,
    pub min_font_size: f32,
    pub color: Color,
    pub stroke_color: Option<Color>,
    pub stroke_width: u32,
    pub background: Option<Color>,
    pub layout: TextLayout,
}

impl StringOverlay {
    pub fn new(text: impl Into<String>, position: Position) -> Self {
        Self {
            text: text.into(),
            position,
            inset: 10,
            font_family: "default".to_string(),
            font_size: 18.0,
            min_font_size: 10.0,
            color: Color::WHITE,
            stroke_color: None,
            stroke_width: 1,
            background: None,
            layout: TextLayout::AutoShrink,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    Image(ImageOverlay),
    String(StringOverlay),
}

impl Overlay {
    pub fn has_effect(&self) -> bool {
        match self {
            Overlay::Image(_) => true,
            Overlay::String(s) => !s.text.trim().is_empty() && s.color.a > 0,
        }
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overlay::Image(o) => {
                write!(f, "overlay:image:{}@{:?}+{}", o.source, o.position, o.inset)
            }
            Overlay::String(o) => write!(
                f,
                "overlay:string:{}@{:?}+{},{}:{}",
                o.text, o.position, o.inset, o.font_family, o.font_size
            ),
        }
    }
}

/// Opaque fill over a region given in full-resolution source pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Redaction {
    region: Rectangle,
    color: Color,
}

impl Redaction {
    pub fn new(region: Rectangle, color: Color) -> Result<Self> {
        if region.x() < 0.0 || region.y() < 0.0 || region.is_empty() {
            return Err(IiifError::invalid_argument(
                "redaction region",
                region.to_string(),
                "origin must be non-negative and extent greater than 0",
            ));
        }
        // Redactions hide content; a translucent fill would not.
        let color = Color { a: 255, ..color };
        Ok(Self { region, color })
    }

    pub fn region(&self) -> Rectangle {
        self.region
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Region in output pixels (before transpose/rotation), given the
    /// full-resolution crop region and the full → output scales.
    pub fn resulting_region(&self, crop_region: Rectangle, scales: (f64, f64)) -> Rectangle {
        let visible = self.region.intersect(&crop_region);
        if visible.is_empty() {
            return Rectangle::default();
        }
        visible
            .translated(-crop_region.x(), -crop_region.y())
            .scaled_xy(scales.0, scales.1)
    }

    pub fn has_effect(&self, full_size: Size) -> bool {
        !self.region.clipped_to(full_size).is_empty()
    }
}

impl fmt::Display for Redaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "redact:{}:{}", self.region, self.color)
    }
}
