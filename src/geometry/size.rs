// src/geometry/size.rs

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width/height pair in (possibly fractional) pixels.
///
/// Logical sizes are kept as `f64` so that percent and scale-constraint
/// arithmetic does not accumulate rounding error; conversion to integer
/// pixels happens only at the raster boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f64,
    height: f64,
}

impl Size {
    /// Negative inputs are clamped to zero.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn of_image(img: &DynamicImage) -> Self {
        Self::new(img.width() as f64, img.height() as f64)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Width rounded half-up, at least 1.
    pub fn int_width(&self) -> u32 {
        self.width.round().max(1.0) as u32
    }

    /// Height rounded half-up, at least 1.
    pub fn int_height(&self) -> u32 {
        self.height.round().max(1.0) as u32
    }

    /// Width truncated toward zero.
    pub fn floor_width(&self) -> u64 {
        self.width.floor() as u64
    }

    /// Height truncated toward zero.
    pub fn floor_height(&self) -> u64 {
        self.height.floor() as u64
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    pub fn scaled_xy(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.width * sx, self.height * sy)
    }

    /// Swaps width and height (used for 90/270 degree orientations).
    pub fn inverted(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Integer pixel dimensions, never smaller than 1x1.
    pub fn to_pixels(&self) -> (u32, u32) {
        (self.int_width(), self.int_height())
    }

    /// Compares the rounded integer dimensions.
    pub fn same_pixels(&self, other: &Size) -> bool {
        self.int_width() == other.int_width() && self.int_height() == other.int_height()
    }
}

impl From<(u32, u32)> for Size {
    fn from((w, h): (u32, u32)) -> Self {
        Self::new(w as f64, h as f64)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.int_width(), self.int_height())
    }
}
