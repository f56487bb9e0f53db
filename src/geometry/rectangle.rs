// src/geometry/rectangle.rs

use super::Size;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned region in (possibly fractional) pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width(), size.height())
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Empty when either dimension is zero or negative.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    // Integer accessors round rather than truncate. Truncating the origin
    // while rounding the extent is what causes off-by-one raster overruns.

    pub fn int_x(&self) -> i64 {
        self.x.round() as i64
    }

    pub fn int_y(&self) -> i64 {
        self.y.round() as i64
    }

    pub fn int_width(&self) -> i64 {
        self.width.round() as i64
    }

    pub fn int_height(&self) -> i64 {
        self.height.round() as i64
    }

    pub fn to_int_tuple(&self) -> (i64, i64, i64, i64) {
        (self.int_x(), self.int_y(), self.int_width(), self.int_height())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        self.scaled_xy(factor, factor)
    }

    pub fn scaled_xy(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Intersection with another rectangle. Returns an empty rectangle
    /// (zero width/height at the clamped origin) when they do not overlap.
    pub fn intersect(&self, other: &Rectangle) -> Self {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self::new(x, y, (right - x).max(0.0), (bottom - y).max(0.0))
    }

    /// Intersection with `(0, 0, size)`.
    pub fn clipped_to(&self, size: Size) -> Self {
        self.intersect(&Rectangle::from_size(size))
    }

    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        px >= self.x && py >= self.y && px < self.right() && py < self.bottom()
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.int_x(),
            self.int_y(),
            self.int_width(),
            self.int_height()
        )
    }
}
