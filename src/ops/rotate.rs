// src/ops/rotate.rs

use crate::error::{IiifError, Result};
use crate::geometry::{Size, DELTA};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clockwise rotation in degrees, `0.0..=360.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotate {
    degrees: f64,
}

impl Rotate {
    pub fn new(degrees: f64) -> Result<Self> {
        if !degrees.is_finite() || !(0.0..=360.0).contains(&degrees) {
            return Err(IiifError::invalid_argument(
                "rotation",
                degrees.to_string(),
                "must be between 0 and 360",
            ));
        }
        Ok(Self { degrees })
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    /// Degrees modulo 360.
    pub fn normalized(&self) -> f64 {
        self.degrees % 360.0
    }

    pub fn has_effect(&self) -> bool {
        self.normalized().abs() > DELTA
    }

    /// Quarter turns (1, 2 or 3) when the angle is a multiple of 90.
    pub fn quarter_turns(&self) -> Option<u8> {
        let n = self.normalized();
        let turns = (n / 90.0).round();
        if (n - turns * 90.0).abs() < DELTA {
            Some((turns as u8) % 4)
        } else {
            None
        }
    }

    /// Bounding canvas of the rotated content.
    pub fn resulting_size(&self, size: Size) -> Size {
        if !self.has_effect() {
            return size;
        }
        let radians = self.normalized().to_radians();
        let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
        let w = size.width() * cos + size.height() * sin;
        let h = size.height() * cos + size.width() * sin;
        Size::new(w, h)
    }
}

impl fmt::Display for Rotate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rotate:{}", self.degrees)
    }
}

/// Mirror axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transpose {
    Horizontal,
    Vertical,
}

impl fmt::Display for Transpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transpose::Horizontal => f.write_str("transpose:h"),
            Transpose::Vertical => f.write_str("transpose:v"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        assert!(Rotate::new(0.0).is_ok());
        assert!(Rotate::new(360.0).is_ok());
        assert!(Rotate::new(-1.0).is_err());
        assert!(Rotate::new(360.5).is_err());
        assert!(Rotate::new(f64::NAN).is_err());
    }

    #[test]
    fn test_has_effect() {
        assert!(!Rotate::new(0.0).unwrap().has_effect());
        assert!(!Rotate::new(360.0).unwrap().has_effect());
        assert!(Rotate::new(15.0).unwrap().has_effect());
    }

    #[test]
    fn test_quarter_turns() {
        assert_eq!(Rotate::new(90.0).unwrap().quarter_turns(), Some(1));
        assert_eq!(Rotate::new(270.0).unwrap().quarter_turns(), Some(3));
        assert_eq!(Rotate::new(45.0).unwrap().quarter_turns(), None);
    }

    #[test]
    fn test_resulting_size() {
        let size = Size::new(200.0, 100.0);
        let out = Rotate::new(90.0).unwrap().resulting_size(size);
        assert_eq!((out.int_width(), out.int_height()), (100, 200));
        let out = Rotate::new(45.0).unwrap().resulting_size(size);
        assert_eq!((out.int_width(), out.int_height()), (212, 212));
    }
}
