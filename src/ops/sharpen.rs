// src/ops/sharpen.rs

use crate::error::{IiifError, Result};
use crate::geometry::DELTA;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unsharp mask parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sharpen {
    /// Strength of the edge boost (0 disables).
    pub amount: f64,
    /// Gaussian sigma of the blur used to find edges.
    pub radius: f64,
    /// Minimum per-channel difference (0-255) before a pixel is touched.
    pub threshold: u8,
}

impl Default for Sharpen {
    fn default() -> Self {
        Self {
            amount: 0.0,
            radius: 1.0,
            threshold: 0,
        }
    }
}

impl Sharpen {
    pub fn new(amount: f64) -> Result<Self> {
        Self {
            amount,
            ..Self::default()
        }
        .validated()
    }

    pub fn validated(self) -> Result<Self> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(IiifError::invalid_argument(
                "sharpen amount",
                self.amount.to_string(),
                "must be a non-negative number",
            ));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(IiifError::invalid_argument(
                "sharpen radius",
                self.radius.to_string(),
                "must be greater than 0",
            ));
        }
        Ok(self)
    }

    pub fn has_effect(&self) -> bool {
        self.amount > DELTA
    }
}

impl fmt::Display for Sharpen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sharpen:{}", self.amount)?;
        if (self.radius - 1.0).abs() > DELTA || self.threshold != 0 {
            write!(f, ",{},{}", self.radius, self.threshold)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(Sharpen::new(0.5).is_ok());
        assert!(Sharpen::new(-0.1).is_err());
        assert!(Sharpen {
            amount: 1.0,
            radius: 0.0,
            threshold: 0
        }
        .validated()
        .is_err());
    }

    #[test]
    fn test_has_effect() {
        assert!(!Sharpen::new(0.0).unwrap().has_effect());
        assert!(Sharpen::new(0.2).unwrap().has_effect());
    }
}
