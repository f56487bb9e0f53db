// src/iiif/rotation.rs

use super::{format_decimal, parse_decimal};
use crate::error::{IiifError, Result};
use std::fmt;

/// Rotation path segment: optional `!` (mirror first), then degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotation {
    degrees: f64,
    mirror: bool,
}

impl Rotation {
    pub fn new(degrees: f64, mirror: bool) -> Result<Self> {
        if !degrees.is_finite() || !(0.0..=360.0).contains(&degrees) {
            return Err(IiifError::invalid_argument(
                "rotation",
                degrees.to_string(),
                "must be between 0 and 360",
            ));
        }
        Ok(Self { degrees, mirror })
    }

    pub fn from_uri(value: &str) -> Result<Self> {
        let (mirror, body) = match value.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let degrees = parse_decimal("rotation", body)?;
        if !(0.0..=360.0).contains(&degrees) {
            return Err(IiifError::invalid_argument(
                "rotation",
                value.to_string(),
                "must be between 0 and 360",
            ));
        }
        Ok(Self { degrees, mirror })
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror
    }

    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mirror {
            f.write_str("!")?;
        }
        f.write_str(&format_decimal(self.degrees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let r = Rotation::from_uri("!90").unwrap();
        assert!(r.is_mirrored());
        assert_eq!(r.degrees(), 90.0);
        let r = Rotation::from_uri("22.5").unwrap();
        assert!(!r.is_mirrored());
        assert_eq!(r.degrees(), 22.5);
    }

    #[test]
    fn test_range() {
        assert!(Rotation::from_uri("360").is_ok());
        assert!(Rotation::from_uri("360.1").is_err());
        assert!(Rotation::from_uri("-90").is_err());
        assert!(Rotation::from_uri("!").is_err());
        assert!(Rotation::from_uri("ninety").is_err());
    }

    #[test]
    fn test_canonical_strips_zeros() {
        assert_eq!(
            Rotation::from_uri("15.000").unwrap().to_canonical_string(),
            "15"
        );
        assert_eq!(Rotation::from_uri("!0.50").unwrap().to_string(), "!0.5");
    }
}
