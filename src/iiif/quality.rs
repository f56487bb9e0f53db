// src/iiif/quality.rs

use crate::error::{IiifError, Result};
use crate::ops::ColorTransform;
use std::fmt;

const VALID: &str = "bitonal, color, default, gray";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quality {
    Bitonal,
    Color,
    Default,
    Gray,
}

impl Quality {
    /// Case-insensitive.
    pub fn from_uri(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "bitonal" => Ok(Quality::Bitonal),
            "color" => Ok(Quality::Color),
            "default" => Ok(Quality::Default),
            "gray" => Ok(Quality::Gray),
            _ => Err(IiifError::invalid_quality(value.to_string(), VALID)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Quality::Bitonal => "bitonal",
            Quality::Color => "color",
            Quality::Default => "default",
            Quality::Gray => "gray",
        }
    }

    pub fn to_color_transform(&self) -> Option<ColorTransform> {
        match self {
            Quality::Bitonal => Some(ColorTransform::Bitonal),
            Quality::Gray => Some(ColorTransform::Gray),
            Quality::Color | Quality::Default => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        assert_eq!(Quality::from_uri("GRAY").unwrap(), Quality::Gray);
        assert_eq!(Quality::from_uri("Default").unwrap(), Quality::Default);
    }

    #[test]
    fn test_error_lists_valid_values() {
        let err = Quality::from_uri("sepia").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sepia"));
        assert!(msg.contains(VALID));
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_color_transform() {
        assert_eq!(
            Quality::Bitonal.to_color_transform(),
            Some(ColorTransform::Bitonal)
        );
        assert_eq!(Quality::Color.to_color_transform(), None);
    }
}
