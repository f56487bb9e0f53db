// src/ops/policy.rs
//
// Server-side limits that an operation list is checked against before any
// pixels are decoded.

use crate::error::{IiifError, Result};
use serde::{Deserialize, Serialize};

const STRICT_MAX_PIXELS: u64 = 25_000_000; // ~5K x 5K output
const STRICT_MAX_SCALE: f64 = 1.0;
const LENIENT_MAX_PIXELS: u64 = 100_000_000;
const LENIENT_MAX_SCALE: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Largest output area in pixels.
    pub max_pixels: Option<u64>,
    /// Largest output/region ratio.
    pub max_scale: Option<f64>,
    /// Allow output larger than the region. IIIF v3 requests opt in with
    /// `^`; this is the server's side of that agreement.
    pub allow_upscaling: bool,
    /// When set, only these `(width, height)` outputs are served.
    pub restricted_sizes: Option<Vec<(u32, u32)>>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_pixels: None,
            max_scale: None,
            allow_upscaling: true,
            restricted_sizes: None,
        }
    }
}

impl ValidationPolicy {
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            max_pixels: Some(STRICT_MAX_PIXELS),
            max_scale: Some(STRICT_MAX_SCALE),
            allow_upscaling: false,
            restricted_sizes: None,
        }
    }

    pub fn lenient() -> Self {
        Self {
            max_pixels: Some(LENIENT_MAX_PIXELS),
            max_scale: Some(LENIENT_MAX_SCALE),
            allow_upscaling: true,
            restricted_sizes: None,
        }
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        if let Some(limit) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > limit {
                return Err(IiifError::size_limit_exceeded(
                    width as u64,
                    height as u64,
                    format!("maximum of {limit} pixels"),
                ));
            }
        }
        Ok(())
    }

    /// `scale` is output size over full-resolution region size.
    pub fn enforce_scale(&self, width: u32, height: u32, scale: f64) -> Result<()> {
        if let Some(limit) = self.max_scale {
            if scale > limit + crate::geometry::DELTA {
                return Err(IiifError::size_limit_exceeded(
                    width as u64,
                    height as u64,
                    format!("maximum scale of {limit}"),
                ));
            }
        }
        Ok(())
    }

    pub fn enforce_restricted(&self, width: u32, height: u32) -> Result<()> {
        match &self.restricted_sizes {
            Some(sizes) if !sizes.contains(&(width, height)) => {
                Err(IiifError::size_restricted(width as u64, height as u64))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn strict_policy_enforces_pixels_and_scale() {
        let cfg = ValidationPolicy::strict();
        assert!(cfg.enforce_pixels(2000, 2000).is_ok());
        assert!(cfg.enforce_pixels(7000, 7000).is_err());
        assert!(cfg.enforce_scale(10, 10, 1.0).is_ok());
        assert!(cfg.enforce_scale(10, 10, 1.5).is_err());
    }

    #[test]
    fn permissive_allows_anything() {
        let cfg = ValidationPolicy::permissive();
        assert!(cfg.enforce_pixels(100_000, 100_000).is_ok());
        assert!(cfg.enforce_scale(1, 1, 100.0).is_ok());
        assert!(cfg.enforce_restricted(3, 7).is_ok());
    }

    #[test]
    fn restricted_sizes_use_their_own_category() {
        let cfg = ValidationPolicy {
            restricted_sizes: Some(vec![(100, 50), (50, 25)]),
            ..ValidationPolicy::default()
        };
        assert!(cfg.enforce_restricted(100, 50).is_ok());
        let err = cfg.enforce_restricted(99, 50).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::SizeRestricted);
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: ValidationPolicy = serde_json::from_str(r#"{"max_pixels": 1000}"#).unwrap();
        assert_eq!(cfg.max_pixels, Some(1000));
        assert!(cfg.allow_upscaling);
    }
}
