// src/engine/config.rs
//
// Processor configuration. Loading is the caller's job; these structs only
// carry values, with `Default`, serde and a couple of presets.

use crate::error::{IiifError, Result};
use crate::ops::{ScaleFilter, Sharpen, ValidationPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DOWNSCALE_FILTER: &str = "IIIF_DOWNSCALE_FILTER";
pub const ENV_UPSCALE_FILTER: &str = "IIIF_UPSCALE_FILTER";
pub const ENV_SHARPEN: &str = "IIIF_SHARPEN";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Kernel for downscaling when the operation names none.
    pub downscale_filter: Option<ScaleFilter>,
    /// Kernel for upscaling when the operation names none.
    pub upscale_filter: Option<ScaleFilter>,
    /// Resample in linear light instead of sRGB-encoded values.
    pub linear_scaling: bool,
    /// Applied after a scale when the operation list carries no sharpen
    /// of its own.
    pub sharpen: Option<Sharpen>,
    /// Font family name to TrueType/OpenType file.
    pub fonts: BTreeMap<String, PathBuf>,
    /// Fail the request instead of skipping an overlay whose asset or
    /// font cannot be loaded.
    pub strict_overlays: bool,
    /// Checked against every operation list before decoding.
    pub validation: ValidationPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            downscale_filter: None,
            upscale_filter: None,
            linear_scaling: false,
            sharpen: None,
            fonts: BTreeMap::new(),
            strict_overlays: false,
            validation: ValidationPolicy::permissive(),
        }
    }
}

impl ProcessorConfig {
    /// Higher-quality kernels, linear-light scaling and light sharpening.
    pub fn quality() -> Self {
        Self {
            downscale_filter: Some(ScaleFilter::Lanczos3),
            upscale_filter: Some(ScaleFilter::Mitchell),
            linear_scaling: true,
            sharpen: Some(Sharpen {
                amount: 0.2,
                ..Sharpen::default()
            }),
            ..Self::default()
        }
    }

    /// Defaults overridden by `IIIF_DOWNSCALE_FILTER`,
    /// `IIIF_UPSCALE_FILTER` and `IIIF_SHARPEN` (an amount).
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`; unset keys keep
    /// their current values.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DOWNSCALE_FILTER) {
            self.downscale_filter = Some(ScaleFilter::from_str(&value)?);
        }
        if let Some(value) = lookup(ENV_UPSCALE_FILTER) {
            self.upscale_filter = Some(ScaleFilter::from_str(&value)?);
        }
        if let Some(value) = lookup(ENV_SHARPEN) {
            let amount: f64 = value.trim().parse().map_err(|_| {
                IiifError::invalid_argument(ENV_SHARPEN, value.clone(), "expected a number")
            })?;
            self.sharpen = Some(Sharpen::new(amount)?);
        }
        tracing::debug!(
            target: "iiif_image::config",
            downscale = ?self.downscale_filter,
            upscale = ?self.upscale_filter,
            sharpen = ?self.sharpen.map(|s| s.amount),
            "processor config loaded"
        );
        Ok(self)
    }

    pub fn with_font(mut self, family: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.fonts.insert(family.into(), path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DOWNSCALE_FILTER, "lanczos"),
            (ENV_UPSCALE_FILTER, "CatmullRom"),
            (ENV_SHARPEN, "0.5"),
        ]
        .into_iter()
        .collect();
        let config = ProcessorConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.downscale_filter, Some(ScaleFilter::Lanczos3));
        assert_eq!(config.upscale_filter, Some(ScaleFilter::CatmullRom));
        assert_eq!(config.sharpen.map(|s| s.amount), Some(0.5));
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let err = ProcessorConfig::default()
            .with_overrides(|k| (k == ENV_SHARPEN).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_SHARPEN));
        assert!(ProcessorConfig::default()
            .with_overrides(|k| (k == ENV_UPSCALE_FILTER).then(|| "nope".to_string()))
            .is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ProcessorConfig = serde_json::from_str(
            r#"{"downscale_filter": "mitchell", "fonts": {"sans": "/fonts/sans.ttf"}}"#,
        )
        .unwrap();
        assert_eq!(config.downscale_filter, Some(ScaleFilter::Mitchell));
        assert_eq!(config.fonts["sans"], PathBuf::from("/fonts/sans.ttf"));
        assert!(!config.linear_scaling);
        assert!(config.validation.allow_upscaling);
    }

    #[test]
    fn test_quality_preset() {
        let config = ProcessorConfig::quality();
        assert!(config.linear_scaling);
        assert_eq!(config.downscale_filter, Some(ScaleFilter::Lanczos3));
    }
}
