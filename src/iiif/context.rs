// src/iiif/context.rs

use crate::ops::identifier::DEFAULT_DELIMITER;
use crate::ops::{EncodeOptions, Overlay, Redaction, ScaleFilter, Sharpen};
use serde::{Deserialize, Serialize};

/// Server-side inputs to operation list assembly that the URI cannot
/// carry: the `max` size policy, encoder defaults and anything a delegate
/// decided for this request (redactions, overlay).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationListContext {
    /// Separates identifier, page number and scale constraint.
    pub delimiter: String,
    /// `max` resolves to at most this many pixels.
    pub max_pixels: Option<u64>,
    /// `max` resolves to at most this scale of the region.
    pub max_scale: Option<f64>,
    pub scale_filter: Option<ScaleFilter>,
    pub sharpen: Option<Sharpen>,
    pub encode: EncodeOptions,
    #[serde(skip)]
    pub redactions: Vec<Redaction>,
    #[serde(skip)]
    pub overlay: Option<Overlay>,
}

impl Default for OperationListContext {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_pixels: None,
            max_scale: None,
            scale_filter: None,
            sharpen: None,
            encode: EncodeOptions::default(),
            redactions: Vec::new(),
            overlay: None,
        }
    }
}

impl OperationListContext {
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = Some(max_pixels);
        self
    }

    pub fn with_max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = Some(max_scale);
        self
    }

    pub fn with_redaction(mut self, redaction: Redaction) -> Self {
        self.redactions.push(redaction);
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_sharpen(mut self, sharpen: Sharpen) -> Self {
        self.sharpen = Some(sharpen);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let ctx: OperationListContext =
            serde_json::from_str(r#"{"max_pixels": 1000000, "scale_filter": "lanczos3"}"#)
                .unwrap();
        assert_eq!(ctx.max_pixels, Some(1_000_000));
        assert_eq!(ctx.scale_filter, Some(ScaleFilter::Lanczos3));
        assert_eq!(ctx.delimiter, ";");
        assert_eq!(ctx.encode.quality, 80);
    }
}
