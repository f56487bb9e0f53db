// src/iiif/v2/parameters.rs

use super::size::Size;
use crate::error::Result;
use crate::geometry::Size as Dimensions;
use crate::iiif::{self, SizeSyntax};
use crate::ops::Scale;

/// A parsed IIIF Image API 2.1 image request.
pub type Parameters = iiif::Parameters<Size>;

pub type ParametersBuilder = iiif::ParametersBuilder<Size>;

impl SizeSyntax for Size {
    const DEFAULT: &'static str = "full";

    fn parse_uri(value: &str) -> Result<Self> {
        Size::from_uri(value)
    }

    fn scale(&self) -> Result<Option<Scale>> {
        self.to_scale()
    }

    fn is_max_size(&self) -> bool {
        matches!(self, Size::Full | Size::Max)
    }

    fn max_upscaling(&self) -> bool {
        false
    }

    fn canonical_form(&self, region_size: Dimensions) -> Result<String> {
        self.to_canonical_string(region_size)
    }
}
