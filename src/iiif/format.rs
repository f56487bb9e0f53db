// src/iiif/format.rs

use crate::error::{IiifError, Result};
use crate::ops::OutputFormat;

/// Format extension from the URI. Only the IIIF tokens are accepted
/// (`jpg`, not `jpeg`).
pub fn from_uri(value: &str) -> Result<OutputFormat> {
    OutputFormat::ALL
        .into_iter()
        .find(|f| f.extension() == value)
        .ok_or_else(|| IiifError::unsupported_format(value.to_string()))
}
