// src/ops/encode.rs

use super::color::Color;
use crate::error::{IiifError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Output formats addressable through the IIIF format parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpg,
    Tif,
    Png,
    Gif,
    Jp2,
    Pdf,
    Webp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Jpg,
        OutputFormat::Tif,
        OutputFormat::Png,
        OutputFormat::Gif,
        OutputFormat::Jp2,
        OutputFormat::Pdf,
        OutputFormat::Webp,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Tif => "tif",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::Jp2 => "jp2",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Tif => "image/tiff",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Jp2 => "image/jp2",
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub fn supports_transparency(&self) -> bool {
        matches!(
            self,
            OutputFormat::Png | OutputFormat::Gif | OutputFormat::Tif | OutputFormat::Webp
        )
    }

    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "tif" | "tiff" => Ok(OutputFormat::Tif),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            "jp2" => Ok(OutputFormat::Jp2),
            "pdf" => Ok(OutputFormat::Pdf),
            "webp" => Ok(OutputFormat::Webp),
            _ => Err(IiifError::unsupported_format(ext.to_string())),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = IiifError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoder knobs that travel with the output format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Lossy quality 1-100 (JPEG, WebP).
    pub quality: u8,
    /// Progressive JPEG / interlaced PNG.
    pub interlace: bool,
    /// Flattening color for formats without alpha.
    pub background: Option<Color>,
    /// Re-embed the source ICC profile in the output.
    pub preserve_icc: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 80,
            interlace: false,
            background: None,
            preserve_icc: true,
        }
    }
}

/// Terminal operation of every list.
#[derive(Clone, Debug, PartialEq)]
pub struct Encode {
    format: OutputFormat,
    options: EncodeOptions,
    icc_profile: Option<Arc<[u8]>>,
}

impl Encode {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            options: EncodeOptions::default(),
            icc_profile: None,
        }
    }

    pub fn with_options(format: OutputFormat, options: EncodeOptions) -> Result<Self> {
        if !(1..=100).contains(&options.quality) {
            return Err(IiifError::invalid_argument(
                "encode quality",
                options.quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        Ok(Self {
            format,
            options,
            icc_profile: None,
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn quality(&self) -> u8 {
        self.options.quality
    }

    /// Source ICC profile to embed, attached by the processor at run time.
    pub fn icc_profile(&self) -> Option<&[u8]> {
        if self.options.preserve_icc {
            self.icc_profile.as_deref()
        } else {
            None
        }
    }

    pub fn with_icc_profile(mut self, icc: Option<Arc<[u8]>>) -> Self {
        self.icc_profile = icc;
        self
    }

    /// Background used when flattening alpha for `format`.
    pub fn flatten_color(&self) -> Option<Color> {
        if self.format.supports_transparency() {
            None
        } else {
            Some(self.options.background.unwrap_or(Color::WHITE))
        }
    }
}

impl fmt::Display for Encode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encode:{},q={}", self.format, self.options.quality)?;
        if self.options.interlace {
            f.write_str(",interlace")?;
        }
        if let Some(bg) = self.options.background {
            write!(f, ",bg={bg}")?;
        }
        Ok(())
    }
}
