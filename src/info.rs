// src/info.rs
//
// Source image metadata and the size/tile arithmetic shared by the info
// documents of both API versions.

use crate::engine::SourceDecoder;
use crate::error::{IiifError, Result};
use crate::geometry::{ScaleConstraint, Size};
use crate::ops::identifier::{MetaIdentifier, DEFAULT_DELIMITER};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

/// Bumped whenever the serialized shape of [`Info`] changes, so cached
/// copies written by older versions can be discarded.
pub const SERIALIZATION_VERSION: u32 = 4;

/// Clockwise rotation that must be applied to decoded pixels to display
/// them upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// From the EXIF Orientation tag (1-8). Mirrored orientations are not
    /// honoured and read as upright.
    pub fn from_exif(value: u16) -> Self {
        match value {
            3 => Orientation::Rotate180,
            6 => Orientation::Rotate90,
            8 => Orientation::Rotate270,
            _ => Orientation::Rotate0,
        }
    }

    /// Reads the Orientation tag from any container kamadak-exif
    /// understands (JPEG, TIFF, PNG, WebP, HEIF).
    pub fn read_from(bytes: &[u8]) -> Self {
        let mut cursor = Cursor::new(bytes);
        let value = exif::Reader::new()
            .read_from_container(&mut cursor)
            .ok()
            .and_then(|exif| {
                exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                    .and_then(|field| field.value.get_uint(0))
            });
        match value {
            Some(v) if (1..=8).contains(&v) => Self::from_exif(v as u16),
            _ => Orientation::Rotate0,
        }
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Orientation::Rotate0 => 0,
            Orientation::Rotate90 => 90,
            Orientation::Rotate180 => 180,
            Orientation::Rotate270 => 270,
        }
    }

    /// Size as displayed.
    pub fn adjusted_size(&self, size: Size) -> Size {
        match self {
            Orientation::Rotate90 | Orientation::Rotate270 => size.inverted(),
            Orientation::Rotate0 | Orientation::Rotate180 => size,
        }
    }
}

/// One page or resolution level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoImage {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(default)]
    pub orientation: Orientation,
}

impl InfoImage {
    pub fn size(&self) -> Size {
        Size::from((self.width, self.height))
    }

    /// Physical tile size; equal to the image size for untiled sources.
    pub fn tile_size(&self) -> Size {
        Size::from((self.tile_width, self.tile_height))
    }

    pub fn is_tiled(&self) -> bool {
        self.tile_width < self.width || self.tile_height < self.height
    }

    pub fn oriented_size(&self) -> Size {
        self.orientation.adjusted_size(self.size())
    }
}

/// Read-only metadata about a source image, cacheable between requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub identifier: Option<String>,
    /// Short name of the source format, e.g. `jpeg`.
    pub source_format: String,
    pub images: Vec<InfoImage>,
    pub num_resolutions: u32,
    pub serialization_timestamp: Option<u64>,
    pub serialization_version: u32,
}

impl Info {
    pub fn new(source_format: impl Into<String>, images: Vec<InfoImage>) -> Self {
        Self {
            identifier: None,
            source_format: source_format.into(),
            images,
            num_resolutions: 1,
            serialization_timestamp: None,
            serialization_version: SERIALIZATION_VERSION,
        }
    }

    /// Reads every page's geometry from `decoder`.
    pub fn from_decoder(decoder: &mut dyn SourceDecoder) -> Result<Self> {
        let count = decoder.page_count()?;
        let orientation = decoder.orientation()?;
        let mut images = Vec::with_capacity(count);
        for page in 0..count {
            let (width, height) = decoder.size(page)?;
            let (tile_width, tile_height) = decoder.tile_size(page)?;
            images.push(InfoImage {
                width,
                height,
                tile_width,
                tile_height,
                orientation,
            });
        }
        let mut info = Self::new(decoder.format().name(), images);
        info.num_resolutions = decoder.num_resolutions()?;
        Ok(info)
    }

    pub fn image(&self, page: usize) -> Result<&InfoImage> {
        self.images
            .get(page)
            .ok_or_else(|| IiifError::page_out_of_range(page, self.images.len()))
    }

    pub fn page_count(&self) -> usize {
        self.images.len()
    }

    /// Full size of `page` as stored.
    pub fn size(&self, page: usize) -> Result<Size> {
        Ok(self.image(page)?.size())
    }

    /// Full size of `page` as displayed, before any scale constraint.
    pub fn oriented_size(&self, page: usize) -> Result<Size> {
        Ok(self.image(page)?.oriented_size())
    }

    pub fn to_json(&self) -> Result<String> {
        let mut copy = self.clone();
        copy.serialization_timestamp = Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        );
        serde_json::to_string(&copy)
            .map_err(|e| IiifError::internal_panic(format!("info serialization failed: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| IiifError::decode_failed(format!("invalid serialized info: {e}")))
    }
}

/// Limits applied when describing an image to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoConfig {
    /// Prefix of every `id` (no trailing slash).
    pub base_uri: String,
    pub delimiter: String,
    /// Smallest dimension listed in `sizes`.
    pub min_size: u32,
    pub min_tile_size: u32,
    pub max_pixels: Option<u64>,
    pub max_scale: Option<f64>,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost/iiif".to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            min_size: 64,
            min_tile_size: 512,
            max_pixels: None,
            max_scale: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEntry {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileEntry {
    pub width: u32,
    pub height: u32,
    pub scale_factors: Vec<u32>,
}

/// Page image addressed by `meta` and its displayed full size after the
/// scale constraint.
pub(crate) fn resolve_target<'a>(
    info: &'a Info,
    meta: &MetaIdentifier,
) -> Result<(&'a InfoImage, Size)> {
    let image = info.image(meta.page_index())?;
    let full = meta
        .scale_constraint()
        .constrained_size(image.oriented_size());
    Ok((image, full))
}

/// Number of times `full` can be halved before its shorter side drops
/// below `min_size`.
pub fn max_reduction_factor(full: Size, min_size: u32) -> u32 {
    let mut factor = 0;
    let mut shortest = full.width().min(full.height());
    let min = f64::from(min_size.max(1));
    while shortest / 2.0 >= min && factor < 31 {
        shortest /= 2.0;
        factor += 1;
    }
    factor
}

/// 2^n size series of `full` (already orientation- and
/// scale-constraint-adjusted), largest first.
pub fn sizes(full: Size, config: &InfoConfig) -> Vec<SizeEntry> {
    let n = max_reduction_factor(full, config.min_size);
    (0..=n)
        .filter_map(|i| {
            let scale = 0.5f64.powi(i as i32);
            let size = full.scaled(scale);
            let (width, height) = size.to_pixels();
            let area = width as u64 * height as u64;
            let over_pixels = config.max_pixels.is_some_and(|max| area > max);
            let over_scale = config.max_scale.is_some_and(|max| scale > max);
            (!over_pixels && !over_scale).then_some(SizeEntry { width, height })
        })
        .collect()
}

/// Tile size and scale factors for `image` viewed through `sc`.
pub fn tiles(image: &InfoImage, sc: ScaleConstraint, config: &InfoConfig) -> TileEntry {
    let full = sc.constrained_size(image.oriented_size());
    let min_tile = f64::from(config.min_tile_size.max(1));
    let tile = if image.is_tiled() {
        let mut tile = sc.constrained_size(image.orientation.adjusted_size(image.tile_size()));
        while (tile.width() < min_tile && tile.width() < full.width())
            || (tile.height() < min_tile && tile.height() < full.height())
        {
            tile = Size::new(
                (tile.width() * 2.0).min(full.width()),
                (tile.height() * 2.0).min(full.height()),
            );
        }
        tile
    } else {
        let mut tile = full;
        while tile.width() / 2.0 >= min_tile && tile.height() / 2.0 >= min_tile {
            tile = tile.scaled(0.5);
        }
        tile
    };
    let n = max_reduction_factor(full, config.min_size);
    let (width, height) = tile.to_pixels();
    TileEntry {
        width,
        height,
        scale_factors: (0..=n).map(|i| 1u32 << i).collect(),
    }
}
