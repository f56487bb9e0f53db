// src/iiif/v3/info.rs
//
// Image API 3.0 information document (info.json).

use crate::error::{IiifError, Result};
use crate::iiif::compliance::{ComplianceLevel, Features, Formats, Qualities};
use crate::info::{resolve_target, sizes, tiles, Info, InfoConfig, SizeEntry, TileEntry};
use crate::ops::MetaIdentifier;
use serde::Serialize;

pub const CONTEXT: &str = "http://iiif.io/api/image/3/context.json";
pub const PROTOCOL: &str = "http://iiif.io/api/image";
pub const TYPE: &str = "ImageService3";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoDocument {
    #[serde(rename = "@context")]
    pub context: &'static str,
    pub id: String,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub protocol: &'static str,
    pub profile: ComplianceLevel,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_area: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    pub sizes: Vec<SizeEntry>,
    pub tiles: Vec<TileEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_qualities: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_formats: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_features: Vec<&'static str>,
}

impl InfoDocument {
    /// Describes the page and scale constraint addressed by
    /// `identifier_segment` (the raw, still-encoded URI segment).
    ///
    /// The `extra*` lists only name what the computed compliance level
    /// does not already guarantee.
    pub fn build(
        info: &Info,
        identifier_segment: &str,
        config: &InfoConfig,
        formats: Formats,
    ) -> Result<Self> {
        let meta = MetaIdentifier::from_uri(identifier_segment, &config.delimiter)?;
        let (image, full) = resolve_target(info, &meta)?;
        let (width, height) = full.to_pixels();

        let qualities = Qualities::all();
        let level = ComplianceLevel::v3(Features::SUPPORTED_V3, qualities, formats);
        let (level_features, level_qualities, level_formats) = level.v3_guaranteed();

        Ok(Self {
            context: CONTEXT,
            id: format!("{}/{}", config.base_uri, identifier_segment),
            type_: TYPE,
            protocol: PROTOCOL,
            profile: level,
            width,
            height,
            max_area: config.max_pixels,
            max_width: config
                .max_scale
                .map(|s| (full.width() * s).floor() as u32),
            max_height: config
                .max_scale
                .map(|s| (full.height() * s).floor() as u32),
            sizes: sizes(full, config),
            tiles: vec![tiles(image, meta.scale_constraint(), config)],
            extra_qualities: qualities.difference(level_qualities).names(),
            extra_formats: formats.difference(level_formats).names(),
            extra_features: Features::SUPPORTED_V3.difference(level_features).names(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| IiifError::internal_panic(format!("info.json serialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{InfoImage, Orientation};
    use crate::ops::OutputFormat;

    fn rotated_info() -> Info {
        Info::new(
            "jpeg",
            vec![InfoImage {
                width: 4000,
                height: 3000,
                tile_width: 256,
                tile_height: 256,
                orientation: Orientation::Rotate90,
            }],
        )
    }

    #[test]
    fn test_document_shape() {
        let formats: Formats = [OutputFormat::Jpg, OutputFormat::Png, OutputFormat::Webp]
            .into_iter()
            .collect();
        let doc =
            InfoDocument::build(&rotated_info(), "map", &InfoConfig::default(), formats).unwrap();
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["@context"], CONTEXT);
        assert_eq!(json["id"], "http://localhost/iiif/map");
        assert_eq!(json["type"], "ImageService3");
        assert_eq!(json["profile"], "level2");
        // orientation swaps the axes
        assert_eq!(json["width"], 3000);
        assert_eq!(json["height"], 4000);
        assert_eq!(json["extraFormats"], serde_json::json!(["webp"]));
        assert_eq!(
            json["extraQualities"],
            serde_json::json!(["bitonal", "color", "gray"])
        );
        assert!(json["extraFeatures"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("mirroring")));
        assert!(json.get("maxArea").is_none());
        assert_eq!(json["tiles"][0]["width"], 512);
    }

    #[test]
    fn test_max_scale_limits() {
        let config = InfoConfig {
            max_pixels: Some(1_000_000),
            max_scale: Some(1.0),
            ..InfoConfig::default()
        };
        let doc = InfoDocument::build(&rotated_info(), "map", &config, Formats::JPG).unwrap();
        assert_eq!(doc.profile, ComplianceLevel::Level1);
        assert_eq!(doc.max_area, Some(1_000_000));
        assert_eq!(doc.max_width, Some(3000));
        assert_eq!(doc.max_height, Some(4000));
        assert!(doc.extra_formats.is_empty());
        assert!(doc
            .sizes
            .iter()
            .all(|s| u64::from(s.width) * u64::from(s.height) <= 1_000_000));
    }
}
