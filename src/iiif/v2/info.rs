// src/iiif/v2/info.rs
//
// Image API 2.1 information document (info.json).

use crate::error::Result;
use crate::iiif::compliance::{ComplianceLevel, Features, Formats, Qualities};
use crate::info::{resolve_target, sizes, tiles, Info, InfoConfig, SizeEntry, TileEntry};
use crate::ops::MetaIdentifier;
use serde::Serialize;

pub const CONTEXT: &str = "http://iiif.io/api/image/2/context.json";
pub const PROTOCOL: &str = "http://iiif.io/api/image";

/// The second `profile` entry, describing support beyond the level URI.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescription {
    pub formats: Vec<&'static str>,
    pub qualities: Vec<&'static str>,
    pub supports: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_area: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProfileEntry {
    Uri(String),
    Description(ProfileDescription),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfoDocument {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@id")]
    pub id: String,
    pub protocol: &'static str,
    pub width: u32,
    pub height: u32,
    pub sizes: Vec<SizeEntry>,
    pub tiles: Vec<TileEntry>,
    pub profile: Vec<ProfileEntry>,
}

impl InfoDocument {
    /// Describes the page and scale constraint addressed by
    /// `identifier_segment` (the raw, still-encoded URI segment).
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
        let level = ComplianceLevel::v2(Features::SUPPORTED_V2, qualities, formats);
        let description = ProfileDescription {
            formats: formats.names(),
            qualities: qualities.names(),
            supports: Features::SUPPORTED_V2.names(),
            max_area: config.max_pixels,
            max_width: config
                .max_scale
                .map(|s| (full.width() * s).floor() as u32),
            max_height: config
                .max_scale
                .map(|s| (full.height() * s).floor() as u32),
        };

        Ok(Self {
            context: CONTEXT,
            id: format!("{}/{}", config.base_uri, identifier_segment),
            protocol: PROTOCOL,
            width,
            height,
            sizes: sizes(full, config),
            tiles: vec![tiles(image, meta.scale_constraint(), config)],
            profile: vec![
                ProfileEntry::Uri(level.v2_uri()),
                ProfileEntry::Description(description),
            ],
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            crate::error::IiifError::internal_panic(format!("info.json serialization failed: {e}"))
        })
    }
}
