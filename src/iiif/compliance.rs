// src/iiif/compliance.rs
//
// Compliance levels are decided by set containment: a service is at level N
// when it supports every feature, quality and format level N requires.

use crate::ops::OutputFormat;
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

bitflags! {
    /// IIIF service features.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Features: u32 {
        const BASE_URI_REDIRECT = 1 << 0;
        const CANONICAL_LINK_HEADER = 1 << 1;
        const CORS = 1 << 2;
        const JSONLD_MEDIA_TYPE = 1 << 3;
        const MIRRORING = 1 << 4;
        const PROFILE_LINK_HEADER = 1 << 5;
        const REGION_BY_PCT = 1 << 6;
        const REGION_BY_PX = 1 << 7;
        const REGION_SQUARE = 1 << 8;
        const ROTATION_ARBITRARY = 1 << 9;
        const ROTATION_BY_90S = 1 << 10;
        const SIZE_ABOVE_FULL = 1 << 11;
        const SIZE_BY_CONFINED_WH = 1 << 12;
        const SIZE_BY_DISTORTED_WH = 1 << 13;
        const SIZE_BY_FORCED_WH = 1 << 14;
        const SIZE_BY_H = 1 << 15;
        const SIZE_BY_PCT = 1 << 16;
        const SIZE_BY_W = 1 << 17;
        const SIZE_BY_WH = 1 << 18;
        const SIZE_BY_WH_LISTED = 1 << 19;
        const SIZE_UPSCALING = 1 << 20;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Qualities: u8 {
        const BITONAL = 1 << 0;
        const COLOR = 1 << 1;
        const DEFAULT = 1 << 2;
        const GRAY = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Formats: u8 {
        const JPG = 1 << 0;
        const TIF = 1 << 1;
        const PNG = 1 << 2;
        const GIF = 1 << 3;
        const JP2 = 1 << 4;
        const PDF = 1 << 5;
        const WEBP = 1 << 6;
    }
}

const FEATURE_NAMES: [(Features, &str); 21] = [
    (Features::BASE_URI_REDIRECT, "baseUriRedirect"),
    (Features::CANONICAL_LINK_HEADER, "canonicalLinkHeader"),
    (Features::CORS, "cors"),
    (Features::JSONLD_MEDIA_TYPE, "jsonldMediaType"),
    (Features::MIRRORING, "mirroring"),
    (Features::PROFILE_LINK_HEADER, "profileLinkHeader"),
    (Features::REGION_BY_PCT, "regionByPct"),
    (Features::REGION_BY_PX, "regionByPx"),
    (Features::REGION_SQUARE, "regionSquare"),
    (Features::ROTATION_ARBITRARY, "rotationArbitrary"),
    (Features::ROTATION_BY_90S, "rotationBy90s"),
    (Features::SIZE_ABOVE_FULL, "sizeAboveFull"),
    (Features::SIZE_BY_CONFINED_WH, "sizeByConfinedWh"),
    (Features::SIZE_BY_DISTORTED_WH, "sizeByDistortedWh"),
    (Features::SIZE_BY_FORCED_WH, "sizeByForcedWh"),
    (Features::SIZE_BY_H, "sizeByH"),
    (Features::SIZE_BY_PCT, "sizeByPct"),
    (Features::SIZE_BY_W, "sizeByW"),
    (Features::SIZE_BY_WH, "sizeByWh"),
    (Features::SIZE_BY_WH_LISTED, "sizeByWhListed"),
    (Features::SIZE_UPSCALING, "sizeUpscaling"),
];

impl Features {
    /// Everything this crate implements for API 2.1.
    pub const SUPPORTED_V2: Features = Features::BASE_URI_REDIRECT
        .union(Features::CANONICAL_LINK_HEADER)
        .union(Features::CORS)
        .union(Features::JSONLD_MEDIA_TYPE)
        .union(Features::MIRRORING)
        .union(Features::PROFILE_LINK_HEADER)
        .union(Features::REGION_BY_PCT)
        .union(Features::REGION_BY_PX)
        .union(Features::REGION_SQUARE)
        .union(Features::ROTATION_ARBITRARY)
        .union(Features::ROTATION_BY_90S)
        .union(Features::SIZE_ABOVE_FULL)
        .union(Features::SIZE_BY_CONFINED_WH)
        .union(Features::SIZE_BY_DISTORTED_WH)
        .union(Features::SIZE_BY_FORCED_WH)
        .union(Features::SIZE_BY_H)
        .union(Features::SIZE_BY_PCT)
        .union(Features::SIZE_BY_W)
        .union(Features::SIZE_BY_WH);

    /// Everything this crate implements for API 3.0.
    pub const SUPPORTED_V3: Features = Features::BASE_URI_REDIRECT
        .union(Features::CANONICAL_LINK_HEADER)
        .union(Features::CORS)
        .union(Features::JSONLD_MEDIA_TYPE)
        .union(Features::MIRRORING)
        .union(Features::PROFILE_LINK_HEADER)
        .union(Features::REGION_BY_PCT)
        .union(Features::REGION_BY_PX)
        .union(Features::REGION_SQUARE)
        .union(Features::ROTATION_ARBITRARY)
        .union(Features::ROTATION_BY_90S)
        .union(Features::SIZE_BY_CONFINED_WH)
        .union(Features::SIZE_BY_H)
        .union(Features::SIZE_BY_PCT)
        .union(Features::SIZE_BY_W)
        .union(Features::SIZE_BY_WH)
        .union(Features::SIZE_UPSCALING);

    /// IIIF names (`regionByPx`, ...) in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        FEATURE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Qualities {
    pub fn names(&self) -> Vec<&'static str> {
        [
            (Qualities::BITONAL, "bitonal"),
            (Qualities::COLOR, "color"),
            (Qualities::DEFAULT, "default"),
            (Qualities::GRAY, "gray"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl Formats {
    pub fn from_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Jpg => Formats::JPG,
            OutputFormat::Tif => Formats::TIF,
            OutputFormat::Png => Formats::PNG,
            OutputFormat::Gif => Formats::GIF,
            OutputFormat::Jp2 => Formats::JP2,
            OutputFormat::Pdf => Formats::PDF,
            OutputFormat::Webp => Formats::WEBP,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        OutputFormat::ALL
            .into_iter()
            .filter(|f| self.contains(Formats::from_format(*f)))
            .map(|f| f.extension())
            .collect()
    }
}

impl FromIterator<OutputFormat> for Formats {
    fn from_iter<I: IntoIterator<Item = OutputFormat>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Formats::empty(), |acc, f| acc | Formats::from_format(f))
    }
}

struct LevelRequirements {
    features: Features,
    qualities: Qualities,
    formats: Formats,
}

impl LevelRequirements {
    fn satisfied_by(&self, features: Features, qualities: Qualities, formats: Formats) -> bool {
        features.contains(self.features)
            && qualities.contains(self.qualities)
            && formats.contains(self.formats)
    }
}

const V2_LEVEL1: LevelRequirements = LevelRequirements {
    features: Features::BASE_URI_REDIRECT
        .union(Features::CORS)
        .union(Features::JSONLD_MEDIA_TYPE)
        .union(Features::REGION_BY_PX)
        .union(Features::SIZE_BY_H)
        .union(Features::SIZE_BY_PCT)
        .union(Features::SIZE_BY_W),
    qualities: Qualities::DEFAULT,
    formats: Formats::JPG,
};

const V2_LEVEL2: LevelRequirements = LevelRequirements {
    features: V2_LEVEL1
        .features
        .union(Features::REGION_BY_PCT)
        .union(Features::ROTATION_BY_90S)
        .union(Features::SIZE_BY_CONFINED_WH)
        .union(Features::SIZE_BY_DISTORTED_WH)
        .union(Features::SIZE_BY_WH),
    qualities: Qualities::BITONAL
        .union(Qualities::COLOR)
        .union(Qualities::DEFAULT)
        .union(Qualities::GRAY),
    formats: Formats::JPG.union(Formats::PNG),
};

const V3_LEVEL1: LevelRequirements = LevelRequirements {
    features: Features::BASE_URI_REDIRECT
        .union(Features::CORS)
        .union(Features::JSONLD_MEDIA_TYPE)
        .union(Features::REGION_BY_PX)
        .union(Features::REGION_SQUARE)
        .union(Features::SIZE_BY_H)
        .union(Features::SIZE_BY_W)
        .union(Features::SIZE_BY_WH),
    qualities: Qualities::DEFAULT,
    formats: Formats::JPG,
};

const V3_LEVEL2: LevelRequirements = LevelRequirements {
    features: V3_LEVEL1
        .features
        .union(Features::REGION_BY_PCT)
        .union(Features::ROTATION_BY_90S)
        .union(Features::SIZE_BY_CONFINED_WH)
        .union(Features::SIZE_BY_PCT),
    qualities: Qualities::DEFAULT,
    formats: Formats::JPG.union(Formats::PNG),
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ComplianceLevel {
    #[serde(rename = "level0")]
    Level0,
    #[serde(rename = "level1")]
    Level1,
    #[serde(rename = "level2")]
    Level2,
}

impl ComplianceLevel {
    pub fn v2(features: Features, qualities: Qualities, formats: Formats) -> Self {
        Self::decide(&V2_LEVEL1, &V2_LEVEL2, features, qualities, formats)
    }

    pub fn v3(features: Features, qualities: Qualities, formats: Formats) -> Self {
        Self::decide(&V3_LEVEL1, &V3_LEVEL2, features, qualities, formats)
    }

    fn decide(
        level1: &LevelRequirements,
        level2: &LevelRequirements,
        features: Features,
        qualities: Qualities,
        formats: Formats,
    ) -> Self {
        if level2.satisfied_by(features, qualities, formats) {
            ComplianceLevel::Level2
        } else if level1.satisfied_by(features, qualities, formats) {
            ComplianceLevel::Level1
        } else {
            ComplianceLevel::Level0
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComplianceLevel::Level0 => "level0",
            ComplianceLevel::Level1 => "level1",
            ComplianceLevel::Level2 => "level2",
        }
    }

    /// Profile URI used by 2.1 info documents.
    pub fn v2_uri(&self) -> String {
        format!("http://iiif.io/api/image/2/{}.json", self.name())
    }

    /// The features, qualities and formats this level guarantees, which
    /// info documents leave out of their "extra" lists.
    pub fn v3_guaranteed(&self) -> (Features, Qualities, Formats) {
        match self {
            ComplianceLevel::Level0 => (Features::empty(), Qualities::DEFAULT, Formats::JPG),
            ComplianceLevel::Level1 => (V3_LEVEL1.features, V3_LEVEL1.qualities, V3_LEVEL1.formats),
            ComplianceLevel::Level2 => (V3_LEVEL2.features, V3_LEVEL2.qualities, V3_LEVEL2.formats),
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
