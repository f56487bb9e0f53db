// src/iiif.rs
//
// IIIF Image API URI grammar: path segment parsers, per-version parameters,
// canonical forms, compliance levels and info documents.

pub mod compliance;
pub mod context;
pub mod format;
pub mod quality;
pub mod region;
pub mod rotation;
pub mod v2;
pub mod v3;

pub use compliance::{ComplianceLevel, Features, Formats, Qualities};
pub use context::OperationListContext;
pub use quality::Quality;
pub use region::Region;
pub use rotation::Rotation;

use crate::error::{IiifError, Result};
use crate::geometry::{ScaleConstraint, Size};
use crate::ops::{
    Encode, MetaIdentifier, Operation, OperationList, OutputFormat, Rotate,
    Scale, Transpose,
};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Shortest decimal form: `15.0` → `15`, `15.50` → `15.5`.
pub fn format_decimal(value: f64) -> String {
    if value == 0.0 {
        // also normalizes -0
        return "0".to_string();
    }
    format!("{value}")
}

/// Parses a decimal URI token. Rejects exponents, signs other than a
/// leading `-`, and non-finite values.
pub(crate) fn parse_decimal(name: &'static str, token: &str) -> Result<f64> {
    let valid = !token.is_empty()
        && token
            .trim_start_matches('-')
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'.')
        && token.bytes().filter(|b| *b == b'.').count() <= 1
        && token.bytes().any(|b| b.is_ascii_digit());
    let value = if valid { token.parse::<f64>().ok() } else { None };
    value.filter(|v| v.is_finite()).ok_or_else(|| {
        IiifError::invalid_argument(name, token.to_string(), "is not a valid number")
    })
}

/// Parses a positive integer URI token.
pub(crate) fn parse_dimension(name: &'static str, token: &str) -> Result<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IiifError::invalid_argument(
            name,
            token.to_string(),
            "must be a positive integer",
        ));
    }
    let value: u32 = token.parse().map_err(|_| {
        IiifError::invalid_argument(name, token.to_string(), "is too large")
    })?;
    if value == 0 {
        return Err(IiifError::invalid_argument(
            name,
            token.to_string(),
            "must be greater than 0",
        ));
    }
    Ok(value)
}

/// Parses `a=b&c=d` into a sorted map. Keys without `=` map to "".
fn parse_query(query: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(
            crate::ops::identifier::percent_decode(key)?,
            crate::ops::identifier::percent_decode(value)?,
        );
    }
    Ok(map)
}

/// Splits `{id}/{region}/{size}/{rotation}/{quality}.{format}?{query}` into
/// its raw components. The identifier may itself contain slashes.
fn split_uri(path: &str) -> Result<RawUri<'_>> {
    let invalid = || {
        IiifError::invalid_argument(
            "image request",
            path.to_string(),
            "expected {identifier}/{region}/{size}/{rotation}/{quality}.{format}",
        )
    };
    let (path_part, query) = match path.split_once('?') {
        Some((p, q)) => (p, q),
        None => (path, ""),
    };
    let trimmed = path_part.trim_start_matches('/');
    let mut segments = trimmed.rsplitn(5, '/');
    let filename = segments.next().ok_or_else(invalid)?;
    let rotation = segments.next().ok_or_else(invalid)?;
    let size = segments.next().ok_or_else(invalid)?;
    let region = segments.next().ok_or_else(invalid)?;
    let identifier = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let (quality, format) = filename.rsplit_once('.').ok_or_else(invalid)?;
    Ok(RawUri {
        identifier,
        region,
        size,
        rotation,
        quality,
        format,
        query,
    })
}

struct RawUri<'a> {
    pub identifier: &'a str,
    pub region: &'a str,
    pub size: &'a str,
    pub rotation: &'a str,
    pub quality: &'a str,
    pub format: &'a str,
    pub query: &'a str,
}

/// The size segment of one API version; everything else in a request is
/// shared between versions.
pub trait SizeSyntax: Clone + fmt::Debug + fmt::Display + PartialEq {
    /// Size assumed when a builder is given none.
    const DEFAULT: &'static str;

    fn parse_uri(value: &str) -> Result<Self>;

    /// The scale operation this size asks for, `None` for the full region.
    fn scale(&self) -> Result<Option<Scale>>;

    /// Whether the size defers to the server's maximum.
    fn is_max_size(&self) -> bool;

    /// Whether that maximum may exceed the full size.
    fn max_upscaling(&self) -> bool;

    fn canonical_form(&self, region_size: Size) -> Result<String>;
}

/// A parsed image request, generic over the version's size grammar.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters<S> {
    identifier: String,
    region: Region,
    size: S,
    rotation: Rotation,
    quality: Quality,
    format: OutputFormat,
    query: BTreeMap<String, String>,
}

impl<S: SizeSyntax> Parameters<S> {
    pub fn builder() -> ParametersBuilder<S> {
        ParametersBuilder::default()
    }

    /// Parses `{identifier}/{region}/{size}/{rotation}/{quality}.{format}`
    /// with an optional `?query`.
    pub fn from_uri(path: &str) -> Result<Self> {
        let raw = split_uri(path)?;
        ParametersBuilder::default()
            .identifier(raw.identifier)
            .region(raw.region)
            .size(raw.size)
            .rotation(raw.rotation)
            .quality(raw.quality)
            .format(raw.format)
            .query(raw.query)
            .build()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn size(&self) -> &S {
        &self.size
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Operations in pipeline order, with the context's server-side
    /// additions (sharpening, redactions, overlay, encode options).
    pub fn to_operation_list(&self, ctx: &OperationListContext) -> Result<OperationList> {
        let meta = MetaIdentifier::from_uri(&self.identifier, &ctx.delimiter)?;
        let mut list = OperationList::new(meta);

        if let Some(crop) = self.region.to_crop()? {
            list.add(Operation::Crop(crop))?;
        }

        let scale = match self.size.scale()? {
            Some(scale) => Some(scale),
            None if self.size.is_max_size()
                && (ctx.max_pixels.is_some() || ctx.max_scale.is_some()) =>
            {
                Some(
                    Scale::to_max(ctx.max_pixels, ctx.max_scale)?
                        .with_upscaling(self.size.max_upscaling()),
                )
            }
            None => None,
        };
        if let Some(mut scale) = scale {
            if let Some(filter) = ctx.scale_filter {
                scale = scale.with_filter(filter);
            }
            list.add(Operation::Scale(scale))?;
        }

        if self.rotation.is_mirrored() {
            list.add(Operation::Transpose(Transpose::Horizontal))?;
        }
        if self.rotation.degrees() != 0.0 {
            list.add(Operation::Rotate(Rotate::new(self.rotation.degrees())?))?;
        }
        if let Some(transform) = self.quality.to_color_transform() {
            list.add(Operation::ColorTransform(transform))?;
        }
        if let Some(sharpen) = ctx.sharpen.filter(|s| s.has_effect()) {
            list.add(Operation::Sharpen(sharpen.validated()?))?;
        }
        for redaction in &ctx.redactions {
            list.add(Operation::Redaction(*redaction))?;
        }
        if let Some(overlay) = &ctx.overlay {
            list.add(Operation::Overlay(overlay.clone()))?;
        }
        list.add(Operation::Encode(Encode::with_options(
            self.format,
            ctx.encode.clone(),
        )?))?;

        for (key, value) in &self.query {
            list.set_option(key.clone(), value.clone())?;
        }
        Ok(list)
    }

    /// Canonical request path relative to `full_size`, the
    /// orientation-corrected full size of the source.
    pub fn to_canonical_string(&self, full_size: Size, delimiter: &str) -> Result<String> {
        let meta = MetaIdentifier::from_uri(&self.identifier, delimiter)?;
        let virtual_full = meta.scale_constraint().constrained_size(full_size);
        let region_size = virtual_region_size(&self.region, virtual_full)?;
        Ok(format!(
            "{}/{}/{}/{}/{}.{}",
            self.identifier,
            self.region.to_canonical_string(virtual_full)?,
            self.size.canonical_form(region_size)?,
            self.rotation.to_canonical_string(),
            self.quality,
            self.format
        ))
    }
}

impl<S: SizeSyntax> fmt::Display for Parameters<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}.{}",
            self.identifier, self.region, self.size, self.rotation, self.quality, self.format
        )
    }
}

/// Accumulates raw URI tokens; everything is parsed and validated in
/// `build()`.
#[derive(Clone, Debug)]
pub struct ParametersBuilder<S> {
    identifier: Option<String>,
    region: Option<String>,
    size: Option<String>,
    rotation: Option<String>,
    quality: Option<String>,
    format: Option<String>,
    query: Option<String>,
    syntax: PhantomData<fn() -> S>,
}

impl<S> Default for ParametersBuilder<S> {
    fn default() -> Self {
        Self {
            identifier: None,
            region: None,
            size: None,
            rotation: None,
            quality: None,
            format: None,
            query: None,
            syntax: PhantomData,
        }
    }
}

impl<S: SizeSyntax> ParametersBuilder<S> {
    pub fn identifier(mut self, value: impl Into<String>) -> Self {
        self.identifier = Some(value.into());
        self
    }

    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    pub fn size(mut self, value: impl Into<String>) -> Self {
        self.size = Some(value.into());
        self
    }

    pub fn rotation(mut self, value: impl Into<String>) -> Self {
        self.rotation = Some(value.into());
        self
    }

    pub fn quality(mut self, value: impl Into<String>) -> Self {
        self.quality = Some(value.into());
        self
    }

    pub fn format(mut self, value: impl Into<String>) -> Self {
        self.format = Some(value.into());
        self
    }

    pub fn query(mut self, value: impl Into<String>) -> Self {
        self.query = Some(value.into());
        self
    }

    /// Omitted components default to `full/{S::DEFAULT}/0/default.jpg`.
    pub fn build(self) -> Result<Parameters<S>> {
        let identifier = self
            .identifier
            .filter(|id| !id.is_empty())
            .ok_or_else(|| IiifError::invalid_argument("identifier", "", "is required"))?;
        Ok(Parameters {
            identifier,
            region: Region::from_uri(self.region.as_deref().unwrap_or("full"))?,
            size: S::parse_uri(self.size.as_deref().unwrap_or(S::DEFAULT))?,
            rotation: Rotation::from_uri(self.rotation.as_deref().unwrap_or("0"))?,
            quality: Quality::from_uri(self.quality.as_deref().unwrap_or("default"))?,
            format: format::from_uri(self.format.as_deref().unwrap_or("jpg"))?,
            query: parse_query(self.query.as_deref().unwrap_or(""))?,
        })
    }
}

/// Size of `region` within the scale-constrained full image.
fn virtual_region_size(region: &Region, virtual_full: Size) -> Result<Size> {
    Ok(match region.to_crop()? {
        Some(crop) => crop
            .rectangle(virtual_full, ScaleConstraint::identity())
            .size(),
        None => virtual_full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal_strips_trailing_zeros() {
        assert_eq!(format_decimal(15.0), "15");
        assert_eq!(format_decimal(15.5), "15.5");
        assert_eq!(format_decimal(-0.0), "0");
        assert_eq!(format_decimal(0.25), "0.25");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("x", "12.50").unwrap(), 12.5);
        assert_eq!(parse_decimal("x", "-3").unwrap(), -3.0);
        assert!(parse_decimal("x", "1e3").is_err());
        assert!(parse_decimal("x", "NaN").is_err());
        assert!(parse_decimal("x", ".").is_err());
        assert!(parse_decimal("x", "1.2.3").is_err());
        assert!(parse_decimal("x", "").is_err());
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("w", "640").unwrap(), 640);
        assert!(parse_dimension("w", "0").is_err());
        assert!(parse_dimension("w", "-5").is_err());
        assert!(parse_dimension("w", "99999999999").is_err());
    }

    #[test]
    fn test_split_uri() {
        let raw = split_uri("/prefix/id/full/max/0/default.jpg?a=1").unwrap();
        assert_eq!(raw.identifier, "prefix/id");
        assert_eq!(raw.region, "full");
        assert_eq!(raw.size, "max");
        assert_eq!(raw.rotation, "0");
        assert_eq!(raw.quality, "default");
        assert_eq!(raw.format, "jpg");
        assert_eq!(raw.query, "a=1");
        assert!(split_uri("full/max/0/default.jpg").is_err());
        assert!(split_uri("id/full/max/0/default").is_err());
    }

    #[test]
    fn test_versions_assemble_the_same_pipeline() {
        let ctx = OperationListContext::default();
        let uri = "id/10,10,20,20/pct:50/!90/gray.png?x=1";
        let v2 = v2::Parameters::from_uri(uri)
            .unwrap()
            .to_operation_list(&ctx)
            .unwrap();
        let v3 = v3::Parameters::from_uri(uri)
            .unwrap()
            .to_operation_list(&ctx)
            .unwrap();
        let names = |list: &OperationList| list.iter().map(Operation::name).collect::<Vec<_>>();
        assert_eq!(names(&v2), names(&v3));
        assert_eq!(v2.options(), v3.options());
        assert_eq!(
            v2.resulting_size(Size::new(64.0, 56.0)),
            v3.resulting_size(Size::new(64.0, 56.0))
        );
    }

    #[test]
    fn test_builder_defaults_follow_version() {
        assert_eq!(
            v2::Parameters::builder().identifier("id").build().unwrap().to_string(),
            "id/full/full/0/default.jpg"
        );
        assert_eq!(
            v3::Parameters::builder().identifier("id").build().unwrap().to_string(),
            "id/full/max/0/default.jpg"
        );
    }

    #[test]
    fn test_parse_query() {
        let q = parse_query("b=2&a=x%20y&flag").unwrap();
        assert_eq!(q.get("a").map(String::as_str), Some("x y"));
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert_eq!(q.keys().collect::<Vec<_>>(), ["a", "b", "flag"]);
    }
}
