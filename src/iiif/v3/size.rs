// src/iiif/v3/size.rs

use crate::error::{IiifError, Result};
use crate::geometry::{ScaleConstraint, Size as Dimensions};
use crate::iiif::{format_decimal, parse_decimal, parse_dimension};
use crate::ops::{Scale, ScaleMode};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SizeKind {
    Max,
    Width(u32),
    Height(u32),
    Percent(f64),
    Exact(u32, u32),
    BestFit(u32, u32),
}

/// Size path segment, API 3.0 grammar: every form may carry a `^` prefix
/// permitting output larger than the region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    kind: SizeKind,
    upscaling: bool,
}

const GRAMMAR: &str = "expected [^]max, [^]w,, [^],h, [^]pct:n, [^]w,h or [^]!w,h";

impl Size {
    pub fn new(kind: SizeKind, upscaling: bool) -> Self {
        Self { kind, upscaling }
    }

    pub fn from_uri(value: &str) -> Result<Self> {
        let (upscaling, body) = match value.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let invalid = |reason: &'static str| {
            IiifError::invalid_argument("size", value.to_string(), reason)
        };

        if body == "max" {
            return Ok(Self::new(SizeKind::Max, upscaling));
        }
        if body == "full" {
            return Err(invalid("'full' is not valid in IIIF Image API 3.0; use 'max'"));
        }
        if let Some(pct) = body.strip_prefix("pct:") {
            let percent = parse_decimal("size percent", pct)?;
            if percent <= 0.0 {
                return Err(invalid("percentage must be greater than 0"));
            }
            if percent > 100.0 && !upscaling {
                return Err(invalid("percentage above 100 requires the ^ prefix"));
            }
            return Ok(Self::new(SizeKind::Percent(percent), upscaling));
        }
        let (best_fit, dims) = match body.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let (w, h) = dims.split_once(',').ok_or_else(|| invalid(GRAMMAR))?;
        let kind = match (w.is_empty(), h.is_empty(), best_fit) {
            (false, true, false) => SizeKind::Width(parse_dimension("size width", w)?),
            (true, false, false) => SizeKind::Height(parse_dimension("size height", h)?),
            (false, false, false) => SizeKind::Exact(
                parse_dimension("size width", w)?,
                parse_dimension("size height", h)?,
            ),
            (false, false, true) => SizeKind::BestFit(
                parse_dimension("size width", w)?,
                parse_dimension("size height", h)?,
            ),
            _ => return Err(invalid(GRAMMAR)),
        };
        Ok(Self::new(kind, upscaling))
    }

    pub fn kind(&self) -> SizeKind {
        self.kind
    }

    pub fn is_max(&self) -> bool {
        matches!(self.kind, SizeKind::Max)
    }

    /// `w,h`: both dimensions fixed, aspect ratio not preserved.
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, SizeKind::Exact(..))
    }

    pub fn is_upscaling_allowed(&self) -> bool {
        self.upscaling
    }

    /// `None` for `max`; the `max` policy is resolved when the operation
    /// list is assembled.
    pub fn to_scale(&self) -> Result<Option<Scale>> {
        let scale = match self.kind {
            SizeKind::Max => return Ok(None),
            SizeKind::Width(w) => Scale::by_pixels(Some(w), None, ScaleMode::AspectFitWidth)?,
            SizeKind::Height(h) => Scale::by_pixels(None, Some(h), ScaleMode::AspectFitHeight)?,
            SizeKind::Percent(p) => Scale::by_percent(p / 100.0)?,
            SizeKind::Exact(w, h) => Scale::by_pixels(Some(w), Some(h), ScaleMode::NonAspectFill)?,
            SizeKind::BestFit(w, h) => {
                Scale::by_pixels(Some(w), Some(h), ScaleMode::AspectFitInside)?
            }
        };
        Ok(Some(scale.with_upscaling(self.upscaling)))
    }

    /// 3.0 canonical form against the (virtual) region size: `max`, or the
    /// absolute `w,h`, keeping the `^` prefix when it was requested.
    pub fn to_canonical_string(&self, region_size: Dimensions) -> Result<String> {
        let prefix = if self.upscaling { "^" } else { "" };
        let Some(scale) = self.to_scale()? else {
            return Ok(format!("{prefix}max"));
        };
        let out = scale.resulting_size(region_size, ScaleConstraint::identity());
        if !self.upscaling && out.same_pixels(&region_size) {
            return Ok("max".to_string());
        }
        Ok(format!("{prefix}{},{}", out.int_width(), out.int_height()))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.upscaling {
            f.write_str("^")?;
        }
        match self.kind {
            SizeKind::Max => f.write_str("max"),
            SizeKind::Width(w) => write!(f, "{w},"),
            SizeKind::Height(h) => write!(f, ",{h}"),
            SizeKind::Percent(p) => write!(f, "pct:{}", format_decimal(p)),
            SizeKind::Exact(w, h) => write!(f, "{w},{h}"),
            SizeKind::BestFit(w, h) => write!(f, "!{w},{h}"),
        }
    }
}
