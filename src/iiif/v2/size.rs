// src/iiif/v2/size.rs

use crate::error::{IiifError, Result};
use crate::geometry::{ScaleConstraint, Size as Dimensions};
use crate::iiif::{format_decimal, parse_decimal, parse_dimension};
use crate::ops::{Scale, ScaleMode};
use std::fmt;

/// Size path segment, API 2.1 grammar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Size {
    Full,
    Max,
    /// `w,`
    Width(u32),
    /// `,h`
    Height(u32),
    /// `pct:n`, n as written
    Percent(f64),
    /// `w,h`
    Exact(u32, u32),
    /// `!w,h`
    BestFit(u32, u32),
}

impl Size {
    pub fn from_uri(value: &str) -> Result<Self> {
        match value {
            "full" => return Ok(Size::Full),
            "max" => return Ok(Size::Max),
            _ => {}
        }
        if let Some(pct) = value.strip_prefix("pct:") {
            let percent = parse_decimal("size percent", pct)?;
            if percent <= 0.0 {
                return Err(IiifError::invalid_argument(
                    "size percent",
                    pct.to_string(),
                    "must be greater than 0",
                ));
            }
            return Ok(Size::Percent(percent));
        }
        let (best_fit, body) = match value.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let (w, h) = body.split_once(',').ok_or_else(|| {
            IiifError::invalid_argument(
                "size",
                value.to_string(),
                "expected full, max, w,, ,h, pct:n, w,h or !w,h",
            )
        })?;
        match (w.is_empty(), h.is_empty(), best_fit) {
            (false, true, false) => Ok(Size::Width(parse_dimension("size width", w)?)),
            (true, false, false) => Ok(Size::Height(parse_dimension("size height", h)?)),
            (false, false, false) => Ok(Size::Exact(
                parse_dimension("size width", w)?,
                parse_dimension("size height", h)?,
            )),
            (false, false, true) => Ok(Size::BestFit(
                parse_dimension("size width", w)?,
                parse_dimension("size height", h)?,
            )),
            _ => Err(IiifError::invalid_argument(
                "size",
                value.to_string(),
                "expected full, max, w,, ,h, pct:n, w,h or !w,h",
            )),
        }
    }

    /// `None` for `full` and `max`.
    pub fn to_scale(&self) -> Result<Option<Scale>> {
        Ok(match *self {
            Size::Full | Size::Max => None,
            Size::Width(w) => Some(Scale::by_pixels(Some(w), None, ScaleMode::AspectFitWidth)?),
            Size::Height(h) => Some(Scale::by_pixels(None, Some(h), ScaleMode::AspectFitHeight)?),
            Size::Percent(p) => Some(Scale::by_percent(p / 100.0)?),
            Size::Exact(w, h) => Some(Scale::by_pixels(Some(w), Some(h), ScaleMode::NonAspectFill)?),
            Size::BestFit(w, h) => {
                Some(Scale::by_pixels(Some(w), Some(h), ScaleMode::AspectFitInside)?)
            }
        })
    }

    /// 2.1 canonical form against the (virtual) region size: `full` when
    /// unscaled, `w,` when the aspect ratio is kept, otherwise `w,h`.
    pub fn to_canonical_string(&self, region_size: Dimensions) -> Result<String> {
        let Some(scale) = self.to_scale()? else {
            return Ok("full".to_string());
        };
        let out = scale.resulting_size(region_size, ScaleConstraint::identity());
        if out.same_pixels(&region_size) {
            return Ok("full".to_string());
        }
        Ok(match self {
            Size::Exact(..) => format!("{},{}", out.int_width(), out.int_height()),
            _ => format!("{},", out.int_width()),
        })
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Size::Full => f.write_str("full"),
            Size::Max => f.write_str("max"),
            Size::Width(w) => write!(f, "{w},"),
            Size::Height(h) => write!(f, ",{h}"),
            Size::Percent(p) => write!(f, "pct:{}", format_decimal(p)),
            Size::Exact(w, h) => write!(f, "{w},{h}"),
            Size::BestFit(w, h) => write!(f, "!{w},{h}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar() {
        assert_eq!(Size::from_uri("full").unwrap(), Size::Full);
        assert_eq!(Size::from_uri("max").unwrap(), Size::Max);
        assert_eq!(Size::from_uri("150,").unwrap(), Size::Width(150));
        assert_eq!(Size::from_uri(",150").unwrap(), Size::Height(150));
        assert_eq!(Size::from_uri("pct:50").unwrap(), Size::Percent(50.0));
        assert_eq!(Size::from_uri("150,75").unwrap(), Size::Exact(150, 75));
        assert_eq!(Size::from_uri("!150,75").unwrap(), Size::BestFit(150, 75));
        assert_eq!(Size::from_uri("pct:150").unwrap(), Size::Percent(150.0));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "", ",", "0,", ",0", "pct:0", "pct:-5", "!150,", "!,150", "a,b", "150", "^max",
            "1.5,",
        ] {
            assert!(Size::from_uri(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["full", "max", "150,", ",150", "pct:12.5", "150,75", "!150,75"] {
            assert_eq!(Size::from_uri(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_canonical() {
        let region = Dimensions::new(1000.0, 800.0);
        assert_eq!(
            Size::Full.to_canonical_string(region).unwrap(),
            "full"
        );
        assert_eq!(
            Size::Percent(50.0).to_canonical_string(region).unwrap(),
            "500,"
        );
        assert_eq!(
            Size::Height(400).to_canonical_string(region).unwrap(),
            "500,"
        );
        assert_eq!(
            Size::Exact(100, 100).to_canonical_string(region).unwrap(),
            "100,100"
        );
        assert_eq!(
            Size::Width(1000).to_canonical_string(region).unwrap(),
            "full"
        );
    }
}
