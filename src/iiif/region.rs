// src/iiif/region.rs

use super::{format_decimal, parse_decimal};
use crate::error::{IiifError, Result};
use crate::geometry::{ScaleConstraint, Size};
use crate::ops::Crop;
use std::fmt;

/// Region path segment. Percent values are kept as written (0-100).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Region {
    Full,
    Square,
    Pixels {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Percent {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl Region {
    /// `full` | `square` | `x,y,w,h` | `pct:x,y,w,h`
    pub fn from_uri(value: &str) -> Result<Self> {
        match value {
            "full" => return Ok(Region::Full),
            "square" => return Ok(Region::Square),
            _ => {}
        }
        let (percent, body) = match value.strip_prefix("pct:") {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let parts: Vec<&str> = body.split(',').collect();
        if parts.len() != 4 {
            return Err(IiifError::invalid_argument(
                "region",
                value.to_string(),
                "expected full, square, x,y,w,h or pct:x,y,w,h",
            ));
        }
        let x = parse_decimal("region x", parts[0])?;
        let y = parse_decimal("region y", parts[1])?;
        let width = parse_decimal("region width", parts[2])?;
        let height = parse_decimal("region height", parts[3])?;
        if x < 0.0 || y < 0.0 {
            return Err(IiifError::invalid_argument(
                "region",
                value.to_string(),
                "x and y must be greater than or equal to 0",
            ));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(IiifError::invalid_argument(
                "region",
                value.to_string(),
                "width and height must be greater than 0",
            ));
        }
        Ok(if percent {
            Region::Percent {
                x,
                y,
                width,
                height,
            }
        } else {
            Region::Pixels {
                x,
                y,
                width,
                height,
            }
        })
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Region::Full)
    }

    /// Crop for the operation list; `None` for `full`.
    pub fn to_crop(&self) -> Result<Option<Crop>> {
        Ok(match *self {
            Region::Full => None,
            Region::Square => Some(Crop::ToSquare),
            Region::Pixels {
                x,
                y,
                width,
                height,
            } => Some(Crop::by_pixels(x, y, width, height)?),
            Region::Percent {
                x,
                y,
                width,
                height,
            } => Some(Crop::by_percent(
                x / 100.0,
                y / 100.0,
                width / 100.0,
                height / 100.0,
            )?),
        })
    }

    /// Absolute integer form relative to `full_size` (the size the client
    /// sees, i.e. after any scale constraint). A region covering the whole
    /// image canonicalizes to `full`.
    pub fn to_canonical_string(&self, full_size: Size) -> Result<String> {
        let Some(crop) = self.to_crop()? else {
            return Ok("full".to_string());
        };
        let rect = crop.rectangle(full_size, ScaleConstraint::identity());
        let (x, y, w, h) = rect.to_int_tuple();
        if x == 0
            && y == 0
            && w == full_size.int_width() as i64
            && h == full_size.int_height() as i64
        {
            return Ok("full".to_string());
        }
        Ok(format!("{x},{y},{w},{h}"))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Region::Full => f.write_str("full"),
            Region::Square => f.write_str("square"),
            Region::Pixels {
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "{},{},{},{}",
                format_decimal(x),
                format_decimal(y),
                format_decimal(width),
                format_decimal(height)
            ),
            Region::Percent {
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "pct:{},{},{},{}",
                format_decimal(x),
                format_decimal(y),
                format_decimal(width),
                format_decimal(height)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(Region::from_uri("full").unwrap(), Region::Full);
        assert_eq!(Region::from_uri("square").unwrap(), Region::Square);
    }

    #[test]
    fn test_pixels_and_percent() {
        assert_eq!(
            Region::from_uri("10,20,30,40").unwrap(),
            Region::Pixels {
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 40.0
            }
        );
        assert_eq!(
            Region::from_uri("pct:1.5,2,50,50").unwrap().to_string(),
            "pct:1.5,2,50,50"
        );
    }

    #[test]
    fn test_display_strips_trailing_zeros() {
        assert_eq!(
            Region::from_uri("10.50,0.0,30,40.000").unwrap().to_string(),
            "10.5,0,30,40"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "", "FULL", "1,2,3", "1,2,3,4,5", "a,b,c,d", "-1,0,10,10", "0,0,0,10", "pct:0,0,10",
            "pct:0,0,-5,5",
        ] {
            let err = Region::from_uri(bad).unwrap_err();
            assert_eq!(err.http_status(), 400, "{bad}");
        }
    }

    #[test]
    fn test_canonical_percent() {
        let full = Size::new(64.0, 56.0);
        let region = Region::from_uri("pct:50,50,50,50").unwrap();
        assert_eq!(region.to_canonical_string(full).unwrap(), "32,28,32,28");
    }

    #[test]
    fn test_canonical_clips_and_detects_full() {
        let full = Size::new(1000.0, 800.0);
        assert_eq!(
            Region::from_uri("900,700,500,500")
                .unwrap()
                .to_canonical_string(full)
                .unwrap(),
            "900,700,100,100"
        );
        assert_eq!(
            Region::from_uri("0,0,1000,800")
                .unwrap()
                .to_canonical_string(full)
                .unwrap(),
            "full"
        );
        assert_eq!(
            Region::Square.to_canonical_string(full).unwrap(),
            "100,0,800,800"
        );
    }
}
