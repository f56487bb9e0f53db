// src/ops/scale.rs

use crate::error::{IiifError, Result};
use crate::geometry::{ScaleConstraint, Size, DELTA};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a pixel-based scale fits the requested box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleMode {
    /// `w,` - width fixed, height follows the aspect ratio.
    AspectFitWidth,
    /// `,h` - height fixed, width follows the aspect ratio.
    AspectFitHeight,
    /// `!w,h` - largest size fitting inside the box.
    AspectFitInside,
    /// `w,h` - exact size, aspect ratio ignored.
    NonAspectFill,
}

/// Resampling kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleFilter {
    Box,
    Triangle,
    Hermite,
    Bell,
    BSpline,
    Mitchell,
    CatmullRom,
    Bicubic,
    Lanczos3,
}

impl ScaleFilter {
    pub const ALL: [ScaleFilter; 9] = [
        ScaleFilter::Box,
        ScaleFilter::Triangle,
        ScaleFilter::Hermite,
        ScaleFilter::Bell,
        ScaleFilter::BSpline,
        ScaleFilter::Mitchell,
        ScaleFilter::CatmullRom,
        ScaleFilter::Bicubic,
        ScaleFilter::Lanczos3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScaleFilter::Box => "box",
            ScaleFilter::Triangle => "triangle",
            ScaleFilter::Hermite => "hermite",
            ScaleFilter::Bell => "bell",
            ScaleFilter::BSpline => "bspline",
            ScaleFilter::Mitchell => "mitchell",
            ScaleFilter::CatmullRom => "catmullrom",
            ScaleFilter::Bicubic => "bicubic",
            ScaleFilter::Lanczos3 => "lanczos3",
        }
    }
}

impl FromStr for ScaleFilter {
    type Err = IiifError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        ScaleFilter::ALL
            .into_iter()
            .find(|f| f.name() == normalized)
            .or(match normalized.as_str() {
                "lanczos" => Some(ScaleFilter::Lanczos3),
                "bilinear" => Some(ScaleFilter::Triangle),
                _ => None,
            })
            .ok_or_else(|| {
                IiifError::invalid_argument(
                    "scale filter",
                    s.to_string(),
                    "expected one of box, triangle, hermite, bell, bspline, mitchell, catmullrom, bicubic, lanczos3",
                )
            })
    }
}

impl fmt::Display for ScaleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleKind {
    ByPixels {
        width: Option<u32>,
        height: Option<u32>,
        mode: ScaleMode,
    },
    /// `percent` is a factor (1.0 = 100%).
    ByPercent { percent: f64 },
    /// `max`, bounded by server policy. Unless upscaling is allowed the
    /// result never exceeds the region size.
    ToMax {
        max_pixels: Option<u64>,
        max_scale: Option<f64>,
    },
}

/// Resize request, resolved against the (virtual) region size at execution
/// time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    kind: ScaleKind,
    filter: Option<ScaleFilter>,
    upscaling: bool,
}

impl Scale {
    pub fn by_pixels(width: Option<u32>, height: Option<u32>, mode: ScaleMode) -> Result<Self> {
        let required = |name: &'static str, v: Option<u32>| -> Result<u32> {
            match v {
                Some(0) => Err(IiifError::invalid_argument(
                    name,
                    "0",
                    "must be greater than 0",
                )),
                Some(v) => Ok(v),
                None => Err(IiifError::invalid_argument(
                    name,
                    "",
                    format!("is required by {mode:?}"),
                )),
            }
        };
        match mode {
            ScaleMode::AspectFitWidth => {
                required("scale width", width)?;
            }
            ScaleMode::AspectFitHeight => {
                required("scale height", height)?;
            }
            ScaleMode::AspectFitInside | ScaleMode::NonAspectFill => {
                required("scale width", width)?;
                required("scale height", height)?;
            }
        }
        Ok(Self {
            kind: ScaleKind::ByPixels {
                width,
                height,
                mode,
            },
            filter: None,
            upscaling: true,
        })
    }

    pub fn by_percent(percent: f64) -> Result<Self> {
        if !percent.is_finite() || percent <= 0.0 {
            return Err(IiifError::invalid_argument(
                "scale percent",
                percent.to_string(),
                "must be greater than 0",
            ));
        }
        Ok(Self {
            kind: ScaleKind::ByPercent { percent },
            filter: None,
            upscaling: true,
        })
    }

    pub fn to_max(max_pixels: Option<u64>, max_scale: Option<f64>) -> Result<Self> {
        if let Some(s) = max_scale {
            if !s.is_finite() || s <= 0.0 {
                return Err(IiifError::invalid_argument(
                    "max scale",
                    s.to_string(),
                    "must be greater than 0",
                ));
            }
        }
        Ok(Self {
            kind: ScaleKind::ToMax {
                max_pixels: max_pixels.filter(|p| *p > 0),
                max_scale,
            },
            filter: None,
            upscaling: false,
        })
    }

    /// Whether the request permits output larger than the region (IIIF v3
    /// `^`). Pixel and percent scales default to allowed, `max` to not.
    pub fn with_upscaling(mut self, allowed: bool) -> Self {
        self.upscaling = allowed;
        self
    }

    pub fn allows_upscaling(&self) -> bool {
        self.upscaling
    }

    pub fn with_filter(mut self, filter: ScaleFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn kind(&self) -> &ScaleKind {
        &self.kind
    }

    pub fn filter(&self) -> Option<ScaleFilter> {
        self.filter
    }

    /// Output size for a region of `region_size` full-resolution pixels.
    ///
    /// The client addresses the scale-constrained image, so the region is
    /// first reduced by `sc` before the requested box is fitted to it.
    pub fn resulting_size(&self, region_size: Size, sc: ScaleConstraint) -> Size {
        let virt = sc.constrained_size(region_size);
        if virt.is_empty() {
            return virt;
        }
        match self.kind {
            ScaleKind::ByPixels {
                width,
                height,
                mode,
            } => {
                let w = width.unwrap_or(0) as f64;
                let h = height.unwrap_or(0) as f64;
                match mode {
                    // the derived side is clamped to 1 px for extreme ratios
                    ScaleMode::AspectFitWidth => {
                        Size::new(w, (virt.height() * w / virt.width()).round().max(1.0))
                    }
                    ScaleMode::AspectFitHeight => {
                        Size::new((virt.width() * h / virt.height()).round().max(1.0), h)
                    }
                    ScaleMode::AspectFitInside => {
                        let s = (w / virt.width()).min(h / virt.height());
                        Size::new(
                            (virt.width() * s).round().clamp(1.0, w),
                            (virt.height() * s).round().clamp(1.0, h),
                        )
                    }
                    ScaleMode::NonAspectFill => Size::new(w, h),
                }
            }
            ScaleKind::ByPercent { percent } => virt.scaled(percent),
            ScaleKind::ToMax { .. } => virt.scaled(self.max_scale_for(virt)),
        }
    }

    /// Horizontal and vertical factors mapping full-resolution region pixels
    /// to output pixels.
    pub fn resulting_scales(&self, region_size: Size, sc: ScaleConstraint) -> (f64, f64) {
        if region_size.is_empty() {
            return (1.0, 1.0);
        }
        let out = self.resulting_size(region_size, sc);
        (
            out.width() / region_size.width(),
            out.height() / region_size.height(),
        )
    }

    /// Factor applied to the virtual region by `max`.
    fn max_scale_for(&self, virt: Size) -> f64 {
        match self.kind {
            ScaleKind::ToMax {
                max_pixels,
                max_scale,
            } => {
                let mut s = max_scale.unwrap_or(f64::INFINITY);
                if let Some(px) = max_pixels {
                    let area = virt.area();
                    if area > 0.0 {
                        s = s.min((px as f64 / area).sqrt());
                    }
                }
                if !self.upscaling {
                    s = s.min(1.0);
                }
                if s.is_finite() {
                    s
                } else {
                    1.0
                }
            }
            _ => 1.0,
        }
    }

    /// Whether the output size of `region_size` would differ from the region
    /// itself.
    pub fn has_effect(&self, region_size: Size, sc: ScaleConstraint) -> bool {
        if sc.has_effect() {
            return true;
        }
        match self.kind {
            ScaleKind::ByPercent { percent } => (percent - 1.0).abs() > DELTA,
            _ => !self.resulting_size(region_size, sc).same_pixels(&region_size),
        }
    }

    /// True when the output is larger than the virtual region in either
    /// dimension.
    pub fn is_upscaling(&self, region_size: Size, sc: ScaleConstraint) -> bool {
        let virt = sc.constrained_size(region_size);
        let out = self.resulting_size(region_size, sc);
        out.int_width() > virt.int_width() || out.int_height() > virt.int_height()
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScaleKind::ByPixels {
                width,
                height,
                mode,
            } => {
                let w = width.map(|v| v.to_string()).unwrap_or_default();
                let h = height.map(|v| v.to_string()).unwrap_or_default();
                let prefix = match mode {
                    ScaleMode::AspectFitInside => "!",
                    _ => "",
                };
                write!(f, "scale:{prefix}{w},{h}")?;
            }
            ScaleKind::ByPercent { percent } => write!(f, "scale:pct:{}", percent * 100.0)?,
            ScaleKind::ToMax {
                max_pixels,
                max_scale,
            } => {
                write!(f, "scale:max")?;
                if let Some(p) = max_pixels {
                    write!(f, ",px={p}")?;
                }
                if let Some(s) = max_scale {
                    write!(f, ",sc={s}")?;
                }
            }
        }
        if self.upscaling && matches!(self.kind, ScaleKind::ToMax { .. }) {
            write!(f, ",up")?;
        }
        if let Some(filter) = self.filter {
            write!(f, ",{filter}")?;
        }
        Ok(())
    }
}
