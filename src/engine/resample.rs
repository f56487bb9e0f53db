// src/engine/resample.rs
//
// Separable resampling: 1-D kernel responses, a two-pass (horizontal then
// vertical) resampler over premultiplied float pixels, and unsharp masking.

use super::color::{linear_to_srgb, srgb_to_linear};
use crate::error::{IiifError, Result};
use crate::ops::{ScaleFilter, Sharpen};
use image::{DynamicImage, RgbImage, RgbaImage};
use rayon::prelude::*;

/// Sources or targets narrower than this are not resampled; the kernels
/// need at least this many taps.
pub const MIN_RESAMPLE_DIMENSION: u32 = 3;

impl ScaleFilter {
    /// Radius of the kernel in source pixels at scale 1.
    pub fn support(&self) -> f64 {
        match self {
            ScaleFilter::Box => 0.5,
            ScaleFilter::Triangle | ScaleFilter::Hermite => 1.0,
            ScaleFilter::Bell => 1.5,
            ScaleFilter::BSpline
            | ScaleFilter::Mitchell
            | ScaleFilter::CatmullRom
            | ScaleFilter::Bicubic => 2.0,
            ScaleFilter::Lanczos3 => 3.0,
        }
    }

    /// Kernel response at distance `x` from the sample center.
    pub fn weight(&self, x: f64) -> f64 {
        let x = x.abs();
        match self {
            ScaleFilter::Box => {
                if x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ScaleFilter::Triangle => (1.0 - x).max(0.0),
            ScaleFilter::Hermite => {
                if x < 1.0 {
                    (2.0 * x - 3.0) * x * x + 1.0
                } else {
                    0.0
                }
            }
            ScaleFilter::Bell => {
                if x < 0.5 {
                    0.75 - x * x
                } else if x < 1.5 {
                    0.5 * (x - 1.5) * (x - 1.5)
                } else {
                    0.0
                }
            }
            ScaleFilter::BSpline => cubic(x, 1.0, 0.0),
            ScaleFilter::Mitchell => cubic(x, 1.0 / 3.0, 1.0 / 3.0),
            ScaleFilter::CatmullRom => cubic(x, 0.0, 0.5),
            ScaleFilter::Bicubic => cubic(x, 0.0, 0.75),
            ScaleFilter::Lanczos3 => {
                if x < 3.0 {
                    sinc(x) * sinc(x / 3.0)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Mitchell-Netravali cubic family.
fn cubic(x: f64, b: f64, c: f64) -> f64 {
    let x2 = x * x;
    let x3 = x2 * x;
    if x < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * x3 + (-18.0 + 12.0 * b + 6.0 * c) * x2 + (6.0 - 2.0 * b))
            / 6.0
    } else if x < 2.0 {
        ((-b - 6.0 * c) * x3 + (6.0 * b + 30.0 * c) * x2 + (-12.0 * b - 48.0 * c) * x
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-9 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

/// Normalized taps of one output sample.
struct Contribution {
    start: usize,
    weights: Vec<f32>,
}

fn contributions(src_len: u32, dst_len: u32, filter: ScaleFilter) -> Vec<Contribution> {
    let ratio = src_len as f64 / dst_len as f64;
    // widen the kernel when minifying so every source pixel contributes
    let filter_scale = ratio.max(1.0);
    let support = filter.support() * filter_scale;
    (0..dst_len)
        .map(|i| {
            let center = (i as f64 + 0.5) * ratio;
            let start = (center - support).floor().max(0.0) as usize;
            let end = ((center + support).ceil() as usize).min(src_len as usize);
            let mut weights: Vec<f64> = (start..end)
                .map(|j| filter.weight((j as f64 + 0.5 - center) / filter_scale))
                .collect();
            let sum: f64 = weights.iter().sum();
            if sum.abs() > f64::EPSILON {
                weights.iter_mut().for_each(|w| *w /= sum);
            } else {
                // nearest neighbour when the kernel missed every tap
                weights.iter_mut().for_each(|w| *w = 0.0);
                let nearest = (center.floor() as usize).clamp(start, end.saturating_sub(1));
                if let Some(w) = weights.get_mut(nearest - start) {
                    *w = 1.0;
                }
            }
            Contribution {
                start,
                weights: weights.into_iter().map(|w| w as f32).collect(),
            }
        })
        .collect()
}

/// Premultiplied RGBA float raster.
struct FloatRaster {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 4]>,
}

impl FloatRaster {
    fn from_rgba(img: &RgbaImage, linear: bool) -> Self {
        let pixels = img
            .pixels()
            .map(|p| {
                let a = p[3] as f32 / 255.0;
                let channel = |v: u8| {
                    let c = if linear {
                        srgb_to_linear(v)
                    } else {
                        v as f32 / 255.0
                    };
                    c * a
                };
                [channel(p[0]), channel(p[1]), channel(p[2]), a]
            })
            .collect();
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            pixels,
        }
    }

    fn to_rgba(&self, linear: bool) -> RgbaImage {
        let mut raw = Vec::with_capacity(self.width * self.height * 4);
        for p in &self.pixels {
            let a = p[3].clamp(0.0, 1.0);
            let channel = |v: f32| {
                let c = if a > 0.0 { (v / a).clamp(0.0, 1.0) } else { 0.0 };
                if linear {
                    linear_to_srgb(c)
                } else {
                    (c * 255.0).round() as u8
                }
            };
            raw.extend_from_slice(&[
                channel(p[0]),
                channel(p[1]),
                channel(p[2]),
                (a * 255.0).round() as u8,
            ]);
        }
        // length is width * height * 4 by construction
        RgbaImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| RgbaImage::new(self.width as u32, self.height as u32))
    }

    fn resample_horizontal(&self, dst_width: usize, filter: ScaleFilter) -> Self {
        let taps = contributions(self.width as u32, dst_width as u32, filter);
        let mut pixels = vec![[0f32; 4]; dst_width * self.height];
        pixels
            .par_chunks_mut(dst_width)
            .enumerate()
            .for_each(|(y, row)| {
                let src = &self.pixels[y * self.width..(y + 1) * self.width];
                for (out, tap) in row.iter_mut().zip(&taps) {
                    let mut acc = [0f32; 4];
                    for (k, w) in tap.weights.iter().enumerate() {
                        let p = src[tap.start + k];
                        for c in 0..4 {
                            acc[c] += p[c] * w;
                        }
                    }
                    *out = acc;
                }
            });
        Self {
            width: dst_width,
            height: self.height,
            pixels,
        }
    }

    fn resample_vertical(&self, dst_height: usize, filter: ScaleFilter) -> Self {
        let taps = contributions(self.height as u32, dst_height as u32, filter);
        let width = self.width;
        let mut pixels = vec![[0f32; 4]; width * dst_height];
        pixels
            .par_chunks_mut(width)
            .zip(taps.par_iter())
            .for_each(|(row, tap)| {
                for (k, w) in tap.weights.iter().enumerate() {
                    let src = &self.pixels[(tap.start + k) * width..(tap.start + k + 1) * width];
                    for (out, p) in row.iter_mut().zip(src) {
                        for c in 0..4 {
                            out[c] += p[c] * w;
                        }
                    }
                }
            });
        Self {
            width,
            height: dst_height,
            pixels,
        }
    }
}

/// Resizes `img` to exactly `width`×`height` with `filter`.
///
/// Alpha is premultiplied for the passes. With `linear` the passes run in
/// linear light. Below [`MIN_RESAMPLE_DIMENSION`] on either side a blank
/// raster of the target size is returned instead.
pub fn resample(
    img: &DynamicImage,
    width: u32,
    height: u32,
    filter: ScaleFilter,
    linear: bool,
) -> Result<DynamicImage> {
    if width == 0 || height == 0 {
        return Err(IiifError::raster(
            "scale",
            format!("cannot resample to {width}x{height}"),
        ));
    }
    let has_alpha = img.color().has_alpha();
    if img.width() < MIN_RESAMPLE_DIMENSION
        || img.height() < MIN_RESAMPLE_DIMENSION
        || width < MIN_RESAMPLE_DIMENSION
        || height < MIN_RESAMPLE_DIMENSION
    {
        tracing::debug!(
            target: "iiif_image::resample",
            src_width = img.width(),
            src_height = img.height(),
            width,
            height,
            "too small to resample; returning blank raster"
        );
        return Ok(if has_alpha {
            DynamicImage::ImageRgba8(RgbaImage::new(width, height))
        } else {
            DynamicImage::ImageRgb8(RgbImage::new(width, height))
        });
    }

    let source = FloatRaster::from_rgba(&img.to_rgba8(), linear);
    let horizontal = if source.width == width as usize {
        source
    } else {
        source.resample_horizontal(width as usize, filter)
    };
    let both = if horizontal.height == height as usize {
        horizontal
    } else {
        horizontal.resample_vertical(height as usize, filter)
    };
    let rgba = both.to_rgba(linear);
    Ok(if has_alpha {
        DynamicImage::ImageRgba8(rgba)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
    })
}

/// Unsharp mask: `orig + amount * (orig - blur)` per color channel where
/// the difference exceeds `threshold`. Alpha is untouched.
pub fn unsharp_mask(img: &DynamicImage, sharpen: &Sharpen) -> DynamicImage {
    if !sharpen.has_effect()
        || img.width() < MIN_RESAMPLE_DIMENSION
        || img.height() < MIN_RESAMPLE_DIMENSION
    {
        return img.clone();
    }
    let has_alpha = img.color().has_alpha();
    let original = img.to_rgba8();
    let blurred = image::imageops::blur(&original, sharpen.radius as f32);
    let amount = sharpen.amount as f32;
    let threshold = sharpen.threshold as f32;
    let mut out = original.clone();
    for (dst, (o, b)) in out
        .pixels_mut()
        .zip(original.pixels().zip(blurred.pixels()))
    {
        for c in 0..3 {
            let diff = o[c] as f32 - b[c] as f32;
            if diff.abs() > threshold {
                dst[c] = (o[c] as f32 + amount * diff).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    if has_alpha {
        DynamicImage::ImageRgba8(out)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(out).to_rgb8())
    }
}
