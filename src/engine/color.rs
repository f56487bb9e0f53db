// src/engine/color.rs
//
// Pixel-level color operations: gray/bitonal reduction, CMYK handling and
// sRGB transfer tables.

use super::io::{icc_color_space, icc_device_class};
use crate::error::{IiifError, Result};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use moxcms::{ColorProfile, Layout, TransformOptions};
use once_cell::sync::Lazy;

/// sRGB-encoded byte to linear light, exact transfer function.
static SRGB_TO_LINEAR: Lazy<[f32; 256]> = Lazy::new(|| {
    let mut table = [0f32; 256];
    for (i, v) in table.iter_mut().enumerate() {
        let c = i as f32 / 255.0;
        *v = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    table
});

const LINEAR_STEPS: usize = 4096;

/// Linear light (quantized to 4096 steps) to sRGB-encoded byte.
static LINEAR_TO_SRGB: Lazy<Vec<u8>> = Lazy::new(|| {
    (0..=LINEAR_STEPS)
        .map(|i| {
            let l = i as f32 / LINEAR_STEPS as f32;
            let c = if l <= 0.003_130_8 {
                l * 12.92
            } else {
                1.055 * l.powf(1.0 / 2.4) - 0.055
            };
            (c * 255.0).round().clamp(0.0, 255.0) as u8
        })
        .collect()
});

pub fn srgb_to_linear(value: u8) -> f32 {
    SRGB_TO_LINEAR[value as usize]
}

pub fn linear_to_srgb(value: f32) -> u8 {
    let index = (value.clamp(0.0, 1.0) * LINEAR_STEPS as f32).round() as usize;
    LINEAR_TO_SRGB[index]
}

/// Luma `0.21R + 0.71G + 0.07B` written to all three channels; alpha and
/// the raster's channel layout are kept.
pub fn grayscale(img: &DynamicImage) -> DynamicImage {
    let luma = |r: u8, g: u8, b: u8| {
        (0.21 * r as f32 + 0.71 * g as f32 + 0.07 * b as f32)
            .round()
            .min(255.0) as u8
    };
    if img.color().has_alpha() {
        let mut rgba = img.to_rgba8();
        for p in rgba.pixels_mut() {
            let y = luma(p[0], p[1], p[2]);
            p.0 = [y, y, y, p[3]];
        }
        DynamicImage::ImageRgba8(rgba)
    } else {
        let mut rgb = img.to_rgb8();
        for p in rgb.pixels_mut() {
            let y = luma(p[0], p[1], p[2]);
            p.0 = [y, y, y];
        }
        DynamicImage::ImageRgb8(rgb)
    }
}

/// Otsu threshold over a 256-bin histogram.
pub fn otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }
    let sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum();

    let mut sum_background = 0f64;
    let mut weight_background = 0u64;
    let mut best_variance = -1f64;
    let mut threshold = 0u8;
    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }
        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum - sum_background) / weight_foreground as f64;
        let diff = mean_background - mean_foreground;
        let variance = weight_background as f64 * weight_foreground as f64 * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            threshold = t as u8;
        }
    }
    threshold
}

/// Black and white by an Otsu threshold on the red channel: values above
/// the threshold become white, the rest black. Alpha is kept.
pub fn bitonal(img: &DynamicImage) -> DynamicImage {
    let mut rgba = img.to_rgba8();
    let mut histogram = [0u64; 256];
    for p in rgba.pixels() {
        histogram[p[0] as usize] += 1;
    }
    let threshold = otsu_threshold(&histogram);
    for p in rgba.pixels_mut() {
        let v = if p[0] > threshold { 255 } else { 0 };
        p.0 = [v, v, v, p[3]];
    }
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(rgba)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}

/// In-place YCCK → CMYK over row-major 4-component data: YCbCr → RGB,
/// then the color channels are inverted. K is kept.
pub fn ycck_to_cmyk(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let y = px[0] as f32;
        let cb = px[1] as f32 - 128.0;
        let cr = px[2] as f32 - 128.0;
        let r = (y + 1.402 * cr).round().clamp(0.0, 255.0) as u8;
        let g = (y - 0.344_136 * cb - 0.714_136 * cr)
            .round()
            .clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * cb).round().clamp(0.0, 255.0) as u8;
        px[0] = 255 - r;
        px[1] = 255 - g;
        px[2] = 255 - b;
    }
}

pub fn invert(data: &mut [u8]) {
    for v in data.iter_mut() {
        *v = 255 - *v;
    }
}

/// Device CMYK (0 = no ink) to RGB without color management.
pub fn device_cmyk_to_rgb(cmyk: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let mut out = Vec::with_capacity(width as usize * height as usize * 3);
    for px in cmyk.chunks_exact(4) {
        let k = 255 - px[3] as u32;
        for &c in &px[..3] {
            out.push(((255 - c as u32) * k / 255) as u8);
        }
    }
    RgbImage::from_raw(width, height, out)
        .ok_or_else(|| IiifError::raster("cmyk", "CMYK buffer does not match its dimensions"))
}

/// CMYK (0 = no ink) to sRGB through an embedded CMYK profile.
///
/// Output-device profiles (class `prtr` and friends) are rewritten to
/// class `mntr` first; the transform is otherwise refused for them.
pub fn icc_cmyk_to_rgb(cmyk: &[u8], width: u32, height: u32, icc: &[u8]) -> Result<RgbImage> {
    if icc_color_space(icc) != Some(*b"CMYK") {
        return Err(IiifError::icc_profile("embedded profile is not a CMYK profile"));
    }
    let mut patched = icc.to_vec();
    if icc_device_class(&patched) != Some(*b"mntr") {
        patched[12..16].copy_from_slice(b"mntr");
    }
    let source = ColorProfile::new_from_slice(&patched)
        .map_err(|e| IiifError::icc_profile(format!("unreadable CMYK profile: {e:?}")))?;
    let srgb = ColorProfile::new_srgb();
    let transform = source
        .create_transform_8bit(Layout::Rgba, &srgb, Layout::Rgb, TransformOptions::default())
        .map_err(|e| IiifError::icc_profile(format!("cannot build CMYK transform: {e:?}")))?;
    let mut out = vec![0u8; width as usize * height as usize * 3];
    transform
        .transform(cmyk, &mut out)
        .map_err(|e| IiifError::icc_profile(format!("CMYK transform failed: {e:?}")))?;
    RgbImage::from_raw(width, height, out)
        .ok_or_else(|| IiifError::raster("cmyk", "CMYK buffer does not match its dimensions"))
}

/// CMYK to RGB, preferring the embedded profile and falling back to the
/// device conversion when there is none or it cannot be used.
pub fn cmyk_to_rgb(cmyk: &[u8], width: u32, height: u32, icc: Option<&[u8]>) -> Result<RgbImage> {
    if let Some(icc) = icc {
        match icc_cmyk_to_rgb(cmyk, width, height, icc) {
            Ok(rgb) => return Ok(rgb),
            Err(e) => {
                tracing::warn!(target: "iiif_image::color", error = %e, "falling back to device CMYK")
            }
        }
    }
    device_cmyk_to_rgb(cmyk, width, height)
}

/// Fills transparent areas with `background` and drops alpha.
pub fn flatten(img: &DynamicImage, background: Rgb<u8>) -> DynamicImage {
    if !img.color().has_alpha() {
        return img.clone();
    }
    let rgba: RgbaImage = img.to_rgba8();
    let out = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let a = p[3] as u32;
        let mix = |c: u8, bg: u8| ((c as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8;
        Rgb([
            mix(p[0], background[0]),
            mix(p[1], background[1]),
            mix(p[2], background[2]),
        ])
    });
    DynamicImage::ImageRgb8(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::tests::minimal_icc;
    use image::Rgba;

    #[test]
    fn test_transfer_tables() {
        assert_eq!(srgb_to_linear(0), 0.0);
        assert!((srgb_to_linear(255) - 1.0).abs() < 1e-6);
        for v in [0u8, 1, 17, 128, 200, 254, 255] {
            assert_eq!(linear_to_srgb(srgb_to_linear(v)), v);
        }
    }

    #[test]
    fn test_grayscale_weights_and_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 99])));
        let gray = grayscale(&img).to_rgba8();
        assert_eq!(gray.get_pixel(0, 0).0, [54, 54, 54, 99]);
    }

    #[test]
    fn test_bitonal_cyan_and_red() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([0, 255, 255])
            } else {
                Rgb([255, 0, 0])
            }
        });
        let out = bitonal(&DynamicImage::ImageRgb8(img)).to_rgb8();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_otsu_splits_bimodal_histogram() {
        let mut histogram = [0u64; 256];
        histogram[20] = 100;
        histogram[220] = 100;
        let t = otsu_threshold(&histogram);
        assert!((20..220).contains(&t));
        assert_eq!(otsu_threshold(&[0u64; 256]), 0);
    }

    #[test]
    fn test_ycck_to_cmyk() {
        // neutral mid gray with K untouched
        let mut data = [128u8, 128, 128, 77];
        ycck_to_cmyk(&mut data);
        assert_eq!(data, [127, 127, 127, 77]);
    }

    #[test]
    fn test_device_cmyk() {
        let rgb = device_cmyk_to_rgb(&[0, 0, 0, 0, 0, 255, 255, 0, 0, 0, 0, 255], 3, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(2, 0).0, [0, 0, 0]);
        assert!(device_cmyk_to_rgb(&[0; 4], 2, 1).is_err());
    }

    #[test]
    fn test_unusable_profile_falls_back() {
        let rgb_profile = minimal_icc(b"mntr", b"RGB ");
        assert!(icc_cmyk_to_rgb(&[0; 4], 1, 1, &rgb_profile).is_err());
        let rgb = cmyk_to_rgb(&[0; 4], 1, 1, Some(&rgb_profile)).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_flatten() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        let flat = flatten(&img, Rgb([255, 255, 255])).to_rgb8();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }
}
