// src/engine/encoder.rs
//
// Output encoding: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp),
// GIF and TIFF (image). JP2 and PDF have no encoder.

use super::color::flatten;
use super::common::run_with_panic_policy;
use super::MAX_DIMENSION;
use crate::error::{IiifError, Result};
use crate::ops::{Encode, OutputFormat};
use image::{DynamicImage, ImageFormat, RgbImage};
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, Bytes, ImageICC};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::{Cursor, Write};

/// Writes a processed raster in the format an `Encode` operation asks for.
pub trait ImageEncoder {
    fn encode(&self, img: &DynamicImage, encode: &Encode, out: &mut dyn Write) -> Result<()>;

    /// Whether `format` can be produced at all.
    fn supports(&self, format: OutputFormat) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StandardEncoder;

impl ImageEncoder for StandardEncoder {
    fn encode(&self, img: &DynamicImage, encode: &Encode, out: &mut dyn Write) -> Result<()> {
        let format = encode.format();
        if !self.supports(format) {
            return Err(IiifError::unsupported_format(format.extension()));
        }
        let (w, h) = (img.width(), img.height());
        if w == 0 || h == 0 {
            return Err(IiifError::encode_failed(
                format.extension(),
                "image has a zero dimension",
            ));
        }
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(IiifError::size_limit_exceeded(
                w as u64,
                h as u64,
                format!("{MAX_DIMENSION}px per side"),
            ));
        }

        let img: Cow<'_, DynamicImage> = match encode.flatten_color() {
            Some(bg) if img.color().has_alpha() => {
                Cow::Owned(flatten(img, image::Rgb([bg.r, bg.g, bg.b])))
            }
            _ => Cow::Borrowed(img),
        };
        let icc = encode.icc_profile();
        let bytes = match format {
            OutputFormat::Jpg => encode_jpeg(&img, encode.quality(), encode.options().interlace, icc)?,
            OutputFormat::Png => encode_png(&img, icc)?,
            OutputFormat::Webp => encode_webp(&img, encode.quality(), icc)?,
            OutputFormat::Gif => encode_with_image_crate(&img, ImageFormat::Gif)?,
            OutputFormat::Tif => encode_with_image_crate(&img, ImageFormat::Tiff)?,
            OutputFormat::Jp2 | OutputFormat::Pdf => {
                return Err(IiifError::unsupported_format(format.extension()))
            }
        };
        tracing::trace!(
            target: "iiif_image::encoder",
            format = format.extension(),
            bytes = bytes.len(),
            "encoded"
        );
        out.write_all(&bytes).map_err(IiifError::output_write_failed)
    }

    fn supports(&self, format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jp2 | OutputFormat::Pdf)
    }
}

/// WebP tuning derived from the 1-100 quality value.
#[derive(Debug, Clone, Copy)]
struct QualitySettings {
    quality: f32,
}

impl QualitySettings {
    fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    fn webp_sns_strength(&self) -> i32 {
        if self.quality >= 85.0 {
            50
        } else if self.quality >= 70.0 {
            70
        } else {
            80
        }
    }

    fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    fn webp_filter_sharpness(&self) -> i32 {
        if self.quality >= 85.0 {
            2
        } else {
            0
        }
    }

    fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }
}

fn rgb8(img: &DynamicImage) -> Cow<'_, RgbImage> {
    match img {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        _ => Cow::Owned(img.to_rgb8()),
    }
}

pub fn encode_jpeg(
    img: &DynamicImage,
    quality: u8,
    progressive: bool,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let rgb = rgb8(img);
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();
        let settings = QualitySettings::new(quality);

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        if progressive {
            comp.set_progressive_mode();
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        }
        comp.set_optimize_coding(true);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let mut output = Vec::with_capacity((w as usize * h as usize * 3 / 10).max(4096));
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                IiifError::encode_failed("jpg", format!("failed to start compress: {e:?}"))
            })?;
            for row in pixels.chunks(w as usize * 3) {
                writer.write_scanlines(row).map_err(|e| {
                    IiifError::encode_failed("jpg", format!("failed to write scanlines: {e:?}"))
                })?;
            }
            writer
                .finish()
                .map_err(|e| IiifError::encode_failed("jpg", format!("failed to finish: {e:?}")))?;
        }

        match icc {
            Some(icc) => embed_icc_jpeg(output, icc),
            None => Ok(output),
        }
    })
}

/// Payload bytes per APP2 segment once the 2-byte length, the
/// `ICC_PROFILE\0` tag and the sequence bytes are taken out.
const ICC_CHUNK_LEN: usize = u16::MAX as usize - 2 - 14;

/// Inserts the profile as APP2 `ICC_PROFILE` segments, split into
/// numbered chunks when it does not fit a single segment.
pub fn embed_icc_jpeg(jpeg_data: Vec<u8>, icc: &[u8]) -> Result<Vec<u8>> {
    use img_parts::jpeg::{markers::APP2, JpegSegment};

    let chunks: Vec<&[u8]> = icc.chunks(ICC_CHUNK_LEN).collect();
    let count = u8::try_from(chunks.len()).map_err(|_| {
        IiifError::encode_failed("jpg", format!("ICC profile too large: {} bytes", icc.len()))
    })?;

    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_data))
        .map_err(|e| IiifError::encode_failed("jpg", format!("cannot reparse for ICC: {e}")))?;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut marker = Vec::with_capacity(14 + chunk.len());
        marker.extend_from_slice(b"ICC_PROFILE\0");
        marker.push(i as u8 + 1);
        marker.push(count);
        marker.extend_from_slice(chunk);
        jpeg.segments_mut()
            .insert(i, JpegSegment::new_with_contents(APP2, Bytes::from(marker)));
    }

    let mut output = Vec::new();
    jpeg.encoder()
        .write_to(&mut output)
        .map_err(|e| IiifError::encode_failed("jpg", format!("failed to write ICC: {e}")))?;
    Ok(output)
}

/// PNG via the image crate, recompressed losslessly with oxipng.
pub fn encode_png(img: &DynamicImage, icc: Option<&[u8]>) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| IiifError::encode_failed("png", e.to_string()))?;

        let mut options = oxipng::Options::from_preset(4);
        options.strip = oxipng::StripChunks::None;
        let optimized = oxipng::optimize_from_memory(&buf, &options)
            .map_err(|e| IiifError::encode_failed("png", format!("oxipng: {e}")))?;

        let Some(icc) = icc else {
            return Ok(optimized);
        };
        let mut png = Png::from_bytes(Bytes::from(optimized))
            .map_err(|e| IiifError::encode_failed("png", format!("cannot reparse for ICC: {e}")))?;
        png.set_icc_profile(Some(Bytes::from(icc.to_vec())));
        let mut output = Vec::new();
        png.encoder()
            .write_to(&mut output)
            .map_err(|e| IiifError::encode_failed("png", format!("failed to write ICC: {e}")))?;
        Ok(output)
    })
}

pub fn encode_webp(img: &DynamicImage, quality: u8, icc: Option<&[u8]>) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let settings = QualitySettings::new(quality);
        let has_alpha = img.color().has_alpha();
        let rgba;
        let rgb;
        let encoder = if has_alpha {
            rgba = img.to_rgba8();
            webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
        } else {
            rgb = rgb8(img);
            webp::Encoder::from_rgb(&rgb, rgb.width(), rgb.height())
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| IiifError::encode_failed("webp", "failed to create WebPConfig"))?;
        config.quality = settings.quality;
        config.method = 4;
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let encoded = encoder
            .encode_advanced(&config)
            .map_err(|e| IiifError::encode_failed("webp", format!("{e:?}")))?
            .to_vec();

        let Some(icc) = icc else {
            return Ok(encoded);
        };
        let mut webp = WebP::from_bytes(Bytes::from(encoded))
            .map_err(|e| IiifError::encode_failed("webp", format!("cannot reparse for ICC: {e}")))?;
        webp.set_icc_profile(Some(Bytes::from(icc.to_vec())));
        let mut output = Vec::new();
        webp.encoder()
            .write_to(&mut output)
            .map_err(|e| IiifError::encode_failed("webp", format!("failed to write ICC: {e}")))?;
        Ok(output)
    })
}

/// GIF and TIFF through the image crate, in 8-bit RGB or RGBA.
pub fn encode_with_image_crate(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:image", || {
        let normalized = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };
        let mut buf = Vec::new();
        normalized
            .write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| {
                IiifError::encode_failed(format!("{format:?}").to_lowercase(), e.to_string())
            })?;
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{extract_icc_profile, tests::minimal_icc};
    use crate::error::ErrorCategory;
    use crate::ops::{Color, EncodeOptions};
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::sync::Arc;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        }))
    }

    fn encode_to_vec(img: &DynamicImage, encode: &Encode) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        StandardEncoder.encode(img, encode, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_jpeg_markers() {
        let out = encode_to_vec(&gradient(32, 32), &Encode::new(OutputFormat::Jpg)).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_jpeg_flattens_alpha_onto_background() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let options = EncodeOptions {
            quality: 95,
            background: Some(Color::rgb(255, 0, 0)),
            ..EncodeOptions::default()
        };
        let encode = Encode::with_options(OutputFormat::Jpg, options).unwrap();
        let out = encode_to_vec(&transparent, &encode).unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgb8();
        let px = decoded.get_pixel(4, 4).0;
        assert!(px[0] > 240 && px[1] < 16 && px[2] < 16);
    }

    #[test]
    fn test_png_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 100])));
        let out = encode_to_vec(&img, &Encode::new(OutputFormat::Png)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0, [1, 2, 3, 100]);
    }

    #[test]
    fn test_webp_gif_tiff() {
        let img = gradient(16, 8);
        for format in [OutputFormat::Webp, OutputFormat::Gif, OutputFormat::Tif] {
            let out = encode_to_vec(&img, &Encode::new(format)).unwrap();
            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!(decoded.dimensions(), (16, 8), "{format}");
        }
    }

    #[test]
    fn test_unsupported_formats() {
        for format in [OutputFormat::Jp2, OutputFormat::Pdf] {
            assert!(!StandardEncoder.supports(format));
            let err = encode_to_vec(&gradient(4, 4), &Encode::new(format)).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::UnsupportedFormat);
        }
    }

    #[test]
    fn test_icc_round_trip() {
        let icc = minimal_icc(b"mntr", b"RGB ");
        for format in [OutputFormat::Jpg, OutputFormat::Png] {
            let encode = Encode::new(format).with_icc_profile(Some(Arc::from(icc.clone())));
            let out = encode_to_vec(&gradient(8, 8), &encode).unwrap();
            assert_eq!(extract_icc_profile(&out).as_deref(), Some(&icc[..]), "{format}");
        }
    }

    #[test]
    fn test_large_icc_split_across_segments() {
        let mut icc = minimal_icc(b"prtr", b"RGB ");
        icc.resize(70_000, 0x5A);
        icc[..4].copy_from_slice(&70_000u32.to_be_bytes());
        let encode = Encode::new(OutputFormat::Jpg).with_icc_profile(Some(Arc::from(icc.clone())));
        let out = encode_to_vec(&gradient(8, 8), &encode).unwrap();

        let jpeg = Jpeg::from_bytes(Bytes::from(out.clone())).unwrap();
        let icc_segments = jpeg
            .segments()
            .iter()
            .filter(|s| s.contents().starts_with(b"ICC_PROFILE\0"))
            .count();
        assert_eq!(icc_segments, 2);
        assert_eq!(extract_icc_profile(&out).as_deref(), Some(&icc[..]));
        assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn test_icc_dropped_when_not_preserved() {
        let icc = minimal_icc(b"mntr", b"RGB ");
        let options = EncodeOptions {
            preserve_icc: false,
            ..EncodeOptions::default()
        };
        let encode = Encode::with_options(OutputFormat::Png, options)
            .unwrap()
            .with_icc_profile(Some(Arc::from(icc)));
        let out = encode_to_vec(&gradient(8, 8), &encode).unwrap();
        assert!(extract_icc_profile(&out).is_none());
    }

    #[test]
    fn test_write_failure_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let err = StandardEncoder
            .encode(&gradient(4, 4), &Encode::new(OutputFormat::Png), &mut Broken)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CodecError);
    }
}
