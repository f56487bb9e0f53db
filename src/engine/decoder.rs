// src/engine/decoder.rs
//
// Source decoding: JPEG (mozjpeg, CMYK via jpeg-decoder), WebP (libwebp),
// everything else through the image crate.

use super::color::{cmyk_to_rgb, invert, ycck_to_cmyk};
use super::common::run_with_panic_policy;
use super::io::{extract_icc_profile, jpeg_adobe_transform, Source};
use super::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{IiifError, Result};
use crate::geometry::ReductionFactor;
use crate::info::Orientation;
use crate::ops::OutputFormat;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use mozjpeg::Decompress;
use std::borrow::Cow;
use std::fmt;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Webp,
    Bmp,
    Unknown,
}

impl SourceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
            SourceFormat::Gif => "gif",
            SourceFormat::Tiff => "tiff",
            SourceFormat::Webp => "webp",
            SourceFormat::Bmp => "bmp",
            SourceFormat::Unknown => "unknown",
        }
    }

    /// Format by magic bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => SourceFormat::Jpeg,
            Ok(ImageFormat::Png) => SourceFormat::Png,
            Ok(ImageFormat::Gif) => SourceFormat::Gif,
            Ok(ImageFormat::Tiff) => SourceFormat::Tiff,
            Ok(ImageFormat::WebP) => SourceFormat::Webp,
            Ok(ImageFormat::Bmp) => SourceFormat::Bmp,
            _ => SourceFormat::Unknown,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => SourceFormat::Jpeg,
            "png" => SourceFormat::Png,
            "gif" => SourceFormat::Gif,
            "tif" | "tiff" => SourceFormat::Tiff,
            "webp" => SourceFormat::Webp,
            "bmp" => SourceFormat::Bmp,
            _ => SourceFormat::Unknown,
        }
    }

    /// The output format that would reproduce this source, if any.
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self {
            SourceFormat::Jpeg => Some(OutputFormat::Jpg),
            SourceFormat::Png => Some(OutputFormat::Png),
            SourceFormat::Gif => Some(OutputFormat::Gif),
            SourceFormat::Tiff => Some(OutputFormat::Tif),
            SourceFormat::Webp => Some(OutputFormat::Webp),
            SourceFormat::Bmp | SourceFormat::Unknown => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded raster and the reduction factor it was actually decoded at,
/// which may be smaller than the one requested.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub reduction_factor: ReductionFactor,
}

/// Reads geometry and pixels from one source image.
///
/// Methods take `&mut self` so implementations can parse headers lazily
/// and cache them.
pub trait SourceDecoder {
    fn format(&self) -> SourceFormat;

    fn page_count(&mut self) -> Result<usize>;

    /// Full-resolution pixel size of `page`, before orientation.
    fn size(&mut self, page: usize) -> Result<(u32, u32)>;

    /// Physical tile size of `page`; the full size for untiled sources.
    fn tile_size(&mut self, page: usize) -> Result<(u32, u32)>;

    fn orientation(&mut self) -> Result<Orientation>;

    fn icc_profile(&mut self) -> Result<Option<Vec<u8>>>;

    /// Number of resolution levels available to `decode`, at least 1.
    fn num_resolutions(&mut self) -> Result<u32>;

    /// Decodes `page`, at reduction factor `rf` if the source supports it.
    fn decode(&mut self, page: usize, rf: ReductionFactor) -> Result<DecodedImage>;

    /// The encoded source file, for requests that can be served without
    /// decoding. `None` when the decoder has no single file to hand out.
    fn source_bytes(&mut self) -> Result<Option<Cow<'_, [u8]>>> {
        Ok(None)
    }
}

/// Decoder for single-resolution raster files.
#[derive(Debug)]
pub struct StandardDecoder {
    source: Source,
    format: SourceFormat,
    dimensions: Option<(u32, u32)>,
    orientation: Option<Orientation>,
    icc_profile: Option<Option<Vec<u8>>>,
}

impl StandardDecoder {
    /// Sniffs the source format. A `declared` format that disagrees with
    /// the bytes is an error.
    pub fn new(source: Source, declared: Option<SourceFormat>) -> Result<Self> {
        let detected = SourceFormat::detect(&source.bytes()?);
        if let Some(declared) = declared {
            if declared != detected {
                return Err(IiifError::source_format_mismatch(
                    declared.name(),
                    detected.name(),
                ));
            }
        }
        if detected == SourceFormat::Unknown {
            return Err(IiifError::decode_failed("unrecognized source format"));
        }
        Ok(Self {
            source,
            format: detected,
            dimensions: None,
            orientation: None,
            icc_profile: None,
        })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new(Source::from_bytes(bytes), None)
    }

    fn check_page(page: usize) -> Result<()> {
        if page == 0 {
            Ok(())
        } else {
            Err(IiifError::page_out_of_range(page, 1))
        }
    }

    fn dimensions(&mut self) -> Result<(u32, u32)> {
        if let Some(dims) = self.dimensions {
            return Ok(dims);
        }
        let bytes = self.source.bytes()?;
        let dims = ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .map_err(|e| IiifError::decode_failed(format!("failed to read image header: {e}")))?
            .into_dimensions()
            .map_err(|e| IiifError::decode_failed(format!("failed to read dimensions: {e}")))?;
        self.dimensions = Some(dims);
        Ok(dims)
    }
}

impl SourceDecoder for StandardDecoder {
    fn format(&self) -> SourceFormat {
        self.format
    }

    fn page_count(&mut self) -> Result<usize> {
        Ok(1)
    }

    fn size(&mut self, page: usize) -> Result<(u32, u32)> {
        Self::check_page(page)?;
        self.dimensions()
    }

    fn tile_size(&mut self, page: usize) -> Result<(u32, u32)> {
        self.size(page)
    }

    fn orientation(&mut self) -> Result<Orientation> {
        if let Some(orientation) = self.orientation {
            return Ok(orientation);
        }
        let orientation = Orientation::read_from(&self.source.bytes()?);
        self.orientation = Some(orientation);
        Ok(orientation)
    }

    fn icc_profile(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(icc) = &self.icc_profile {
            return Ok(icc.clone());
        }
        let icc = extract_icc_profile(&self.source.bytes()?);
        self.icc_profile = Some(icc.clone());
        Ok(icc)
    }

    fn num_resolutions(&mut self) -> Result<u32> {
        Ok(1)
    }

    fn decode(&mut self, page: usize, rf: ReductionFactor) -> Result<DecodedImage> {
        Self::check_page(page)?;
        let (width, height) = self.dimensions()?;
        check_dimensions(width, height)?;
        if rf.0 > 0 {
            tracing::trace!(
                target: "iiif_image::decoder",
                requested = rf.0,
                "single-resolution source; decoding at full size"
            );
        }
        let bytes = self.source.bytes()?;
        let image = match self.format {
            SourceFormat::Jpeg => decode_jpeg(&bytes)?,
            SourceFormat::Webp => decode_webp(&bytes)?,
            _ => decode_with_image_crate(&bytes)?,
        };
        Ok(DecodedImage {
            image,
            reduction_factor: ReductionFactor(0),
        })
    }

    fn source_bytes(&mut self) -> Result<Option<Cow<'_, [u8]>>> {
        self.source.bytes().map(Some)
    }
}

/// JPEG through libjpeg-turbo, except CMYK/YCCK which mozjpeg cannot hand
/// back unconverted.
pub fn decode_jpeg(data: &[u8]) -> Result<DynamicImage> {
    if jpeg_is_cmyk(data) {
        return decode_cmyk_jpeg(data);
    }
    run_with_panic_policy("decode:jpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(IiifError::decode_failed("jpeg: missing EOI marker"));
        }
        let decompress = Decompress::new_mem(data)
            .map_err(|e| IiifError::decode_failed(format!("jpeg: decompress init failed: {e:?}")))?;
        let mut decompress = decompress
            .rgb()
            .map_err(|e| IiifError::decode_failed(format!("jpeg: rgb conversion failed: {e:?}")))?;
        let width = decompress.width() as u32;
        let height = decompress.height() as u32;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress
            .read_scanlines()
            .map_err(|e| IiifError::decode_failed(format!("jpeg: failed to read scanlines: {e:?}")))?;
        let flat: Vec<u8> = pixels.into_iter().flatten().collect();
        RgbImage::from_raw(width, height, flat)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| IiifError::decode_failed("jpeg: scanlines do not match the header size"))
    })
}

fn jpeg_is_cmyk(data: &[u8]) -> bool {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    decoder.read_info().is_ok()
        && matches!(
            decoder.info().map(|i| i.pixel_format),
            Some(jpeg_decoder::PixelFormat::CMYK32)
        )
}

/// Four-component JPEG to RGB. Adobe files store inverted ink values, and
/// with transform 2 the inverted color channels are additionally
/// YCC-encoded.
pub fn decode_cmyk_jpeg(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:jpeg-cmyk", || {
        let mut decoder = jpeg_decoder::Decoder::new(data);
        decoder.set_color_transform(jpeg_decoder::ColorTransform::None);
        let mut pixels = decoder
            .decode()
            .map_err(|e| IiifError::decode_failed(format!("jpeg: cmyk decode failed: {e}")))?;
        let info = decoder
            .info()
            .ok_or_else(|| IiifError::decode_failed("jpeg: missing header info"))?;
        let (width, height) = (info.width as u32, info.height as u32);
        check_dimensions(width, height)?;

        match jpeg_adobe_transform(data) {
            Some(2) => {
                ycck_to_cmyk(&mut pixels);
                invert(&mut pixels);
            }
            Some(_) => invert(&mut pixels),
            None => {}
        }
        let icc = extract_icc_profile(data);
        let rgb = cmyk_to_rgb(&pixels, width, height, icc.as_deref())?;
        Ok(DynamicImage::ImageRgb8(rgb))
    })
}

/// WebP through libwebp. Animated files fall back to the image crate,
/// which yields the first frame.
pub fn decode_webp(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        let features = BitstreamFeatures::new(data)
            .ok_or_else(|| IiifError::decode_failed("webp: failed to read bitstream features"))?;
        if features.has_animation() {
            return image::load_from_memory(data)
                .map_err(|e| IiifError::decode_failed(format!("webp (animated): {e}")));
        }
        check_dimensions(features.width(), features.height())?;
        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| IiifError::decode_failed("webp: decode failed"))?;
        Ok(decoded.to_image())
    })
}

pub fn decode_with_image_crate(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        image::load_from_memory(data).map_err(|e| IiifError::decode_failed(format!("{e}")))
    })
}

/// Rejects sources large enough to be decompression bombs.
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(IiifError::size_limit_exceeded(
            width as u64,
            height as u64,
            format!("{MAX_DIMENSION}px per side"),
        ));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(IiifError::size_limit_exceeded(
            width as u64,
            height as u64,
            format!("{MAX_PIXELS} pixels"),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use image::{GenericImageView, Rgb};

    pub(crate) fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn rgb(w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
    }

    #[test]
    fn test_detect_format() {
        let png = encode(&rgb(2, 2, [0, 0, 0]), ImageFormat::Png);
        let jpeg = encode(&rgb(2, 2, [1, 2, 3]), ImageFormat::Jpeg);
        assert_eq!(SourceFormat::detect(&png), SourceFormat::Png);
        assert_eq!(SourceFormat::detect(&jpeg), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::detect(b"hello"), SourceFormat::Unknown);
        assert_eq!(SourceFormat::from_extension("JPG"), SourceFormat::Jpeg);
    }

    #[test]
    fn test_declared_format_mismatch() {
        let png = encode(&rgb(2, 2, [0, 0, 0]), ImageFormat::Png);
        let err = StandardDecoder::new(Source::from_bytes(png), Some(SourceFormat::Jpeg))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::SourceFormat);
        assert!(err.to_string().contains("png"));
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        assert!(StandardDecoder::from_bytes(b"not an image".to_vec()).is_err());
    }

    #[test]
    fn test_standard_decoder_png() {
        let png = encode(&rgb(5, 3, [9, 8, 7]), ImageFormat::Png);
        let mut decoder = StandardDecoder::from_bytes(png).unwrap();
        assert_eq!(decoder.format(), SourceFormat::Png);
        assert_eq!(decoder.page_count().unwrap(), 1);
        assert_eq!(decoder.size(0).unwrap(), (5, 3));
        assert_eq!(decoder.tile_size(0).unwrap(), (5, 3));
        assert_eq!(decoder.num_resolutions().unwrap(), 1);
        assert_eq!(decoder.orientation().unwrap(), Orientation::Rotate0);
        assert!(decoder.size(1).is_err());

        let decoded = decoder.decode(0, ReductionFactor(2)).unwrap();
        assert_eq!(decoded.reduction_factor, ReductionFactor(0));
        assert_eq!(decoded.image.dimensions(), (5, 3));
        assert_eq!(decoded.image.to_rgb8().get_pixel(0, 0).0, [9, 8, 7]);
    }

    #[test]
    fn test_jpeg_goes_through_mozjpeg() {
        let jpeg = encode(&rgb(4, 2, [200, 100, 50]), ImageFormat::Jpeg);
        let mut decoder = StandardDecoder::from_bytes(jpeg).unwrap();
        let decoded = decoder.decode(0, ReductionFactor(0)).unwrap();
        assert_eq!(decoded.image.dimensions(), (4, 2));
        let px = decoded.image.to_rgb8().get_pixel(1, 1).0;
        assert!(px[0].abs_diff(200) < 8 && px[2].abs_diff(50) < 8);
    }

    /// Solid four-component JPEG; `adobe` is the stored (inverted) value.
    pub(crate) fn cmyk_jpeg(w: u32, h: u32, adobe: [u8; 4], space: mozjpeg::ColorSpace) -> Vec<u8> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_CMYK);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(space);
        comp.set_quality(95.0);
        let mut out = Vec::new();
        let mut writer = comp.start_compress(&mut out).unwrap();
        let row: Vec<u8> = std::iter::repeat(adobe).take(w as usize).flatten().collect();
        for _ in 0..h {
            writer.write_scanlines(&row).unwrap();
        }
        writer.finish().unwrap();
        out
    }

    #[test]
    fn test_adobe_cmyk_jpeg() {
        let jpeg = cmyk_jpeg(16, 8, [255, 0, 0, 255], mozjpeg::ColorSpace::JCS_CMYK);
        assert_eq!(jpeg_adobe_transform(&jpeg), Some(0));
        let decoded = decode_jpeg(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
        let px = decoded.to_rgb8().get_pixel(8, 4).0;
        assert!(px[0] > 240 && px[1] < 16 && px[2] < 16, "{px:?}");
    }

    #[test]
    fn test_adobe_ycck_jpeg() {
        let jpeg = cmyk_jpeg(16, 8, [255, 0, 0, 255], mozjpeg::ColorSpace::JCS_YCCK);
        assert_eq!(jpeg_adobe_transform(&jpeg), Some(2));
        let px = decode_jpeg(&jpeg).unwrap().to_rgb8().get_pixel(8, 4).0;
        assert!(px[0] > 240 && px[1] < 16 && px[2] < 16, "{px:?}");
    }

    #[test]
    fn test_truncated_jpeg() {
        let mut jpeg = encode(&rgb(16, 16, [1, 2, 3]), ImageFormat::Jpeg);
        jpeg.truncate(jpeg.len() - 2);
        assert!(decode_jpeg(&jpeg).is_err());
    }

    #[test]
    fn test_webp() {
        let pixels: Vec<u8> = std::iter::repeat([10u8, 20, 30])
            .take(6)
            .flatten()
            .collect();
        let webp = webp::Encoder::from_rgb(&pixels, 3, 2).encode_lossless().to_vec();
        let mut decoder = StandardDecoder::from_bytes(webp).unwrap();
        assert_eq!(decoder.format(), SourceFormat::Webp);
        let decoded = decoder.decode(0, ReductionFactor(0)).unwrap();
        assert_eq!(decoded.image.to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_mapped_source() {
        use std::io::Write;
        let png = encode(&rgb(3, 3, [1, 1, 1]), ImageFormat::Png);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&png).unwrap();
        let source = Source::map(file.path()).unwrap();
        let mut decoder = StandardDecoder::new(source, Some(SourceFormat::Png)).unwrap();
        assert_eq!(decoder.size(0).unwrap(), (3, 3));
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(1000, 1000).is_ok());
        assert!(check_dimensions(MAX_DIMENSION + 1, 1).is_err());
        assert!(check_dimensions(20_000, 20_000).is_err());
    }
}
